use super::types::DisplayUnits;
use crate::error::EngineError;

/// Converts nominal amounts into purchasing-power terms over a fixed horizon.
///
/// A nominal deflator is the identity. Both variants are built through
/// [`Deflator::new`], so an invalid inflation rate is rejected even when the
/// toggle currently selects nominal units.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Deflator {
    factor: f64,
}

impl Deflator {
    pub fn new(units: DisplayUnits, inflation_rate: f64, years: u32) -> Result<Self, EngineError> {
        let growth = inflation_growth(inflation_rate, years)?;
        let factor = match units {
            DisplayUnits::Nominal => 1.0,
            DisplayUnits::Real => growth,
        };
        Ok(Self { factor })
    }

    pub fn identity() -> Self {
        Self { factor: 1.0 }
    }

    pub fn factor(self) -> f64 {
        self.factor
    }

    pub fn apply(self, nominal: f64) -> f64 {
        if self.factor == 1.0 {
            nominal
        } else {
            nominal / self.factor
        }
    }
}

/// `nominal / (1 + inflation_rate)^years`.
pub fn deflate(nominal: f64, inflation_rate: f64, years: u32) -> Result<f64, EngineError> {
    Deflator::new(DisplayUnits::Real, inflation_rate, years).map(|d| d.apply(nominal))
}

fn inflation_growth(inflation_rate: f64, years: u32) -> Result<f64, EngineError> {
    let invalid = EngineError::InvalidInflationRate {
        rate: inflation_rate,
    };
    if !inflation_rate.is_finite() || inflation_rate <= -1.0 {
        return Err(invalid);
    }

    let exponent = i32::try_from(years).unwrap_or(i32::MAX);
    let growth = (1.0 + inflation_rate).powi(exponent);
    // Underflow to zero would turn every deflated amount into infinity.
    if !growth.is_finite() || growth <= 0.0 {
        return Err(invalid);
    }
    Ok(growth)
}
