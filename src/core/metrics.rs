use serde::Serialize;

use super::deflator::Deflator;
use super::types::{DisplayUnits, MedianYear, SimulationResult};
use crate::error::EngineError;

/// Sustainable withdrawal rate behind the monthly income estimate.
pub const WITHDRAWAL_RATE: f64 = 0.04;

/// KPI figures in the units selected by the toggle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedKpis {
    pub units: DisplayUnits,
    pub horizon_years: u32,
    pub invested: f64,
    pub gross_final: f64,
    pub taxes_paid: f64,
    pub net_profit: f64,
    pub final_net: f64,
    pub monthly_retirement_income: f64,
    pub return_rate: f64,
    pub success_probability: f64,
    pub max_drawdown: f64,
}

pub fn derive_kpis(
    result: &SimulationResult,
    units: DisplayUnits,
    inflation_rate: f64,
    horizon_years: u32,
) -> Result<DerivedKpis, EngineError> {
    let deflator = Deflator::new(units, inflation_rate, horizon_years)?;
    let kpis = &result.kpis;
    let final_net = deflator.apply(kpis.net_final_balance);

    Ok(DerivedKpis {
        units,
        horizon_years,
        invested: deflator.apply(kpis.total_invested),
        gross_final: deflator.apply(kpis.gross_final_balance),
        taxes_paid: deflator.apply(kpis.estimated_taxes),
        net_profit: deflator.apply(kpis.net_profit),
        final_net,
        monthly_retirement_income: final_net * WITHDRAWAL_RATE / 12.0,
        return_rate: kpis.return_rate,
        success_probability: result.risk.success_probability,
        max_drawdown: result.risk.max_drawdown,
    })
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownPoint {
    pub year: u32,
    /// Fractional decline from the running peak, always `<= 0`.
    pub drawdown: f64,
    pub peak: f64,
}

/// Lazy drawdown walk over the median scenario, one point per year.
///
/// The running peak starts at the first closing balance, so the first point
/// is always flat. Clone the iterator (or call [`drawdown_series`] again) to
/// restart it.
#[derive(Clone, Debug)]
pub struct Drawdowns<'a> {
    years: std::slice::Iter<'a, MedianYear>,
    peak: Option<f64>,
}

impl Iterator for Drawdowns<'_> {
    type Item = DrawdownPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let point = self.years.next()?;
        let balance = point.closing_balance;
        let peak = match self.peak {
            None => balance,
            Some(peak) => peak.max(balance),
        };
        self.peak = Some(peak);

        let drawdown = if peak > 0.0 {
            ((balance - peak) / peak).min(0.0)
        } else {
            0.0
        };

        Some(DrawdownPoint {
            year: point.year,
            drawdown,
            peak,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.years.size_hint()
    }
}

impl ExactSizeIterator for Drawdowns<'_> {}

pub fn drawdown_series(median_scenario: &[MedianYear]) -> Drawdowns<'_> {
    Drawdowns {
        years: median_scenario.iter(),
        peak: None,
    }
}

/// Fails unless composition and fan chart share the same ascending year axis.
pub fn check_alignment(result: &SimulationResult) -> Result<(), EngineError> {
    let fan = &result.fan_chart;
    let composition = &result.composition;

    let mismatch = fan
        .iter()
        .zip(composition)
        .enumerate()
        .position(|(idx, (f, c))| {
            f.year != c.year || (idx > 0 && fan[idx - 1].year >= f.year)
        });

    let first_mismatch = match mismatch {
        Some(idx) => Some(idx),
        None if fan.len() != composition.len() => Some(fan.len().min(composition.len())),
        None => None,
    };

    match first_mismatch {
        None => Ok(()),
        Some(idx) => Err(EngineError::Alignment {
            fan_len: fan.len(),
            composition_len: composition.len(),
            first_mismatch: Some(idx),
        }),
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackSwanMarker {
    pub year: u32,
    pub fan_index: usize,
}

/// Black-swan years from the composition series, placed on the fan-chart axis.
pub fn black_swan_markers(result: &SimulationResult) -> Result<Vec<BlackSwanMarker>, EngineError> {
    check_alignment(result)?;
    Ok(result
        .composition
        .iter()
        .enumerate()
        .filter(|(_, point)| point.black_swan)
        .map(|(fan_index, point)| BlackSwanMarker {
            year: point.year,
            fan_index,
        })
        .collect())
}
