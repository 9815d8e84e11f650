use serde::{Deserialize, Serialize};

use crate::error::{EngineError, SubmitError};

/// Tax rate applied to gains by the simulation service.
pub const TAX_RATE: f64 = 0.19;
/// Backtests are only requested for start years strictly after this one.
pub const BACKTEST_YEAR_FLOOR: i32 = 1900;
/// Longest contribution horizon a configuration may span.
pub const MAX_HORIZON_YEARS: u32 = 100;
/// Ticker sentinel understood by the simulation service for user-supplied parameters.
pub const CUSTOM_TICKER: &str = "CUSTOM";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayUnits {
    Nominal,
    #[default]
    Real,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionTranche {
    pub years: u32,
    pub monthly_amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Asset {
    Ticker {
        symbol: String,
    },
    #[serde(rename_all = "camelCase")]
    Custom { expected_return: f64, volatility: f64 },
}

/// One submitted plan. Shared behind an `Arc` once submitted and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub contributions: Vec<ContributionTranche>,
    pub asset: Asset,
    pub inflation_rate: f64,
    pub financial_goal: f64,
    pub backtest_start_year: Option<i32>,
    pub black_swan_enabled: bool,
    pub degrees_of_freedom: u32,
}

impl SimulationConfig {
    /// Total contribution horizon, the sum of all tranche durations.
    pub fn horizon_years(&self) -> u32 {
        self.contributions
            .iter()
            .fold(0u32, |total, t| total.saturating_add(t.years))
    }

    /// Start year for the historical backtest, if one should be run.
    /// Custom assets have no price history, so they never backtest.
    pub fn backtest_year(&self) -> Option<i32> {
        match self.asset {
            Asset::Ticker { .. } => self
                .backtest_start_year
                .filter(|year| *year > BACKTEST_YEAR_FLOOR),
            Asset::Custom { .. } => None,
        }
    }

    /// Label sent to the simulation service for this asset.
    pub fn ticker(&self) -> &str {
        match &self.asset {
            Asset::Ticker { symbol } => symbol,
            Asset::Custom { .. } => CUSTOM_TICKER,
        }
    }

    pub fn validate(&self) -> Result<(), SubmitError> {
        if !self.inflation_rate.is_finite() || self.inflation_rate <= -1.0 {
            return Err(EngineError::InvalidInflationRate {
                rate: self.inflation_rate,
            }
            .into());
        }

        if !self.initial_capital.is_finite() || self.initial_capital < 0.0 {
            return Err(invalid("initialCapital must be >= 0"));
        }

        if !self.financial_goal.is_finite() || self.financial_goal < 0.0 {
            return Err(invalid("financialGoal must be >= 0"));
        }

        if self.contributions.is_empty() {
            return Err(invalid("at least one contribution tranche is required"));
        }

        for (idx, tranche) in self.contributions.iter().enumerate() {
            if tranche.years == 0 {
                return Err(invalid(&format!("tranche {idx}: years must be > 0")));
            }
            if !tranche.monthly_amount.is_finite() || tranche.monthly_amount < 0.0 {
                return Err(invalid(&format!(
                    "tranche {idx}: monthlyAmount must be >= 0"
                )));
            }
        }

        let horizon = self
            .contributions
            .iter()
            .try_fold(0u32, |total, t| total.checked_add(t.years))
            .filter(|years| *years <= MAX_HORIZON_YEARS);
        if horizon.is_none() {
            return Err(invalid(&format!(
                "contribution tranches must span at most {MAX_HORIZON_YEARS} years"
            )));
        }

        match &self.asset {
            Asset::Ticker { symbol } if symbol.trim().is_empty() => {
                return Err(invalid("ticker must not be empty"));
            }
            Asset::Custom {
                expected_return,
                volatility,
            } => {
                if !expected_return.is_finite() {
                    return Err(invalid("customReturn must be finite"));
                }
                if !volatility.is_finite() || *volatility < 0.0 {
                    return Err(invalid("customVolatility must be >= 0"));
                }
            }
            Asset::Ticker { .. } => {}
        }

        if self.degrees_of_freedom == 0 {
            return Err(invalid("degreesOfFreedom must be >= 1"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> SubmitError {
    SubmitError::InvalidConfig(msg.to_string())
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanChartPoint {
    pub year: u32,
    pub invested_nominal: f64,
    pub invested_real: f64,
    pub p10_nominal: f64,
    pub median_nominal: f64,
    pub p90_nominal: f64,
    pub p10_real: f64,
    pub median_real: f64,
    pub p90_real: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPoint {
    pub year: u32,
    pub initial_capital: f64,
    pub contributions: f64,
    pub compound_interest: f64,
    pub black_swan: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedianYear {
    pub year: u32,
    pub opening_balance: f64,
    pub annual_contribution: f64,
    pub annual_return: f64,
    pub interest_earned: f64,
    pub closing_balance: f64,
    pub black_swan: bool,
}

/// Scalar KPIs of the median scenario, in nominal units.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    pub total_invested: f64,
    pub gross_final_balance: f64,
    pub estimated_taxes: f64,
    pub net_profit: f64,
    pub net_final_balance: f64,
    pub return_rate: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub max_drawdown: f64,
    pub success_probability: f64,
    pub median_final_balance_real: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerStats {
    pub mean_return: f64,
    pub volatility: f64,
    pub data_points: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub fan_chart: Vec<FanChartPoint>,
    pub composition: Vec<CompositionPoint>,
    pub median_scenario: Vec<MedianYear>,
    pub kpis: Kpis,
    pub risk: RiskMetrics,
    pub ticker_stats: Option<TickerStats>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestPoint {
    pub date: String,
    pub balance_nominal: f64,
    pub balance_real: f64,
    pub invested: f64,
    pub period_return: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub history: Vec<BacktestPoint>,
    pub final_balance: f64,
    pub final_balance_real: f64,
    pub total_invested: f64,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerMatch {
    pub symbol: String,
    pub display_name: String,
}
