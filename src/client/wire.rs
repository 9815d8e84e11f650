//! Request and response bodies of the simulation service.
//!
//! Field names follow the service verbatim. Percent-valued fields are turned
//! into fractions on the way into domain types.

use serde::{Deserialize, Serialize};

use crate::core::{
    Asset, BacktestPoint, BacktestResult, CompositionPoint, FanChartPoint, Kpis, MedianYear,
    RiskMetrics, SimulationConfig, SimulationResult, TAX_RATE, TickerMatch, TickerStats,
};

#[derive(Debug, Serialize)]
pub struct WireTranche {
    pub years: u32,
    pub monthly_amount: f64,
}

#[derive(Debug, Serialize)]
pub struct SimulateRequest<'a> {
    pub initial_capital: f64,
    pub contribution_schedule: Vec<WireTranche>,
    pub ticker: &'a str,
    pub inflation_rate: f64,
    pub tax_rate: f64,
    pub financial_goal: f64,
    pub black_swan_enabled: bool,
    pub t_df: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_return: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_volatility: Option<f64>,
}

impl<'a> SimulateRequest<'a> {
    pub fn from_config(config: &'a SimulationConfig) -> Self {
        let (custom_return, custom_volatility) = match config.asset {
            Asset::Custom {
                expected_return,
                volatility,
            } => (Some(expected_return * 100.0), Some(volatility * 100.0)),
            Asset::Ticker { .. } => (None, None),
        };

        Self {
            initial_capital: config.initial_capital,
            contribution_schedule: schedule(config),
            ticker: config.ticker(),
            inflation_rate: config.inflation_rate,
            tax_rate: TAX_RATE,
            financial_goal: config.financial_goal,
            black_swan_enabled: config.black_swan_enabled,
            t_df: config.degrees_of_freedom,
            custom_return,
            custom_volatility,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BacktestRequest<'a> {
    pub initial_capital: f64,
    pub contribution_schedule: Vec<WireTranche>,
    pub ticker: &'a str,
    pub start_year: i32,
    pub inflation_rate: f64,
}

impl<'a> BacktestRequest<'a> {
    pub fn from_config(config: &'a SimulationConfig, start_year: i32) -> Self {
        Self {
            initial_capital: config.initial_capital,
            contribution_schedule: schedule(config),
            ticker: config.ticker(),
            start_year,
            inflation_rate: config.inflation_rate,
        }
    }
}

fn schedule(config: &SimulationConfig) -> Vec<WireTranche> {
    config
        .contributions
        .iter()
        .map(|t| WireTranche {
            years: t.years,
            monthly_amount: t.monthly_amount,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct SimulateResponse {
    pub fan_chart: Vec<WireFanPoint>,
    pub portfolio_composition: Vec<WireCompositionPoint>,
    pub median_scenario: Vec<WireMedianYear>,
    pub kpis: WireKpis,
    pub risk_metrics: WireRiskMetrics,
    #[serde(default)]
    pub ticker_stats: Option<WireTickerStats>,
}

#[derive(Debug, Deserialize)]
pub struct WireFanPoint {
    #[serde(rename = "Year")]
    pub year: u32,
    #[serde(rename = "Invested", default)]
    pub invested: f64,
    #[serde(rename = "Invested_Real", default)]
    pub invested_real: f64,
    #[serde(rename = "P10_Nominal")]
    pub p10_nominal: f64,
    #[serde(rename = "Median_Nominal")]
    pub median_nominal: f64,
    #[serde(rename = "P90_Nominal")]
    pub p90_nominal: f64,
    #[serde(rename = "P10_Real")]
    pub p10_real: f64,
    #[serde(rename = "Median_Real")]
    pub median_real: f64,
    #[serde(rename = "P90_Real")]
    pub p90_real: f64,
}

#[derive(Debug, Deserialize)]
pub struct WireCompositionPoint {
    #[serde(rename = "Year")]
    pub year: u32,
    #[serde(rename = "Capital Inicial")]
    pub initial_capital: f64,
    #[serde(rename = "Aportaciones")]
    pub contributions: f64,
    #[serde(rename = "Interés Compuesto")]
    pub compound_interest: f64,
    #[serde(rename = "Is_Black_Swan", default)]
    pub black_swan: bool,
}

#[derive(Debug, Deserialize)]
pub struct WireMedianYear {
    #[serde(rename = "Año")]
    pub year: u32,
    #[serde(rename = "Saldo Inicial")]
    pub opening_balance: f64,
    #[serde(rename = "Aportación Anual")]
    pub annual_contribution: f64,
    #[serde(rename = "Retorno (%)")]
    pub return_pct: f64,
    #[serde(rename = "Interés Generado")]
    pub interest_earned: f64,
    #[serde(rename = "Saldo Final")]
    pub closing_balance: f64,
    #[serde(rename = "Is_Black_Swan", default)]
    pub black_swan: bool,
}

#[derive(Debug, Deserialize)]
pub struct WireKpis {
    #[serde(rename = "Capital Total Invertido")]
    pub total_invested: f64,
    #[serde(rename = "Saldo Final Bruto")]
    pub gross_final_balance: f64,
    #[serde(rename = "Impuestos Estimados")]
    pub estimated_taxes: f64,
    #[serde(rename = "Beneficio Neto")]
    pub net_profit: f64,
    #[serde(rename = "Saldo Final Neto")]
    pub net_final_balance: f64,
    #[serde(rename = "Rentabilidad (%)")]
    pub return_pct: f64,
}

#[derive(Debug, Deserialize)]
pub struct WireRiskMetrics {
    pub max_drawdown: f64,
    pub success_probability: f64,
    pub median_final_balance_real: f64,
}

#[derive(Debug, Deserialize)]
pub struct WireTickerStats {
    pub mean_return: f64,
    pub volatility: f64,
    #[serde(default)]
    pub data_points: u64,
}

impl From<SimulateResponse> for SimulationResult {
    fn from(wire: SimulateResponse) -> Self {
        Self {
            fan_chart: wire
                .fan_chart
                .into_iter()
                .map(|p| FanChartPoint {
                    year: p.year,
                    invested_nominal: p.invested,
                    invested_real: p.invested_real,
                    p10_nominal: p.p10_nominal,
                    median_nominal: p.median_nominal,
                    p90_nominal: p.p90_nominal,
                    p10_real: p.p10_real,
                    median_real: p.median_real,
                    p90_real: p.p90_real,
                })
                .collect(),
            composition: wire
                .portfolio_composition
                .into_iter()
                .map(|p| CompositionPoint {
                    year: p.year,
                    initial_capital: p.initial_capital,
                    contributions: p.contributions,
                    compound_interest: p.compound_interest,
                    black_swan: p.black_swan,
                })
                .collect(),
            median_scenario: wire
                .median_scenario
                .into_iter()
                .map(|p| MedianYear {
                    year: p.year,
                    opening_balance: p.opening_balance,
                    annual_contribution: p.annual_contribution,
                    annual_return: p.return_pct / 100.0,
                    interest_earned: p.interest_earned,
                    closing_balance: p.closing_balance,
                    black_swan: p.black_swan,
                })
                .collect(),
            kpis: Kpis {
                total_invested: wire.kpis.total_invested,
                gross_final_balance: wire.kpis.gross_final_balance,
                estimated_taxes: wire.kpis.estimated_taxes,
                net_profit: wire.kpis.net_profit,
                net_final_balance: wire.kpis.net_final_balance,
                return_rate: wire.kpis.return_pct / 100.0,
            },
            risk: RiskMetrics {
                max_drawdown: wire.risk_metrics.max_drawdown,
                success_probability: wire.risk_metrics.success_probability / 100.0,
                median_final_balance_real: wire.risk_metrics.median_final_balance_real,
            },
            ticker_stats: wire.ticker_stats.map(|s| TickerStats {
                mean_return: s.mean_return,
                volatility: s.volatility,
                data_points: s.data_points,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BacktestResponse {
    pub history: Vec<WireBacktestPoint>,
    pub final_balance: f64,
    pub final_balance_real: f64,
    pub total_invested: f64,
}

#[derive(Debug, Deserialize)]
pub struct WireBacktestPoint {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Balance_Nominal")]
    pub balance_nominal: f64,
    #[serde(rename = "Balance_Real")]
    pub balance_real: f64,
    #[serde(rename = "Invested")]
    pub invested: f64,
    #[serde(rename = "Return_Pct")]
    pub return_pct: f64,
}

impl From<BacktestResponse> for BacktestResult {
    fn from(wire: BacktestResponse) -> Self {
        Self {
            history: wire
                .history
                .into_iter()
                .map(|p| BacktestPoint {
                    date: p.date,
                    balance_nominal: p.balance_nominal,
                    balance_real: p.balance_real,
                    invested: p.invested,
                    period_return: p.return_pct / 100.0,
                })
                .collect(),
            final_balance: wire.final_balance,
            final_balance_real: wire.final_balance_real,
            total_invested: wire.total_invested,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TickerHit {
    pub symbol: String,
    #[serde(rename = "shortName", default)]
    pub short_name: Option<String>,
}

impl From<TickerHit> for TickerMatch {
    fn from(hit: TickerHit) -> Self {
        let display_name = hit
            .short_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| hit.symbol.clone());
        Self {
            symbol: hit.symbol,
            display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
