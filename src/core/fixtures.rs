//! Deterministic sample data shared by the unit tests.

use super::types::{
    Asset, BacktestPoint, BacktestResult, CompositionPoint, ContributionTranche, FanChartPoint,
    Kpis, MedianYear, RiskMetrics, SimulationConfig, SimulationResult, TAX_RATE,
};

pub fn sample_config() -> SimulationConfig {
    SimulationConfig {
        initial_capital: 10_000.0,
        contributions: vec![ContributionTranche {
            years: 20,
            monthly_amount: 500.0,
        }],
        asset: Asset::Ticker {
            symbol: "VWRL.AS".to_string(),
        },
        inflation_rate: 0.02,
        financial_goal: 500_000.0,
        backtest_start_year: Some(2008),
        black_swan_enabled: true,
        degrees_of_freedom: 3,
    }
}

pub fn median_years(points: &[(u32, f64)]) -> Vec<MedianYear> {
    let mut opening = points.first().map(|(_, b)| *b).unwrap_or(0.0);
    points
        .iter()
        .map(|&(year, closing)| {
            let row = MedianYear {
                year,
                opening_balance: opening,
                annual_contribution: 0.0,
                annual_return: if opening > 0.0 {
                    closing / opening - 1.0
                } else {
                    0.0
                },
                interest_earned: closing - opening,
                closing_balance: closing,
                black_swan: false,
            };
            opening = closing;
            row
        })
        .collect()
}

/// A smooth 5% growth path with a single black swan in year 3.
pub fn sample_result(years: u32) -> SimulationResult {
    let initial = 10_000.0;
    let annual = 6_000.0;
    let inflation = 1.02_f64;

    let median_at = |year: u32| {
        let invested = initial + annual * year as f64;
        invested * 1.05_f64.powi(year as i32)
    };

    let fan_chart: Vec<FanChartPoint> = (0..=years)
        .map(|year| {
            let invested = initial + annual * year as f64;
            let median = median_at(year);
            let deflator = inflation.powi(year as i32);
            FanChartPoint {
                year,
                invested_nominal: invested,
                invested_real: invested / deflator,
                p10_nominal: median * 0.8,
                median_nominal: median,
                p90_nominal: median * 1.3,
                p10_real: median * 0.8 / deflator,
                median_real: median / deflator,
                p90_real: median * 1.3 / deflator,
            }
        })
        .collect();

    let composition: Vec<CompositionPoint> = (0..=years)
        .map(|year| {
            let contributions = annual * year as f64;
            CompositionPoint {
                year,
                initial_capital: initial,
                contributions,
                compound_interest: median_at(year) - initial - contributions,
                black_swan: year == 3,
            }
        })
        .collect();

    let median_scenario: Vec<MedianYear> = (1..=years)
        .map(|year| {
            let opening = median_at(year - 1);
            let closing = median_at(year);
            MedianYear {
                year,
                opening_balance: opening,
                annual_contribution: annual,
                annual_return: if year == 3 { -0.25 } else { 0.05 },
                interest_earned: closing - opening - annual,
                closing_balance: closing,
                black_swan: year == 3,
            }
        })
        .collect();

    let total_invested = initial + annual * years as f64;
    let gross = median_at(years);
    let taxes = ((gross - total_invested) * TAX_RATE).max(0.0);
    let net_profit = gross - total_invested - taxes;

    SimulationResult {
        fan_chart,
        composition,
        median_scenario,
        kpis: Kpis {
            total_invested,
            gross_final_balance: gross,
            estimated_taxes: taxes,
            net_profit,
            net_final_balance: total_invested + net_profit,
            return_rate: net_profit / total_invested,
        },
        risk: RiskMetrics {
            max_drawdown: 0.25,
            success_probability: 0.62,
            median_final_balance_real: gross / inflation.powi(years as i32),
        },
        ticker_stats: None,
    }
}

pub fn sample_backtest(months: usize) -> BacktestResult {
    let mut balance = 10_000.0;
    let mut invested = 10_000.0;
    let history: Vec<BacktestPoint> = (0..months)
        .map(|idx| {
            let period_return = if idx % 4 == 3 { -0.03 } else { 0.01 };
            balance = balance * (1.0 + period_return) + 500.0;
            invested += 500.0;
            BacktestPoint {
                date: format!("{}-{:02}-28", 2008 + idx / 12, idx % 12 + 1),
                balance_nominal: balance,
                balance_real: balance / 1.02_f64.powf(idx as f64 / 12.0),
                invested,
                period_return,
            }
        })
        .collect();

    let final_balance_real = history.last().map(|p| p.balance_real).unwrap_or(10_000.0);
    BacktestResult {
        history,
        final_balance: balance,
        final_balance_real,
        total_invested: invested,
    }
}
