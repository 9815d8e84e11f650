use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::deflator::Deflator;
use super::metrics::{
    BlackSwanMarker, DerivedKpis, DrawdownPoint, black_swan_markers, derive_kpis,
    drawdown_series,
};
use super::types::{BacktestResult, DisplayUnits, SimulationConfig, SimulationResult};
use crate::error::EngineError;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    #[default]
    Projection,
    Composition,
    Backtest,
    Risk,
}

/// Backtest attached to one published result.
#[derive(Clone, Debug, PartialEq)]
pub enum BacktestSlot {
    NotRequested,
    Failed,
    /// A newer configuration was submitted after this result landed.
    Invalidated,
    Ready(Arc<BacktestResult>),
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub year: u32,
    pub p10: f64,
    pub median: f64,
    pub p90: f64,
    pub invested: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionView {
    pub units: DisplayUnits,
    pub points: Vec<ProjectionPoint>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionBar {
    pub year: u32,
    pub initial_capital: f64,
    pub contributions: f64,
    pub compound_interest: f64,
}

/// Always nominal: it decomposes nominal cashflow sources.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionView {
    pub bars: Vec<CompositionBar>,
    pub black_swans: Vec<BlackSwanMarker>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestChartPoint {
    pub date: String,
    pub invested: f64,
    pub balance: f64,
    pub period_return: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnavailableReason {
    NotRequested,
    Failed,
    Superseded,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum BacktestView {
    #[serde(rename_all = "camelCase")]
    Available {
        units: DisplayUnits,
        points: Vec<BacktestChartPoint>,
        final_balance: f64,
        total_invested: f64,
    },
    Pending,
    Unavailable { reason: UnavailableReason },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnTone {
    Gain,
    Loss,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualReturnBar {
    pub year: u32,
    pub annual_return: f64,
    pub tone: ReturnTone,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskView {
    pub annual_returns: Vec<AnnualReturnBar>,
    pub drawdowns: Vec<DrawdownPoint>,
    pub max_drawdown: f64,
    pub success_probability: f64,
    pub median_final_balance_real: f64,
}

/// Every view derived from one result and one toggle position.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedViews {
    pub units: DisplayUnits,
    pub kpis: DerivedKpis,
    pub projection: ProjectionView,
    pub composition: CompositionView,
    pub backtest: BacktestView,
    pub risk: RiskView,
}

#[derive(Copy, Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ViewRef<'a> {
    Projection(&'a ProjectionView),
    Composition(&'a CompositionView),
    Backtest(&'a BacktestView),
    Risk(&'a RiskView),
}

impl DerivedViews {
    pub fn view(&self, kind: ViewKind) -> ViewRef<'_> {
        match kind {
            ViewKind::Projection => ViewRef::Projection(&self.projection),
            ViewKind::Composition => ViewRef::Composition(&self.composition),
            ViewKind::Backtest => ViewRef::Backtest(&self.backtest),
            ViewKind::Risk => ViewRef::Risk(&self.risk),
        }
    }
}

pub fn derive_views(
    config: &SimulationConfig,
    result: &SimulationResult,
    backtest: &BacktestSlot,
    backtest_in_flight: bool,
    units: DisplayUnits,
) -> Result<DerivedViews, EngineError> {
    let kpis = derive_kpis(result, units, config.inflation_rate, config.horizon_years())?;
    Ok(DerivedViews {
        units,
        kpis,
        projection: projection_view(result, units, config.inflation_rate)?,
        composition: composition_view(result)?,
        backtest: backtest_view(backtest, backtest_in_flight, units),
        risk: risk_view(result),
    })
}

/// Real values are deflated here, year by year, with the same deflator the
/// KPIs use at the full horizon.
pub fn projection_view(
    result: &SimulationResult,
    units: DisplayUnits,
    inflation_rate: f64,
) -> Result<ProjectionView, EngineError> {
    let points = result
        .fan_chart
        .iter()
        .map(|point| {
            let deflator = Deflator::new(units, inflation_rate, point.year)?;
            Ok(ProjectionPoint {
                year: point.year,
                p10: deflator.apply(point.p10_nominal),
                median: deflator.apply(point.median_nominal),
                p90: deflator.apply(point.p90_nominal),
                invested: deflator.apply(point.invested_nominal),
            })
        })
        .collect::<Result<Vec<_>, EngineError>>()?;
    Ok(ProjectionView { units, points })
}

pub fn composition_view(result: &SimulationResult) -> Result<CompositionView, EngineError> {
    let black_swans = black_swan_markers(result)?;
    let bars = result
        .composition
        .iter()
        .map(|point| CompositionBar {
            year: point.year,
            initial_capital: point.initial_capital,
            contributions: point.contributions,
            compound_interest: point.compound_interest,
        })
        .collect();
    Ok(CompositionView { bars, black_swans })
}

pub fn backtest_view(slot: &BacktestSlot, in_flight: bool, units: DisplayUnits) -> BacktestView {
    match slot {
        BacktestSlot::Ready(backtest) => {
            let points = backtest
                .history
                .iter()
                .map(|point| BacktestChartPoint {
                    date: point.date.clone(),
                    invested: point.invested,
                    balance: match units {
                        DisplayUnits::Nominal => point.balance_nominal,
                        DisplayUnits::Real => point.balance_real,
                    },
                    period_return: point.period_return,
                })
                .collect();
            BacktestView::Available {
                units,
                points,
                final_balance: match units {
                    DisplayUnits::Nominal => backtest.final_balance,
                    DisplayUnits::Real => backtest.final_balance_real,
                },
                total_invested: backtest.total_invested,
            }
        }
        BacktestSlot::Invalidated if in_flight => BacktestView::Pending,
        BacktestSlot::Invalidated => BacktestView::Unavailable {
            reason: UnavailableReason::Superseded,
        },
        BacktestSlot::NotRequested => BacktestView::Unavailable {
            reason: UnavailableReason::NotRequested,
        },
        BacktestSlot::Failed => BacktestView::Unavailable {
            reason: UnavailableReason::Failed,
        },
    }
}

pub fn risk_view(result: &SimulationResult) -> RiskView {
    let annual_returns = result
        .median_scenario
        .iter()
        .map(|year| AnnualReturnBar {
            year: year.year,
            annual_return: year.annual_return,
            tone: if year.annual_return >= 0.0 {
                ReturnTone::Gain
            } else {
                ReturnTone::Loss
            },
        })
        .collect();

    RiskView {
        annual_returns,
        drawdowns: drawdown_series(&result.median_scenario).collect(),
        max_drawdown: result.risk.max_drawdown,
        success_probability: result.risk.success_probability,
        median_final_balance_real: result.risk.median_final_balance_real,
    }
}
