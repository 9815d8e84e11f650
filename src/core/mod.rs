mod deflator;
#[cfg(test)]
pub(crate) mod fixtures;
mod metrics;
mod types;
mod views;

pub use deflator::{Deflator, deflate};
pub use metrics::{
    BlackSwanMarker, DerivedKpis, DrawdownPoint, Drawdowns, WITHDRAWAL_RATE, black_swan_markers,
    check_alignment, derive_kpis, drawdown_series,
};
pub use types::{
    Asset, BACKTEST_YEAR_FLOOR, BacktestPoint, BacktestResult, CompositionPoint,
    ContributionTranche, CUSTOM_TICKER, DisplayUnits, FanChartPoint, Kpis, MAX_HORIZON_YEARS,
    MedianYear, RiskMetrics, SimulationConfig, SimulationResult, TAX_RATE, TickerMatch,
    TickerStats,
};
pub use views::{
    AnnualReturnBar, BacktestChartPoint, BacktestSlot, BacktestView, CompositionBar,
    CompositionView, DerivedViews, ProjectionPoint, ProjectionView, ReturnTone, RiskView,
    UnavailableReason, ViewKind, ViewRef, backtest_view, composition_view, derive_views,
    projection_view, risk_view,
};
