use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::core::{BacktestSlot, DisplayUnits, SimulationConfig, SimulationResult};
use crate::error::SubmitError;

/// Identity of one submitted configuration, increasing per session.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub struct SubmissionId(u64);

impl SubmissionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    Idle,
    SimulatingMain,
    SimulatingBacktest,
    Complete,
    Failed(SubmitError),
}

impl Phase {
    pub fn in_flight(&self) -> bool {
        matches!(self, Self::SimulatingMain | Self::SimulatingBacktest)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SimulatingMain => "simulatingMain",
            Self::SimulatingBacktest => "simulatingBacktest",
            Self::Complete => "complete",
            Self::Failed(_) => "failed",
        }
    }
}

/// A published simulation together with the backtest of the same configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultSet {
    pub submission: SubmissionId,
    pub config: Arc<SimulationConfig>,
    pub simulation: Arc<SimulationResult>,
    pub backtest: BacktestSlot,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub units: DisplayUnits,
    pub has_run: bool,
    pub phase: Phase,
    pub latest: Option<SubmissionId>,
    pub submitted: Option<Arc<SimulationConfig>>,
    pub results: Option<Arc<ResultSet>>,
    next_submission: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            units: DisplayUnits::Real,
            has_run: false,
            phase: Phase::Idle,
            latest: None,
            submitted: None,
            results: None,
            next_submission: 1,
        }
    }
}

impl SessionState {
    fn is_latest(&self, id: SubmissionId) -> bool {
        self.latest == Some(id)
    }
}

/// Session-wide state. Results are written only through the crate-internal
/// orchestrator methods; the toggle through [`SessionStore::set_units`].
/// Every write replaces the state as a whole, so readers never see a result
/// without its matching backtest.
#[derive(Clone, Debug)]
pub struct SessionStore {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn reader(&self) -> SessionReader {
        SessionReader {
            rx: self.tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn set_units(&self, units: DisplayUnits) {
        self.tx.send_if_modified(|state| {
            if state.units == units {
                return false;
            }
            state.units = units;
            true
        });
    }

    pub(crate) fn is_latest(&self, id: SubmissionId) -> bool {
        self.tx.borrow().is_latest(id)
    }

    /// Marks a new submission as the latest and invalidates the backtest
    /// currently on display, which belongs to the previous configuration.
    pub(crate) fn begin(&self, config: Arc<SimulationConfig>) -> SubmissionId {
        let mut assigned = SubmissionId(0);
        self.tx.send_modify(|state| {
            let id = SubmissionId(state.next_submission);
            state.next_submission += 1;
            state.latest = Some(id);
            state.submitted = Some(config);
            state.phase = Phase::SimulatingMain;
            if let Some(results) = &state.results {
                if results.backtest != BacktestSlot::Invalidated {
                    state.results = Some(Arc::new(ResultSet {
                        backtest: BacktestSlot::Invalidated,
                        ..ResultSet::clone(results)
                    }));
                }
            }
            assigned = id;
        });
        assigned
    }

    pub(crate) fn advance(&self, id: SubmissionId, phase: Phase) -> bool {
        self.tx.send_if_modified(|state| {
            if !state.is_latest(id) {
                return false;
            }
            state.phase = phase;
            true
        })
    }

    pub(crate) fn publish(
        &self,
        id: SubmissionId,
        config: Arc<SimulationConfig>,
        simulation: Arc<SimulationResult>,
        backtest: BacktestSlot,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if !state.is_latest(id) {
                return false;
            }
            state.results = Some(Arc::new(ResultSet {
                submission: id,
                config,
                simulation,
                backtest,
            }));
            state.has_run = true;
            state.phase = Phase::Complete;
            true
        })
    }

    /// Leaves any earlier result in place; it keeps its own configuration.
    pub(crate) fn fail(&self, id: SubmissionId, error: SubmitError) -> bool {
        self.tx.send_if_modified(|state| {
            if !state.is_latest(id) {
                return false;
            }
            state.phase = Phase::Failed(error);
            true
        })
    }
}

/// Read-only handle for views.
#[derive(Clone, Debug)]
pub struct SessionReader {
    rx: watch::Receiver<SessionState>,
}

impl SessionReader {
    pub fn snapshot(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Snapshot that also marks the current revision as seen.
    pub fn observe(&mut self) -> SessionState {
        self.rx.borrow_and_update().clone()
    }

    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Waits for the next write. Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
