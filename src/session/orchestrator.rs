use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, debug, info, warn};

use super::store::{Phase, SessionStore, SubmissionId};
use crate::client::SimulationService;
use crate::core::{BacktestSlot, Deflator, DisplayUnits, SimulationConfig, check_alignment};
use crate::error::SubmitError;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BacktestOutcome {
    NotRequested,
    Ready,
    Failed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SubmissionOutcome {
    Complete {
        submission: SubmissionId,
        backtest: BacktestOutcome,
    },
    /// A newer submission took over before this one finished.
    Superseded { submission: SubmissionId },
}

/// Drives one submitted configuration from the simulation call through the
/// optional backtest to a published result.
#[derive(Clone)]
pub struct Orchestrator {
    service: Arc<dyn SimulationService>,
    store: SessionStore,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn SimulationService>, store: SessionStore) -> Self {
        Self { service, store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn service(&self) -> &Arc<dyn SimulationService> {
        &self.service
    }

    pub async fn submit(&self, config: SimulationConfig) -> Result<SubmissionOutcome, SubmitError> {
        let config = Arc::new(config);
        let submission = self.store.begin(Arc::clone(&config));
        let span = tracing::info_span!(
            "submission",
            id = submission.get(),
            ticker = config.ticker()
        );
        self.run(submission, config).instrument(span).await
    }

    async fn run(
        &self,
        submission: SubmissionId,
        config: Arc<SimulationConfig>,
    ) -> Result<SubmissionOutcome, SubmitError> {
        if let Err(err) = config.validate() {
            warn!(error = %err, "configuration rejected");
            return self.fail(submission, err);
        }

        info!(years = config.horizon_years(), "running simulation");
        let simulation = match self.service.simulate(&config).await {
            Ok(simulation) => simulation,
            Err(err) => {
                warn!(error = %err, "simulation failed");
                return self.fail(submission, err.into());
            }
        };

        if !self.store.is_latest(submission) {
            debug!("discarding simulation result from a superseded submission");
            return Ok(SubmissionOutcome::Superseded { submission });
        }

        if let Err(err) = check_alignment(&simulation) {
            warn!(error = %err, "simulation result is inconsistent");
            return self.fail(submission, err.into());
        }
        if let Err(err) = Deflator::new(
            DisplayUnits::Real,
            config.inflation_rate,
            config.horizon_years(),
        ) {
            warn!(error = %err, "inflation cannot be applied over the horizon");
            return self.fail(submission, err.into());
        }

        let (backtest, outcome) = match config.backtest_year() {
            None => (BacktestSlot::NotRequested, BacktestOutcome::NotRequested),
            Some(start_year) => {
                self.store.advance(submission, Phase::SimulatingBacktest);
                info!(start_year, "running backtest");
                match self.service.backtest(&config, start_year).await {
                    Ok(backtest) => (BacktestSlot::Ready(Arc::new(backtest)), BacktestOutcome::Ready),
                    Err(err) => {
                        warn!(error = %err, start_year, "backtest failed, publishing without it");
                        (BacktestSlot::Failed, BacktestOutcome::Failed)
                    }
                }
            }
        };

        if self
            .store
            .publish(submission, config, Arc::new(simulation), backtest)
        {
            info!("submission complete");
            Ok(SubmissionOutcome::Complete {
                submission,
                backtest: outcome,
            })
        } else {
            debug!("discarding results from a superseded submission");
            Ok(SubmissionOutcome::Superseded { submission })
        }
    }

    fn fail(
        &self,
        submission: SubmissionId,
        err: SubmitError,
    ) -> Result<SubmissionOutcome, SubmitError> {
        if self.store.fail(submission, err.clone()) {
            Err(err)
        } else {
            debug!(error = %err, "dropping failure from a superseded submission");
            Ok(SubmissionOutcome::Superseded { submission })
        }
    }
}
