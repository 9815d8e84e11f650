mod binder;
mod orchestrator;
mod store;

pub use binder::{Render, ViewBinder};
pub use orchestrator::{BacktestOutcome, Orchestrator, SubmissionOutcome};
pub use store::{Phase, ResultSet, SessionReader, SessionState, SessionStore, SubmissionId};

#[cfg(test)]
pub(crate) use orchestrator::tests::FakeService;
