use thiserror::Error;

/// Failure reported by the external simulation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("cannot reach simulation service: {0}")]
    Connectivity(String),
    #[error("simulation service rejected the request ({status}): {message}")]
    Request { status: u16, message: String },
}

/// Local precondition violations in the derived-metrics pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("inflation rate must be greater than -1, got {rate}")]
    InvalidInflationRate { rate: f64 },
    #[error(
        "composition years do not match fan chart years \
         ({fan_len} fan points, {composition_len} composition points, first mismatch at {first_mismatch:?})"
    )]
    Alignment {
        fan_len: usize,
        composition_len: usize,
        first_mismatch: Option<usize>,
    },
}

/// Why a submission ended in the failed state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SubmitError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Service(ServiceError::Connectivity(_)))
    }
}
