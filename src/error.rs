use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuantileError>;

#[derive(Debug, Error)]
pub enum QuantileError {
    /// The iteration cap was reached before the convergence test held.
    #[error("{method} did not converge within {iterations} iterations (max. difference {max_diff:e})")]
    NotConverged {
        method: &'static str,
        iterations: usize,
        max_diff: f64,
    },

    /// A successor outside the solved set has no value yet: the components were not
    /// processed in dependency order.
    #[error("state {state} depends on state {successor} whose value is still undefined at step {step}")]
    UndefinedSuccessor {
        state: usize,
        successor: usize,
        step: usize,
    },

    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    #[error("linear program could not be solved: {0}")]
    LinearProgram(#[from] minilp::Error),

    #[error("SCCs requested before the decomposition finished")]
    SccStoreNotFinished,

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
