//! Planner error types.

use pathq_detect::ModelError;
use pathq_predicate::PredicateError;
use thiserror::Error;

/// Result type for planner operations.
pub type PlannerResult<T> = Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Empty parameter grid: {0}")]
    EmptyGrid(&'static str),

    #[error("Quality curve has no samples")]
    EmptyCurve,

    #[error("Accuracy bound {bound} not met, best achievable accuracy is {achieved_accuracy}")]
    BoundViolation { achieved_accuracy: f64, bound: f64 },

    #[error("Stage '{stage}' failed: {cause}")]
    StageFailure {
        stage: String,
        #[source]
        cause: ModelError,
    },

    #[error(transparent)]
    Predicate(#[from] PredicateError),
}

impl PlannerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn stage_failure(stage: impl Into<String>, cause: ModelError) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            cause,
        }
    }
}
