//! Worker error types.

use std::path::PathBuf;

use pathq_detect::ModelError;
use pathq_models::Stage;
use pathq_planner::PlannerError;
use pathq_predicate::PredicateError;
use pathq_storage::StorageError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Process exit codes of the command-line tools.
pub mod exit_code {
    pub const OK: i32 = 0;
    pub const FAILURE: i32 = 1;
    /// Configuration problem: unknown query, malformed plan, bad arguments
    pub const CONFIGURATION: i32 = 2;
    pub const BOUND_VIOLATION: i32 = 3;
    pub const STAGE_FAILURE: i32 = 4;
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Malformed plan {}: {message}", path.display())]
    MalformedPlan { path: PathBuf, message: String },

    #[error("Stage '{stage}' failed: {cause}")]
    StageFailure {
        stage: Stage,
        #[source]
        cause: ModelError,
    },

    #[error("Predicate error: {0}")]
    Predicate(#[from] PredicateError),

    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn stage_failure(stage: Stage, cause: ModelError) -> Self {
        Self::StageFailure { stage, cause }
    }

    /// Map a plan file read failure. A missing or unparsable plan is a
    /// configuration problem, anything else is an I/O failure.
    pub fn from_plan_read(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => Self::MalformedPlan {
                path,
                message: "plan file not found".to_string(),
            },
            StorageError::Malformed { path, source } => Self::MalformedPlan {
                path,
                message: source.to_string(),
            },
            other => Self::Storage(other),
        }
    }

    /// Returns true if a stage's model invocation failed.
    pub fn is_stage_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::StageFailure { .. } | WorkerError::Planner(PlannerError::StageFailure { .. })
        )
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            WorkerError::Configuration(_)
            | WorkerError::UnknownQuery(_)
            | WorkerError::MalformedPlan { .. }
            | WorkerError::Predicate(_)
            | WorkerError::Model(ModelError::SourceNotFound(_)) => exit_code::CONFIGURATION,
            WorkerError::StageFailure { .. } => exit_code::STAGE_FAILURE,
            WorkerError::Planner(err) => match err {
                PlannerError::BoundViolation { .. } => exit_code::BOUND_VIOLATION,
                PlannerError::StageFailure { .. } => exit_code::STAGE_FAILURE,
                PlannerError::Configuration(_)
                | PlannerError::EmptyGrid(_)
                | PlannerError::EmptyCurve
                | PlannerError::Predicate(_) => exit_code::CONFIGURATION,
            },
            WorkerError::Model(_)
            | WorkerError::Storage(_)
            | WorkerError::Json(_)
            | WorkerError::Io(_) => exit_code::FAILURE,
        }
    }
}
