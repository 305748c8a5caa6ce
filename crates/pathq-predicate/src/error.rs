//! Predicate error types.

use pathq_models::GeometryError;
use thiserror::Error;

/// Result type for predicate operations.
pub type PredicateResult<T> = Result<T, PredicateError>;

/// Configuration errors raised while building or querying the registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    #[error("Unknown predicate: {0}")]
    UnknownPredicate(String),

    #[error("Predicate '{composite}' references unknown predicate '{member}'")]
    UnknownMember { composite: String, member: String },

    #[error("Predicate already registered: {0}")]
    DuplicateName(String),

    #[error("Invalid region: {0}")]
    Geometry(#[from] GeometryError),
}

impl PredicateError {
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownPredicate(name.into())
    }
}
