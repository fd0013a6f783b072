use thiserror::Error;

/// The single error kind raised when a membership precondition of a
/// structural operation is violated. Carries a human-readable description
/// only; no mutation has happened by the time it is raised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

pub type TreeResult<T> = Result<T, TreeError>;
