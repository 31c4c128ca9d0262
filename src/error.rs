//! Crate error type.
//!
//! Only whole-run precondition failures are errors. Problems confined to
//! one group (an over-long case, a solver timeout) are reported through
//! [`GroupStatus`](crate::models::GroupStatus) instead.

use thiserror::Error;

use crate::config::ConfigError;
use crate::validation::ValidationError;

/// Whole-run failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{} invalid input record(s); first: {}", .0.len(), first_message(.0))]
    InvalidInput(Vec<ValidationError>),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

fn first_message(errors: &[ValidationError]) -> &str {
    errors.first().map(|e| e.message.as_str()).unwrap_or("none")
}

impl From<Vec<ValidationError>> for Error {
    fn from(errors: Vec<ValidationError>) -> Self {
        Error::InvalidInput(errors)
    }
}

/// Result alias for whole-run operations.
pub type Result<T> = std::result::Result<T, Error>;
