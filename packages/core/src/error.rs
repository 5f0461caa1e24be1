//! Domain errors shared by every package.

use thiserror::Error;

/// A job submission broke one of the input rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("job name must be a non-empty string")]
    EmptyName,

    #[error("job argument {position} must be a non-empty string")]
    EmptyArgument { position: usize },
}

/// A status string outside the closed status set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);
