//! Error types for the checker

use braincheck_core::Pc;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for checker operations
pub type CheckResult<T> = std::result::Result<T, CheckError>;

/// Errors that abort an analysis.
///
/// Running out of budget is not an error: it is reported as
/// [`crate::SearchOutcome::Incomplete`].
#[derive(Debug, Error)]
pub enum CheckError {
    /// A bracket has no entry in the jump table. The program supplier broke
    /// its contract; the analysis cannot continue.
    #[error("malformed jump table: no target for bracket at pc {pc}")]
    MalformedJumpTable { pc: Pc },

    /// The requested label does not occur in the program
    #[error("label \"{label}\" does not exist in the program")]
    UnknownLabel { label: String },

    /// The worker pool for parallel exploration could not be built
    #[error("failed to create thread pool: {0}")]
    ThreadPool(String),

    /// The check configuration could not be parsed
    #[error("invalid configuration: {}", join_config_errors(.0))]
    Config(Vec<ConfigError>),
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<ConfigError>> for CheckError {
    fn from(errors: Vec<ConfigError>) -> Self {
        CheckError::Config(errors)
    }
}
