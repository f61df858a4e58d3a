//src/error.rs

use thiserror::Error;

/// Every failure the reconciliation engine can surface.
///
/// None of these are retried: parsing and filtering are deterministic, so
/// the caller decides whether to abort the run or carry on with other stages.
#[derive(Debug, Error)]
pub enum JoinError {
    /// A malformed alignment statistics row or annotation row.
    #[error("parse error in {source_name}, line {line}: {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },

    /// Coordinates and sequences disagree; upstream files are mismatched.
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// One or both searches produced nothing usable.
    #[error("{0}")]
    EmptyResult(String),

    /// An unrecognized option value, e.g. an unknown search tool name.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JoinError>;

impl JoinError {
    pub(crate) fn parse(source_name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        JoinError::Parse {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }
}
