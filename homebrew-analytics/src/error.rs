use thiserror::Error;

/// Common error type for Homebrew analytics components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// An analytics document could not be decoded.
///
/// Covers malformed JSON, missing required fields (`end_date`, `items`) and an
/// `end_date` that is not a `YYYY-MM-DD` calendar date.
#[derive(Debug, Error)]
#[error("Invalid analytics document: {0}")]
pub struct ParseError(#[from] serde_json::Error);

/// A formatted count string could not be turned into a gauge value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Empty count value")]
    Empty,

    #[error("Invalid count value: {0:?}")]
    Invalid(String),

    #[error("Count value must be a finite non-negative number: {0:?}")]
    OutOfRange(String),
}
