// src/error.rs
use thiserror::Error;

/// Failures while retrieving a bulletin or locating one on the index page.
#[derive(Error, Debug)]
pub enum FetchError {
    /// No bulletin published for the requested window, or no bulletin link
    /// on the index page. Expected; callers count and skip it.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure or a non-404 error status.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound(_))
    }
}

/// Failures turning raw bulletin bytes into a record. Each one is fatal for
/// that bulletin only.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("could not decode bulletin as a table with any known encoding ({0})")]
    Decode(String),

    /// The header row lacks the identifying column; the publication format
    /// probably changed upstream.
    #[error("column {column:?} not found, header was {found:?}")]
    MissingColumn { column: String, found: Vec<String> },

    #[error("currency {0} not present in bulletin")]
    CurrencyNotFound(String),

    #[error("no positive rate for {0} in either rate column")]
    RateNotFound(String),

    #[error("filename {filename:?} carries an invalid date {code:?}")]
    InvalidFilenameDate { filename: String, code: String },
}

impl ExtractError {
    /// Whether this failure points at an upstream format change rather than
    /// a routine gap in the data.
    pub fn is_format_change(&self) -> bool {
        matches!(
            self,
            ExtractError::MissingColumn { .. } | ExtractError::Decode(_)
        )
    }
}
