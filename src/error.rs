use std::io;

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds surfaced by scoring, targeting, mining and the ledger.
///
/// A search that runs out of time is not represented here: it is a normal
/// `None` outcome of the search functions.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range report data. The offending report is
    /// skipped; the rest of the batch continues.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Bad engine parameter (honor divisor, base reward, difficulty...).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Raised from verification findings, never from `append`.
    #[error("ledger integrity violation at block(s) {indices:?}")]
    LedgerIntegrityViolation { indices: Vec<u64> },

    #[error("persistence failure ({context}): {source}")]
    PersistenceFailure {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn persistence(context: impl Into<String>, source: io::Error) -> Self {
        Error::PersistenceFailure {
            context: context.into(),
            source,
        }
    }
}
