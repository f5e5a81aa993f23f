use thiserror::Error;

use crate::driver::DbError;

/// Errors surfaced to callers of the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection settings were missing at startup; storage is disabled.
    #[error("storage is not configured")]
    NotConfigured,

    /// Every attempt failed; carries the last observed error.
    #[error("database unavailable after {attempts} attempt(s): {source}")]
    Unavailable {
        attempts: u32,
        #[source]
        source: DbError,
    },

    /// Create with a national ID that is already registered.
    #[error("national ID {national_id} is already registered")]
    DuplicateNationalId { national_id: String },

    /// Non-retryable driver error (e.g. another constraint violation).
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// A row did not have the expected shape.
    #[error("unexpected row shape: {0}")]
    Decode(String),

    /// A value produced by storage violated a record rule.
    #[error(transparent)]
    Record(#[from] roster_core::CoreError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
