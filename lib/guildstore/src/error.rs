use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Batched input errors. Every problem with a request is collected and
    /// raised together so a caller can surface all of them in one round trip.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("schema definition error: {0}")]
    Schema(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Turn a non-empty error batch into a `Validation` failure.
pub(crate) fn ensure_valid(errors: Vec<String>) -> Result<(), StorageError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(StorageError::Validation(errors))
    }
}
