use thiserror::Error;

/// Favorites persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
