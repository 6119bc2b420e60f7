use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite operation failed: {0}")]
    SQLite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    pub(crate) fn poisoned() -> Self {
        StorageError::Other(anyhow::anyhow!("storage lock poisoned"))
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
