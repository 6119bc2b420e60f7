use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlotiqError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("We couldn't connect to API. Check if you specified correct API url (in most cases it is \"https://api.flotiq.com\")")]
    Connectivity,

    #[error("We couldn't authorize you in API. Check if you specified correct API token (if you don't know what it is check: https://flotiq.com/docs/API/)")]
    Authorization,

    #[error("API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] fgraph::errors::StorageError),

    #[error("unrecognized data url: {0}")]
    InvalidDataUrl(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FlotiqError {
    /// Errors scoped to a single request; the run can carry on without it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FlotiqError::Api { .. }
                | FlotiqError::Timeout(_)
                | FlotiqError::Http(_)
                | FlotiqError::Json(_)
                | FlotiqError::InvalidDataUrl(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FlotiqError>;
