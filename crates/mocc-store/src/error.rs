use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("credential error: {0}")]
    Identity(#[from] mocc_identity::IdentityError),

    #[error("invalid account key: {0}")]
    InvalidKey(String),

    #[error("{0}")]
    Other(String),
}
