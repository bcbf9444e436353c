use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("credential error: {0}")]
    Identity(#[from] mocc_identity::IdentityError),

    #[error("token signing failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("configuration error: {0}")]
    Config(String),
}
