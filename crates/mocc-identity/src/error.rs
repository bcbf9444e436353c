use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("identity endpoint returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("malformed token response: {0}")]
    TokenResponse(String),

    #[error("secret '{0}' is empty or missing")]
    SecretEmpty(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
