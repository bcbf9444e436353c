use mocc_ai::AiError;
use mocc_core::EventUrlError;
use mocc_identity::IdentityError;
use mocc_notify::NotifyError;
use mocc_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("AI service error: {0}")]
    Ai(#[from] AiError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("credential error: {0}")]
    Identity(#[from] IdentityError),

    #[error("event URL rejected: {0}")]
    EventUrl(#[from] EventUrlError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),
}
