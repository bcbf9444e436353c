use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("credential error: {0}")]
    Identity(#[from] mocc_identity::IdentityError),

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("analysis did not finish after {0} polls")]
    PollTimeout(u32),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}
