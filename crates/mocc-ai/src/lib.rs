//! AI service clients: chat completions, receipt analysis and content
//! moderation, each behind a trait with a deterministic fake.

mod error;
pub use error::AiError;

pub mod chat;
pub mod document;
pub mod fake;
pub mod safety;

pub use chat::{AzureOpenAiClient, ChatMessage, ChatModel, ChatRequest};
pub use document::{DocumentIntelligenceClient, ReceiptAnalyzer};
pub use fake::{FakeChatModel, FakeModerator, FakeReceiptAnalyzer};
pub use safety::{ContentModerator, ContentSafetyClient};

/// OAuth scope shared by the Cognitive Services endpoints.
pub(crate) const COGNITIVE_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

pub(crate) async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AiError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}
