//! Deterministic stand-ins for the AI services, for local runs and tests.

use async_trait::async_trait;
use mocc_core::{AnalyzeResult, CategoryAnalysis, HarmCategory};
use tokio::sync::Mutex;

use crate::chat::{ChatModel, ChatRequest};
use crate::document::ReceiptAnalyzer;
use crate::safety::ContentModerator;
use crate::AiError;

fn unavailable(service: &str) -> AiError {
    AiError::Server {
        status: 503,
        body: format!("{service} unavailable"),
    }
}

/// Replies are matched by checking whether any message contains a registered
/// substring; the first match in registration order wins.
#[derive(Debug, Default)]
pub struct FakeChatModel {
    responses: Vec<(String, String)>,
    default_response: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, prompt_contains: &str, response: &str) -> Self {
        self.responses
            .push((prompt_contains.to_string(), response.to_string()));
        self
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = Some(response.to_string());
        self
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ChatModel for FakeChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, AiError> {
        self.requests.lock().await.push(request.clone());

        let text: Vec<String> = request.messages.iter().map(|m| m.text()).collect();
        self.responses
            .iter()
            .find(|(needle, _)| text.iter().any(|t| t.contains(needle.as_str())))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default_response.clone())
            .ok_or_else(|| unavailable("chat model"))
    }
}

/// Returns a fixed analysis result, or fails when none is configured.
#[derive(Debug, Default)]
pub struct FakeReceiptAnalyzer {
    result: Option<AnalyzeResult>,
    calls: Mutex<usize>,
}

impl FakeReceiptAnalyzer {
    pub fn returning(result: AnalyzeResult) -> Self {
        Self {
            result: Some(result),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> usize {
        *self.calls.lock().await
    }
}

#[async_trait]
impl ReceiptAnalyzer for FakeReceiptAnalyzer {
    async fn analyze_receipt(&self, _image: &[u8]) -> Result<AnalyzeResult, AiError> {
        *self.calls.lock().await += 1;
        self.result
            .clone()
            .ok_or_else(|| unavailable("document analysis"))
    }
}

/// Scores text containing a registered term at the given severity in every
/// category and everything else at zero. Images get a fixed severity.
#[derive(Debug, Default)]
pub struct FakeModerator {
    flagged_terms: Vec<(String, u8)>,
    image_severity: u8,
    failing: bool,
}

impl FakeModerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag_term(mut self, term: &str, severity: u8) -> Self {
        self.flagged_terms.push((term.to_string(), severity));
        self
    }

    pub fn with_image_severity(mut self, severity: u8) -> Self {
        self.image_severity = severity;
        self
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn scores(&self, severity: u8) -> Result<Vec<CategoryAnalysis>, AiError> {
        if self.failing {
            return Err(unavailable("content safety"));
        }
        Ok(HarmCategory::ALL
            .iter()
            .map(|c| CategoryAnalysis::new(*c, severity))
            .collect())
    }
}

#[async_trait]
impl ContentModerator for FakeModerator {
    async fn analyze_text(&self, text: &str) -> Result<Vec<CategoryAnalysis>, AiError> {
        let severity = self
            .flagged_terms
            .iter()
            .filter(|(term, _)| text.contains(term.as_str()))
            .map(|(_, s)| *s)
            .max()
            .unwrap_or(0);
        self.scores(severity)
    }

    async fn analyze_image(&self, _image: &[u8]) -> Result<Vec<CategoryAnalysis>, AiError> {
        self.scores(self.image_severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use mocc_core::Verdict;

    #[tokio::test]
    async fn chat_matches_by_substring_and_records() {
        let model = FakeChatModel::new()
            .with_response("etichetta", r#"{"name": "Pasta"}"#)
            .with_default_response("ricetta");

        let label = ChatRequest::new(vec![ChatMessage::user_with_image("etichetta", &[1])], 300, 0.3);
        let other = ChatRequest::new(vec![ChatMessage::user("altro")], 500, 0.7);

        assert_eq!(model.complete(&label).await.unwrap(), r#"{"name": "Pasta"}"#);
        assert_eq!(model.complete(&other).await.unwrap(), "ricetta");
        assert_eq!(model.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn chat_without_match_or_default_fails() {
        let model = FakeChatModel::new();
        let request = ChatRequest::new(vec![ChatMessage::user("x")], 10, 0.0);
        assert!(model.complete(&request).await.is_err());
    }

    #[tokio::test]
    async fn moderator_flags_registered_terms() {
        let moderator = FakeModerator::new().flag_term("insulto", 5);
        let bad = moderator.analyze_text("un insulto").await.unwrap();
        let fine = moderator.analyze_text("buon appetito").await.unwrap();

        assert!(Verdict::from_analysis(&bad).is_rejected());
        assert_eq!(Verdict::from_analysis(&fine), Verdict::Accepted);
        assert!(FakeModerator::failing().analyze_image(&[]).await.is_err());
    }
}
