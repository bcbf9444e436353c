//! Chat completions against an Azure OpenAI deployment.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mocc_identity::{TokenCredential, http_client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{AiError, COGNITIVE_SCOPE, check};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: &str) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.to_string()),
        }
    }

    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.to_string()),
        }
    }

    /// A user turn carrying `text` and a JPEG image inlined as a data URL.
    pub fn user_with_image(text: &str, jpeg: &[u8]) -> Self {
        let url = format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg));
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: text.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ]),
        }
    }

    /// The text of this message, ignoring image parts.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature,
        }
    }
}

/// A chat model that returns the text of its first choice.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The reply, trimmed. Empty when the model returned no content.
    async fn complete(&self, request: &ChatRequest) -> Result<String, AiError>;
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct AzureOpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    deployment: String,
    api_version: String,
    credential: Arc<dyn TokenCredential>,
}

impl AzureOpenAiClient {
    pub fn new(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        let client = http_client(Duration::from_secs(60));
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: deployment.to_string(),
            api_version: api_version.to_string(),
            credential,
        }
    }
}

#[async_trait]
impl ChatModel for AzureOpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, AiError> {
        let token = self.credential.token(COGNITIVE_SCOPE).await?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        );

        debug!(url = %url, messages = request.messages.len(), "chat completion request");
        let resp = self
            .client
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .bearer_auth(&token.token)
            .json(request)
            .send()
            .await?;
        let resp = check(resp).await?;

        let completion: CompletionResponse = resp.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        info!(
            deployment = %self.deployment,
            chars = content.len(),
            "chat completion received"
        );
        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocc_identity::StaticTokenCredential;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AzureOpenAiClient {
        AzureOpenAiClient::new(
            &server.uri(),
            "gpt-4o-mini",
            "2024-06-01",
            Arc::new(StaticTokenCredential::new("ai-token")),
        )
    }

    #[test]
    fn image_message_wire_shape() {
        let msg = ChatMessage::user_with_image("guarda", &[0xff, 0xd8]);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "guarda"},
                    {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,/9g="}}
                ]
            })
        );
        assert_eq!(msg.text(), "guarda");
    }

    #[tokio::test]
    async fn completion_returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o-mini/chat/completions"))
            .and(query_param("api-version", "2024-06-01"))
            .and(header("authorization", "Bearer ai-token"))
            .and(body_partial_json(json!({
                "max_tokens": 500,
                "messages": [{"role": "system", "content": "sys"}, {"role": "user", "content": "ciao"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  Pasta al forno \n"}}]
            })))
            .mount(&server)
            .await;

        let request = ChatRequest::new(
            vec![ChatMessage::system("sys"), ChatMessage::user("ciao")],
            500,
            0.7,
        );
        let reply = client(&server).complete(&request).await.unwrap();
        assert_eq!(reply, "Pasta al forno");
    }

    #[tokio::test]
    async fn missing_content_is_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"choices": [{"message": {"content": null}}]})),
            )
            .mount(&server)
            .await;

        let request = ChatRequest::new(vec![ChatMessage::user("x")], 10, 0.0);
        assert_eq!(client(&server).complete(&request).await.unwrap(), "");
    }

    #[tokio::test]
    async fn server_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("content_filter"))
            .mount(&server)
            .await;

        let request = ChatRequest::new(vec![ChatMessage::user("x")], 10, 0.0);
        let err = client(&server).complete(&request).await.unwrap_err();
        assert!(matches!(err, AiError::Server { status: 400, .. }));
    }
}
