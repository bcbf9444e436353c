//! Content Safety text and image analysis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mocc_core::{CategoryAnalysis, HarmCategory};
use mocc_identity::{TokenCredential, http_client};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{AiError, COGNITIVE_SCOPE, check};

const API_VERSION: &str = "2024-09-01";

/// Scores content in every [`HarmCategory`]. Classification into a verdict is
/// left to [`mocc_core::Verdict`].
#[async_trait]
pub trait ContentModerator: Send + Sync {
    async fn analyze_text(&self, text: &str) -> Result<Vec<CategoryAnalysis>, AiError>;
    async fn analyze_image(&self, image: &[u8]) -> Result<Vec<CategoryAnalysis>, AiError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    #[serde(default)]
    categories_analysis: Vec<CategoryAnalysis>,
}

pub struct ContentSafetyClient {
    client: reqwest::Client,
    endpoint: String,
    credential: Arc<dyn TokenCredential>,
}

impl ContentSafetyClient {
    pub fn new(endpoint: &str, credential: Arc<dyn TokenCredential>) -> Self {
        let client = http_client(Duration::from_secs(30));
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credential,
        }
    }

    async fn analyze(&self, operation: &str, body: Value) -> Result<Vec<CategoryAnalysis>, AiError> {
        let token = self.credential.token(COGNITIVE_SCOPE).await?;
        let url = format!("{}/contentsafety/{}", self.endpoint, operation);
        let resp = self
            .client
            .post(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(&token.token)
            .json(&body)
            .send()
            .await?;
        let resp = check(resp).await?;

        let parsed: AnalyzeResponse = resp.json().await?;
        debug!(operation, categories = ?parsed.categories_analysis, "content safety result");
        Ok(parsed.categories_analysis)
    }
}

#[async_trait]
impl ContentModerator for ContentSafetyClient {
    async fn analyze_text(&self, text: &str) -> Result<Vec<CategoryAnalysis>, AiError> {
        self.analyze(
            "text:analyze",
            json!({ "text": text, "categories": HarmCategory::ALL }),
        )
        .await
    }

    async fn analyze_image(&self, image: &[u8]) -> Result<Vec<CategoryAnalysis>, AiError> {
        self.analyze(
            "image:analyze",
            json!({
                "image": { "content": STANDARD.encode(image) },
                "categories": HarmCategory::ALL,
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocc_core::Verdict;
    use mocc_identity::StaticTokenCredential;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ContentSafetyClient {
        ContentSafetyClient::new(&server.uri(), Arc::new(StaticTokenCredential::new("cs")))
    }

    #[tokio::test]
    async fn text_analysis_requests_all_categories() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contentsafety/text:analyze"))
            .and(query_param("api-version", "2024-09-01"))
            .and(body_json(json!({
                "text": "ciao a tutti",
                "categories": ["Hate", "SelfHarm", "Sexual", "Violence"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "blocklistsMatch": [],
                "categoriesAnalysis": [
                    {"category": "Hate", "severity": 0},
                    {"category": "SelfHarm", "severity": 0},
                    {"category": "Sexual"},
                    {"category": "Violence", "severity": 2}
                ]
            })))
            .mount(&server)
            .await;

        let analysis = client(&server).analyze_text("ciao a tutti").await.unwrap();
        assert_eq!(analysis.len(), 4);
        assert_eq!(analysis[2].severity(), 0);
        assert_eq!(Verdict::from_analysis(&analysis), Verdict::Accepted);
    }

    #[tokio::test]
    async fn image_analysis_sends_base64_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/contentsafety/image:analyze"))
            .and(body_json(json!({
                "image": {"content": "AQID"},
                "categories": ["Hate", "SelfHarm", "Sexual", "Violence"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "categoriesAnalysis": [{"category": "Violence", "severity": 6}]
            })))
            .mount(&server)
            .await;

        let analysis = client(&server).analyze_image(&[1, 2, 3]).await.unwrap();
        assert!(Verdict::from_analysis(&analysis).is_rejected());
    }

    #[tokio::test]
    async fn service_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server).analyze_text("x").await.unwrap_err();
        assert!(matches!(err, AiError::Server { status: 500, .. }));
    }
}
