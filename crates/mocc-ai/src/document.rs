//! Receipt analysis with the Document Intelligence `prebuilt-receipt` model.
//!
//! Analysis is a long-running operation: the submit call answers with an
//! `Operation-Location` that is polled until it reports `succeeded` or `failed`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mocc_core::AnalyzeResult;
use mocc_identity::{TokenCredential, http_client};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::{AiError, COGNITIVE_SCOPE, check};

const API_VERSION: &str = "2024-11-30";
const RECEIPT_MODEL: &str = "prebuilt-receipt";
const DEFAULT_MAX_POLLS: u32 = 120;

#[async_trait]
pub trait ReceiptAnalyzer: Send + Sync {
    async fn analyze_receipt(&self, image: &[u8]) -> Result<AnalyzeResult, AiError>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationStatus {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

pub struct DocumentIntelligenceClient {
    client: reqwest::Client,
    endpoint: String,
    credential: Arc<dyn TokenCredential>,
    poll_interval: Duration,
    max_polls: u32,
}

impl DocumentIntelligenceClient {
    pub fn new(endpoint: &str, credential: Arc<dyn TokenCredential>) -> Self {
        let client = http_client(Duration::from_secs(30));
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credential,
            poll_interval: Duration::from_secs(1),
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn submit(&self, token: &str, image: &[u8]) -> Result<String, AiError> {
        let url = format!(
            "{}/documentintelligence/documentModels/{}:analyze",
            self.endpoint, RECEIPT_MODEL
        );
        let resp = self
            .client
            .post(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token)
            .json(&json!({ "base64Source": STANDARD.encode(image) }))
            .send()
            .await?;
        let resp = check(resp).await?;

        resp.headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AiError::UnexpectedResponse("missing Operation-Location".to_string()))
    }
}

#[async_trait]
impl ReceiptAnalyzer for DocumentIntelligenceClient {
    async fn analyze_receipt(&self, image: &[u8]) -> Result<AnalyzeResult, AiError> {
        let token = self.credential.token(COGNITIVE_SCOPE).await?;
        let operation = self.submit(&token.token, image).await?;
        debug!(operation = %operation, "receipt analysis submitted");

        for attempt in 1..=self.max_polls {
            let resp = self
                .client
                .get(&operation)
                .bearer_auth(&token.token)
                .send()
                .await?;
            let status: OperationStatus = check(resp).await?.json().await?;

            match status.status.as_str() {
                "succeeded" => {
                    let result = status.analyze_result.ok_or_else(|| {
                        AiError::UnexpectedResponse("succeeded without analyzeResult".to_string())
                    })?;
                    info!(
                        documents = result.documents.len(),
                        polls = attempt,
                        "receipt analysis succeeded"
                    );
                    return Ok(result);
                }
                "failed" | "canceled" => {
                    let detail = status
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| status.status.clone());
                    return Err(AiError::AnalysisFailed(detail));
                }
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        Err(AiError::PollTimeout(self.max_polls))
    }
}
