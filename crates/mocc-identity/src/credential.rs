//! Bearer-token credentials.
//!
//! [`ManagedIdentityCredential`] talks to the hosting platform's identity
//! endpoint (App Service style when `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` are
//! provided, the VM metadata service otherwise) and caches one token per scope
//! until shortly before it expires.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::IdentityError;
use crate::http::http_client;

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";
const IMDS_API_VERSION: &str = "2018-02-01";

/// Tokens are refreshed this many seconds before they expire.
const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - TimeDelta::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Source of bearer tokens for a given OAuth scope (e.g. `https://storage.azure.com/.default`).
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn token(&self, scope: &str) -> Result<AccessToken, IdentityError>;
}

/// A fixed token, for local runs against services that accept a pre-issued token.
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn token(&self, _scope: &str) -> Result<AccessToken, IdentityError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_on: DateTime::<Utc>::MAX_UTC,
        })
    }
}

enum IdentitySource {
    AppService { endpoint: String, header: String },
    Imds { endpoint: String },
}

/// Managed identity of the hosting platform.
pub struct ManagedIdentityCredential {
    client: reqwest::Client,
    source: IdentitySource,
    client_id: Option<String>,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl ManagedIdentityCredential {
    /// App Service / Functions identity endpoint.
    pub fn app_service(endpoint: String, header: String) -> Self {
        Self::with_source(IdentitySource::AppService { endpoint, header })
    }

    /// Instance metadata service at its well-known address.
    pub fn imds() -> Self {
        Self::imds_at(IMDS_ENDPOINT.to_string())
    }

    /// Instance metadata service at `endpoint`.
    pub fn imds_at(endpoint: String) -> Self {
        Self::with_source(IdentitySource::Imds { endpoint })
    }

    /// Pick the App Service endpoint when both values are set, IMDS otherwise.
    pub fn from_parts(endpoint: Option<String>, header: Option<String>) -> Self {
        match (endpoint, header) {
            (Some(endpoint), Some(header)) => Self::app_service(endpoint, header),
            _ => Self::imds(),
        }
    }

    /// Request tokens for a user-assigned identity.
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }

    fn with_source(source: IdentitySource) -> Self {
        let client = http_client(Duration::from_secs(10));
        Self {
            client,
            source,
            client_id: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn fetch(&self, resource: &str) -> Result<AccessToken, IdentityError> {
        let mut query = vec![("resource", resource)];
        if let Some(id) = &self.client_id {
            query.push(("client_id", id.as_str()));
        }

        let request = match &self.source {
            IdentitySource::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.client
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
            }
            IdentitySource::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.client.get(endpoint).header("Metadata", "true")
            }
        };

        let resp = request.query(&query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = resp.json().await?;
        parse_token_response(&body)
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn token(&self, scope: &str) -> Result<AccessToken, IdentityError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(scope) {
            if token.is_fresh(Utc::now()) {
                return Ok(token.clone());
            }
        }

        let resource = scope.trim_end_matches("/.default");
        debug!(resource, "requesting managed identity token");
        let token = self.fetch(resource).await?;
        cache.insert(scope.to_string(), token.clone());
        Ok(token)
    }
}

/// `expires_on` arrives as epoch seconds, either as a string or a number.
fn parse_token_response(body: &Value) -> Result<AccessToken, IdentityError> {
    let token = body
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| IdentityError::TokenResponse("missing access_token".to_string()))?;

    let expires_on = match body.get("expires_on") {
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    }
    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    .ok_or_else(|| IdentityError::TokenResponse("missing or invalid expires_on".to_string()))?;

    Ok(AccessToken {
        token: token.to_string(),
        expires_on,
    })
}
