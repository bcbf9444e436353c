//! SignalR Service: server-side sends through the REST API and client
//! negotiation.
//!
//! REST calls are authorised with a short-lived HS256 token signed with the
//! account access key, or with an Entra ID token when no key is configured.
//! Negotiation always needs the access key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use mocc_identity::{TokenCredential, http_client};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use crate::{NotifyError, check};

const SIGNALR_SCOPE: &str = "https://signalr.azure.com/.default";
const REFRESH_TARGET: &str = "newRecipe";
const REFRESH_MESSAGE: &str = "Nuovi dati disponibili";
const CLIENT_TOKEN_TTL_SECS: i64 = 3600;
const SERVER_TOKEN_TTL_SECS: i64 = 300;

/// What a client needs to open a hub connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub url: String,
    pub access_token: String,
}

#[async_trait]
pub trait RealtimeBroadcaster: Send + Sync {
    /// Ask every connection of `user_id` to refresh its data.
    async fn refresh(&self, user_id: &str) -> Result<(), NotifyError>;

    /// Connection details for a client acting as `user_id`.
    fn negotiate(&self, user_id: &str) -> Result<ConnectionInfo, NotifyError>;
}

/// Send a refresh and log; failures never reach the caller.
pub async fn refresh_best_effort(broadcaster: &dyn RealtimeBroadcaster, user_id: &str) {
    match broadcaster.refresh(user_id).await {
        Ok(()) => info!(user_id, "sent realtime refresh"),
        Err(e) => error!(error = %e, user_id, "failed to send realtime refresh"),
    }
}

/// `Endpoint=https://...;AccessKey=...;Version=1.0;`
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRConnectionString {
    pub endpoint: String,
    pub access_key: Option<String>,
}

impl SignalRConnectionString {
    pub fn parse(value: &str) -> Result<Self, NotifyError> {
        let mut endpoint = None;
        let mut access_key = None;
        for pair in value.split(';').filter(|p| !p.trim().is_empty()) {
            let Some((key, val)) = pair.split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(val.trim().trim_end_matches('/').to_string()),
                "accesskey" => access_key = Some(val.trim().to_string()),
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(|| {
            NotifyError::Config("SignalR connection string has no Endpoint".to_string())
        })?;
        Ok(Self {
            endpoint,
            access_key,
        })
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    nameid: Option<&'a str>,
}

pub struct SignalRClient {
    client: reqwest::Client,
    endpoint: String,
    hub: String,
    access_key: Option<String>,
    credential: Option<Arc<dyn TokenCredential>>,
}

impl SignalRClient {
    pub fn new(endpoint: &str, hub: &str) -> Self {
        let client = http_client(Duration::from_secs(5));
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            hub: hub.to_string(),
            access_key: None,
            credential: None,
        }
    }

    pub fn from_connection_string(connection: &SignalRConnectionString, hub: &str) -> Self {
        Self::new(&connection.endpoint, hub).with_access_key(connection.access_key.clone())
    }

    pub fn with_access_key(mut self, access_key: Option<String>) -> Self {
        self.access_key = access_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_credential(mut self, credential: Arc<dyn TokenCredential>) -> Self {
        self.credential = Some(credential);
        self
    }

    fn sign(&self, key: &str, audience: &str, user_id: Option<&str>, ttl_secs: i64) -> Result<String, NotifyError> {
        let claims = Claims {
            aud: audience,
            exp: (Utc::now() + TimeDelta::seconds(ttl_secs)).timestamp(),
            nameid: user_id,
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(key.as_bytes()),
        )?)
    }

    async fn server_token(&self, url: &str) -> Result<String, NotifyError> {
        if let Some(key) = &self.access_key {
            return self.sign(key, url, None, SERVER_TOKEN_TTL_SECS);
        }
        match &self.credential {
            Some(credential) => Ok(credential.token(SIGNALR_SCOPE).await?.token),
            None => Err(NotifyError::Config(
                "SignalR needs an access key or a credential".to_string(),
            )),
        }
    }
}

#[async_trait]
impl RealtimeBroadcaster for SignalRClient {
    async fn refresh(&self, user_id: &str) -> Result<(), NotifyError> {
        let url = format!("{}/api/v1/hubs/{}/users/{}", self.endpoint, self.hub, user_id);
        let token = self.server_token(&url).await?;

        let resp = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "target": REFRESH_TARGET,
                "arguments": [{"type": "refresh", "message": REFRESH_MESSAGE}],
            }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    fn negotiate(&self, user_id: &str) -> Result<ConnectionInfo, NotifyError> {
        let key = self
            .access_key
            .as_deref()
            .ok_or_else(|| NotifyError::Config("no SignalR access key configured".to_string()))?;
        let url = format!("{}/client/?hub={}", self.endpoint, self.hub);
        let access_token = self.sign(key, &url, Some(user_id), CLIENT_TOKEN_TTL_SECS)?;
        Ok(ConnectionInfo { url, access_token })
    }
}
