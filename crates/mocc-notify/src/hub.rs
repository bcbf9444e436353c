//! Notification Hubs REST client.
//!
//! Hub coordinates and the SAS key are read from the secret source on each
//! call; the secret source does its own caching.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mocc_identity::{SecretSource, build_sas_token, http_client};
use serde_json::json;
use tracing::{error, info};

use crate::installation::Installation;
use crate::{NotifyError, check};

pub const NAMESPACE_SECRET: &str = "notifHub-namespace";
pub const HUB_NAME_SECRET: &str = "notifHub-name";
pub const POLICY_NAME_SECRET: &str = "notifHub-sas-policy-name";
pub const POLICY_KEY_SECRET: &str = "notifHub-sas-primary";

const INSTALLATION_API_VERSION: &str = "2023-10-01-preview";
const MESSAGES_API_VERSION: &str = "2015-01";
const SAS_TTL_SECS: i64 = 300;

#[async_trait]
pub trait PushNotifier: Send + Sync {
    /// Create or replace a device installation.
    async fn register(&self, installation: &Installation) -> Result<(), NotifyError>;

    /// Send a template notification carrying `message`, to `tag` or to everyone.
    async fn send_template(&self, message: &str, tag: Option<&str>) -> Result<(), NotifyError>;
}

/// Send and log; failures never reach the caller.
pub async fn send_best_effort(notifier: &dyn PushNotifier, message: &str, tag: Option<&str>) {
    match notifier.send_template(message, tag).await {
        Ok(()) => info!(tag = tag.unwrap_or("<broadcast>"), "template notification sent"),
        Err(e) => error!(error = %e, tag = tag.unwrap_or("<broadcast>"), "failed to send template notification"),
    }
}

pub struct NotificationHubClient {
    client: reqwest::Client,
    secrets: Arc<dyn SecretSource>,
    base_url: Option<String>,
}

struct HubTarget {
    resource_uri: String,
    authorization: String,
}

impl NotificationHubClient {
    pub fn new(secrets: Arc<dyn SecretSource>) -> Self {
        let client = http_client(Duration::from_secs(10));
        Self {
            client,
            secrets,
            base_url: None,
        }
    }

    /// Address the hub under `base_url` instead of the namespace host.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    async fn target(&self) -> Result<HubTarget, NotifyError> {
        let hub_name = self.secrets.secret(HUB_NAME_SECRET).await?;
        let resource_uri = match &self.base_url {
            Some(base) => format!("{base}/{hub_name}"),
            None => {
                let namespace = self.secrets.secret(NAMESPACE_SECRET).await?;
                format!("https://{namespace}.servicebus.windows.net/{hub_name}")
            }
        };
        let policy = self.secrets.secret(POLICY_NAME_SECRET).await?;
        let key = self.secrets.secret(POLICY_KEY_SECRET).await?;

        let authorization = build_sas_token(&resource_uri, &policy, &key, SAS_TTL_SECS, Utc::now());
        Ok(HubTarget {
            resource_uri,
            authorization,
        })
    }
}

#[async_trait]
impl PushNotifier for NotificationHubClient {
    async fn register(&self, installation: &Installation) -> Result<(), NotifyError> {
        let target = self.target().await?;
        let url = format!(
            "{}/installations/{}",
            target.resource_uri, installation.installation_id
        );

        info!(platform = %installation.platform, "registering device with notification hub");
        let resp = self
            .client
            .put(&url)
            .query(&[("api-version", INSTALLATION_API_VERSION)])
            .header("authorization", target.authorization)
            .header("x-ms-version", INSTALLATION_API_VERSION)
            .json(installation)
            .send()
            .await?;
        check(resp).await?;
        info!(installation_id = %installation.installation_id, "device registered");
        Ok(())
    }

    async fn send_template(&self, message: &str, tag: Option<&str>) -> Result<(), NotifyError> {
        let target = self.target().await?;
        let url = format!("{}/messages/", target.resource_uri);

        let mut request = self
            .client
            .post(&url)
            .query(&[("api-version", MESSAGES_API_VERSION)])
            .header("authorization", target.authorization)
            .header("content-type", "application/json;charset=utf-8")
            .header("ServiceBusNotification-Format", "template")
            .body(json!({ "message": message }).to_string());
        if let Some(tag) = tag {
            request = request.header("ServiceBusNotification-Tags", tag);
        }

        check(request.send().await?).await?;
        Ok(())
    }
}
