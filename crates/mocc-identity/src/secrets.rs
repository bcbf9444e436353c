//! Named secrets (notification hub keys and the like).
//!
//! [`KeyVaultSecrets`] fetches each secret once and keeps it for the lifetime
//! of the instance; there is no invalidation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::http::http_client;
use crate::{IdentityError, TokenCredential};

const VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const VAULT_API_VERSION: &str = "7.4";

#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn secret(&self, name: &str) -> Result<String, IdentityError>;
}

#[derive(Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

/// Secrets read from a key vault with a per-instance cache.
pub struct KeyVaultSecrets {
    client: reqwest::Client,
    vault_url: String,
    credential: Arc<dyn TokenCredential>,
    cache: RwLock<HashMap<String, String>>,
}

impl KeyVaultSecrets {
    /// `vault_url` is like `https://mocc-kv.vault.azure.net` (trailing slash optional).
    pub fn new(vault_url: &str, credential: Arc<dyn TokenCredential>) -> Self {
        let client = http_client(Duration::from_secs(10));
        Self {
            client,
            vault_url: vault_url.trim_end_matches('/').to_string(),
            credential,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch(&self, name: &str) -> Result<String, IdentityError> {
        let token = self.credential.token(VAULT_SCOPE).await?;
        let url = format!("{}/secrets/{}", self.vault_url, name);

        let resp = self
            .client
            .get(&url)
            .query(&[("api-version", VAULT_API_VERSION)])
            .bearer_auth(&token.token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let bundle: SecretBundle = resp.json().await?;
        bundle
            .value
            .filter(|v| !v.is_empty())
            .ok_or_else(|| IdentityError::SecretEmpty(name.to_string()))
    }
}

#[async_trait]
impl SecretSource for KeyVaultSecrets {
    async fn secret(&self, name: &str) -> Result<String, IdentityError> {
        if let Some(value) = self.cache.read().await.get(name) {
            return Ok(value.clone());
        }

        let value = self.fetch(name).await?;
        info!(secret = name, "loaded secret from key vault");
        self.cache
            .write()
            .await
            .insert(name.to_string(), value.clone());
        Ok(value)
    }
}

/// Secrets taken from environment variables, for runs without a vault.
///
/// `notifHub-sas-primary` is read from `NOTIFHUB_SAS_PRIMARY`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl EnvSecrets {
    pub fn variable_name(secret: &str) -> String {
        secret.to_ascii_uppercase().replace('-', "_")
    }
}

#[async_trait]
impl SecretSource for EnvSecrets {
    async fn secret(&self, name: &str) -> Result<String, IdentityError> {
        std::env::var(Self::variable_name(name))
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| IdentityError::SecretEmpty(name.to_string()))
    }
}

/// Fixed secrets held in memory.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SecretSource for StaticSecrets {
    async fn secret(&self, name: &str) -> Result<String, IdentityError> {
        self.values
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| IdentityError::SecretEmpty(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticTokenCredential;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vault(server: &MockServer) -> KeyVaultSecrets {
        KeyVaultSecrets::new(
            &format!("{}/", server.uri()),
            Arc::new(StaticTokenCredential::new("kv-token")),
        )
    }

    #[tokio::test]
    async fn secret_is_fetched_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/notifHub-name"))
            .and(query_param("api-version", "7.4"))
            .and(header("authorization", "Bearer kv-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": "mocc-hub"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let secrets = vault(&server);
        assert_eq!(secrets.secret("notifHub-name").await.unwrap(), "mocc-hub");
        assert_eq!(secrets.secret("notifHub-name").await.unwrap(), "mocc-hub");
    }

    #[tokio::test]
    async fn empty_secret_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/notifHub-sas-primary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": ""})))
            .mount(&server)
            .await;

        let err = vault(&server)
            .secret("notifHub-sas-primary")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::SecretEmpty(name) if name == "notifHub-sas-primary"));
    }

    #[tokio::test]
    async fn missing_secret_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("SecretNotFound"))
            .mount(&server)
            .await;

        let err = vault(&server).secret("nope").await.unwrap_err();
        assert!(matches!(err, IdentityError::Server { status: 404, .. }));
    }

    #[test]
    fn env_variable_names() {
        assert_eq!(EnvSecrets::variable_name("notifHub-sas-primary"), "NOTIFHUB_SAS_PRIMARY");
        assert_eq!(EnvSecrets::variable_name("notifHub-namespace"), "NOTIFHUB_NAMESPACE");
    }

    #[tokio::test]
    async fn static_secrets_lookup() {
        let secrets = StaticSecrets::new().with("a", "1").with("b", "");
        assert_eq!(secrets.secret("a").await.unwrap(), "1");
        assert!(secrets.secret("b").await.is_err());
        assert!(secrets.secret("c").await.is_err());
    }
}
