//! The service handles shared by every flow.
//!
//! Built once at start-up and passed by reference; clients, the token cache
//! and the secret cache live here instead of in process-wide globals.

use std::sync::Arc;

use mocc_ai::{
    AzureOpenAiClient, ChatModel, ContentModerator, ContentSafetyClient,
    DocumentIntelligenceClient, ReceiptAnalyzer,
};
use mocc_identity::{
    EnvSecrets, KeyVaultSecrets, ManagedIdentityCredential, SecretSource, StaticTokenCredential,
    TokenCredential,
};
use mocc_notify::{
    NotificationHubClient, PushNotifier, RealtimeBroadcaster, SignalRClient,
    SignalRConnectionString,
};
use mocc_store::{AzureBlobStore, BlobStore, CosmosAuth, CosmosStore, DocumentStore};
use tracing::info;

use crate::HostError;
use crate::config::Settings;

#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub chat: Arc<dyn ChatModel>,
    pub receipts: Arc<dyn ReceiptAnalyzer>,
    pub moderator: Arc<dyn ContentModerator>,
    pub push: Arc<dyn PushNotifier>,
    pub realtime: Arc<dyn RealtimeBroadcaster>,
    /// Account used when an event URL does not name one.
    pub storage_account_url: String,
}

impl AppContext {
    pub fn from_settings(settings: &Settings) -> Result<Self, HostError> {
        let credential: Arc<dyn TokenCredential> = match &settings.access_token {
            Some(token) => {
                info!("using static access token");
                Arc::new(StaticTokenCredential::new(token.clone()))
            }
            None => Arc::new(
                ManagedIdentityCredential::from_parts(
                    settings.identity_endpoint.clone(),
                    settings.identity_header.clone(),
                )
                .with_client_id(settings.managed_identity_client_id.clone()),
            ),
        };

        let cosmos_auth = match &settings.cosmos_key {
            Some(key) => CosmosAuth::master_key(key)?,
            None => CosmosAuth::Credential(credential.clone()),
        };
        let store = CosmosStore::new(&settings.cosmos_url, &settings.cosmos_database, cosmos_auth);

        let secrets: Arc<dyn SecretSource> = match &settings.key_vault_url {
            Some(url) => Arc::new(KeyVaultSecrets::new(url, credential.clone())),
            None => {
                info!("KEY_VAULT_URL not set, reading notification hub secrets from the environment");
                Arc::new(EnvSecrets)
            }
        };

        let realtime = match &settings.signalr_connection_string {
            Some(raw) => {
                let connection = SignalRConnectionString::parse(raw)?;
                SignalRClient::from_connection_string(&connection, &settings.signalr_hub)
            }
            None => SignalRClient::new(&settings.signalr_endpoint, &settings.signalr_hub),
        }
        .with_credential(credential.clone());

        info!(
            cosmos = %settings.cosmos_url,
            database = %settings.cosmos_database,
            deployment = %settings.openai_deployment,
            "application context ready"
        );

        Ok(Self {
            store: Arc::new(store),
            blobs: Arc::new(AzureBlobStore::new(credential.clone())),
            chat: Arc::new(AzureOpenAiClient::new(
                &settings.openai_endpoint,
                &settings.openai_deployment,
                &settings.openai_api_version,
                credential.clone(),
            )),
            receipts: Arc::new(DocumentIntelligenceClient::new(
                settings.document_intelligence_endpoint(),
                credential.clone(),
            )),
            moderator: Arc::new(ContentSafetyClient::new(
                settings.content_safety_endpoint(),
                credential,
            )),
            push: Arc::new(NotificationHubClient::new(secrets)),
            realtime: Arc::new(realtime),
            storage_account_url: settings.storage_account_url(),
        })
    }
}
