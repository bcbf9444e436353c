//! Blob storage: download and delete by [`BlobLocation`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mocc_core::BlobLocation;
use mocc_identity::{TokenCredential, http_client};
use reqwest::StatusCode;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::StoreError;

const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
const STORAGE_API_VERSION: &str = "2023-11-03";

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn download(&self, location: &BlobLocation) -> Result<Vec<u8>, StoreError>;

    /// Delete a blob. Returns `false` when it was already gone.
    async fn delete(&self, location: &BlobLocation) -> Result<bool, StoreError>;
}

/// Blob service REST client authorised with an Entra ID token.
pub struct AzureBlobStore {
    client: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
}

impl AzureBlobStore {
    pub fn new(credential: Arc<dyn TokenCredential>) -> Self {
        let client = http_client(Duration::from_secs(30));
        Self { client, credential }
    }

    fn blob_url(location: &BlobLocation) -> String {
        let encoded: Vec<String> = location
            .blob_name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/{}/{}",
            location.account_url,
            location.container,
            encoded.join("/")
        )
    }

    async fn send(
        &self,
        method: reqwest::Method,
        location: &BlobLocation,
    ) -> Result<reqwest::Response, StoreError> {
        let token = self.credential.token(STORAGE_SCOPE).await?;
        let url = Self::blob_url(location);
        debug!(url = %url, method = %method, "blob request");
        Ok(self
            .client
            .request(method, &url)
            .bearer_auth(&token.token)
            .header("x-ms-version", STORAGE_API_VERSION)
            .send()
            .await?)
    }
}

fn describe(location: &BlobLocation) -> String {
    format!("{}/{}", location.container, location.blob_name)
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn download(&self, location: &BlobLocation) -> Result<Vec<u8>, StoreError> {
        let resp = self.send(reqwest::Method::GET, location).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(describe(location)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        info!(blob = %describe(location), size = bytes.len(), "downloaded blob");
        Ok(bytes.to_vec())
    }

    async fn delete(&self, location: &BlobLocation) -> Result<bool, StoreError> {
        let resp = self.send(reqwest::Method::DELETE, location).await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }
        info!(blob = %describe(location), "deleted blob");
        Ok(true)
    }
}

/// Blobs held in memory, keyed by container and blob name.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, container: &str, blob_name: &str, data: Vec<u8>) {
        self.blobs
            .write()
            .await
            .insert((container.to_string(), blob_name.to_string()), data);
    }

    pub async fn contains(&self, container: &str, blob_name: &str) -> bool {
        self.blobs
            .read()
            .await
            .contains_key(&(container.to_string(), blob_name.to_string()))
    }
}

fn key(location: &BlobLocation) -> (String, String) {
    (location.container.clone(), location.blob_name.clone())
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn download(&self, location: &BlobLocation) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .read()
            .await
            .get(&key(location))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(describe(location)))
    }

    async fn delete(&self, location: &BlobLocation) -> Result<bool, StoreError> {
        Ok(self.blobs.write().await.remove(&key(location)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocc_identity::StaticTokenCredential;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store() -> AzureBlobStore {
        AzureBlobStore::new(Arc::new(StaticTokenCredential::new("blob-token")))
    }

    #[test]
    fn blob_url_encodes_segments() {
        let location = BlobLocation::new("https://acct.blob.core.windows.net", "uploads", "a b/c.jpg");
        assert_eq!(
            AzureBlobStore::blob_url(&location),
            "https://acct.blob.core.windows.net/uploads/a%20b/c.jpg"
        );
    }

    #[tokio::test]
    async fn download_returns_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/receipts/u1/r.jpg"))
            .and(header("authorization", "Bearer blob-token"))
            .and(header("x-ms-version", "2023-11-03"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let location = BlobLocation::new(&server.uri(), "receipts", "u1/r.jpg");
        assert_eq!(store().download(&location).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn download_missing_blob_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let location = BlobLocation::new(&server.uri(), "receipts", "gone.jpg");
        assert!(matches!(
            store().download(&location).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_tolerates_missing_blob() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/uploads/present.jpg"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/uploads/gone.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store();
        let present = BlobLocation::new(&server.uri(), "uploads", "present.jpg");
        let gone = BlobLocation::new(&server.uri(), "uploads", "gone.jpg");
        assert!(store.delete(&present).await.unwrap());
        assert!(!store.delete(&gone).await.unwrap());
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        store.put("social", "p.jpg", vec![9]).await;
        let location = BlobLocation::new("http://x", "social", "p.jpg");

        assert_eq!(store.download(&location).await.unwrap(), vec![9]);
        assert!(store.delete(&location).await.unwrap());
        assert!(!store.delete(&location).await.unwrap());
        assert!(!store.contains("social", "p.jpg").await);
    }
}
