//! Cosmos DB SQL API over REST.
//!
//! Requests are authorised either with the account master key (HMAC-SHA256
//! over verb, resource type, resource link and date) or with an Entra ID
//! bearer token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use mocc_identity::{TokenCredential, http_client};
use reqwest::{Method, RequestBuilder, Response};
use ring::hmac;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::StoreError;
use crate::document::{DocumentStore, PatchOperation, Query};

const API_VERSION: &str = "2018-12-31";
const COSMOS_SCOPE: &str = "https://cosmos.azure.com/.default";

pub enum CosmosAuth {
    MasterKey(hmac::Key),
    Credential(Arc<dyn TokenCredential>),
}

impl CosmosAuth {
    /// From the base64 account key.
    pub fn master_key(key: &str) -> Result<Self, StoreError> {
        let bytes = STANDARD
            .decode(key.trim())
            .map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        Ok(Self::MasterKey(hmac::Key::new(hmac::HMAC_SHA256, &bytes)))
    }
}

/// Client for one database of a Cosmos DB account.
pub struct CosmosStore {
    client: reqwest::Client,
    endpoint: String,
    database: String,
    auth: CosmosAuth,
}

#[derive(Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

/// Master-key signature for one request.
fn master_key_signature(
    key: &hmac::Key,
    verb: &Method,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> String {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.as_str().to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let signature = STANDARD.encode(hmac::sign(key, payload.as_bytes()).as_ref());
    urlencoding::encode(&format!("type=master&ver=1.0&sig={signature}")).into_owned()
}

impl CosmosStore {
    /// `endpoint` is like `https://mocc-cosmos.documents.azure.com:443/`.
    pub fn new(endpoint: &str, database: &str, auth: CosmosAuth) -> Self {
        let client = http_client(Duration::from_secs(10));
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            database: database.to_string(),
            auth,
        }
    }

    fn collection_link(&self, container: &str) -> String {
        format!("dbs/{}/colls/{}", self.database, container)
    }

    /// Resource link (signed, raw id) and URL path (percent-encoded id) of one document.
    fn document_link(&self, container: &str, id: &str) -> (String, String) {
        let collection = self.collection_link(container);
        (
            format!("{collection}/docs/{id}"),
            format!("{collection}/docs/{}", urlencoding::encode(id)),
        )
    }

    /// Build a signed request against `resource_link`; `path` is the URL path
    /// (the resource link plus a trailing `/docs` for feed operations).
    async fn request(
        &self,
        method: Method,
        resource_link: &str,
        path: &str,
    ) -> Result<RequestBuilder, StoreError> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = match &self.auth {
            CosmosAuth::MasterKey(key) => {
                master_key_signature(key, &method, "docs", resource_link, &date)
            }
            CosmosAuth::Credential(credential) => {
                let token = credential.token(COSMOS_SCOPE).await?;
                urlencoding::encode(&format!("type=aad&ver=1.0&sig={}", token.token)).into_owned()
            }
        };

        let url = format!("{}/{}", self.endpoint, path);
        Ok(self
            .client
            .request(method, url)
            .header("authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION))
    }

    async fn check(resp: Response) -> Result<Response, StoreError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

fn partition_header(partition_key: &str) -> String {
    json!([partition_key]).to_string()
}

#[async_trait]
impl DocumentStore for CosmosStore {
    async fn query(&self, container: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let link = self.collection_link(container);
        let sql = query.to_sql();
        debug!(container, query = %sql.query, "cosmos query");

        let mut documents = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self
                .request(Method::POST, &link, &format!("{link}/docs"))
                .await?
                .header("x-ms-documentdb-isquery", "True")
                .header("x-ms-documentdb-query-enablecrosspartition", "True")
                .header("content-type", "application/query+json")
                .body(serde_json::to_vec(&sql)?);
            if let Some(token) = &continuation {
                request = request.header("x-ms-continuation", token);
            }

            let resp = Self::check(request.send().await?).await?;
            continuation = resp
                .headers()
                .get("x-ms-continuation")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let page: QueryPage = resp.json().await?;
            documents.extend(page.documents);

            if continuation.is_none() {
                break;
            }
        }

        info!(container, count = documents.len(), "cosmos query complete");
        Ok(documents)
    }

    async fn read(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<Value>, StoreError> {
        let (link, path) = self.document_link(container, id);
        let resp = self
            .request(Method::GET, &link, &path)
            .await?
            .header("x-ms-documentdb-partitionkey", partition_header(partition_key))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(container, id, "cosmos document not found");
            return Ok(None);
        }
        let resp = Self::check(resp).await?;
        Ok(Some(resp.json().await?))
    }

    async fn upsert(
        &self,
        container: &str,
        partition_key: &str,
        document: &Value,
    ) -> Result<(), StoreError> {
        let link = self.collection_link(container);
        let resp = self
            .request(Method::POST, &link, &format!("{link}/docs"))
            .await?
            .header("x-ms-documentdb-partitionkey", partition_header(partition_key))
            .header("x-ms-documentdb-is-upsert", "True")
            .json(document)
            .send()
            .await?;
        Self::check(resp).await?;
        debug!(container, "cosmos upsert complete");
        Ok(())
    }

    async fn patch(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
        operations: &[PatchOperation],
    ) -> Result<(), StoreError> {
        let (link, path) = self.document_link(container, id);
        let body = json!({ "operations": operations });
        let resp = self
            .request(Method::PATCH, &link, &path)
            .await?
            .header("x-ms-documentdb-partitionkey", partition_header(partition_key))
            .header("content-type", "application/json_patch+json")
            .body(serde_json::to_vec(&body)?)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("{container}/{id}")));
        }
        Self::check(resp).await?;
        debug!(container, id, ops = operations.len(), "cosmos patch complete");
        Ok(())
    }
}
