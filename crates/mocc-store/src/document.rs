//! Document database abstraction.
//!
//! Queries are built with [`Query`] rather than as raw SQL strings so the same
//! query can be sent to Cosmos DB and evaluated by [`MemoryStore`](crate::MemoryStore).

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::StoreError;

/// Container names in the application database.
pub mod containers {
    pub const USERS: &str = "Users";
    pub const INVENTORY: &str = "Inventory";
    pub const COOKBOOK: &str = "Cookbook";
    pub const HISTORY: &str = "History";
    pub const SOCIAL: &str = "Social";
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a query across all partitions of `container`.
    async fn query(&self, container: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Point read. `Ok(None)` when the document does not exist.
    async fn read(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
    ) -> Result<Option<Value>, StoreError>;

    /// Create or replace a document. The document must carry an `id`.
    async fn upsert(
        &self,
        container: &str,
        partition_key: &str,
        document: &Value,
    ) -> Result<(), StoreError>;

    /// Apply partial-update operations to an existing document.
    async fn patch(
        &self,
        container: &str,
        id: &str,
        partition_key: &str,
        operations: &[PatchOperation],
    ) -> Result<(), StoreError>;
}

// ── Queries ──

/// A conjunctive query over top-level document fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    fields: Vec<String>,
    defined: Vec<String>,
    equals: Vec<(String, Value)>,
}

/// Wire form of a parameterised query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuery {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

impl Query {
    /// `SELECT * FROM c`.
    pub fn all() -> Self {
        Self::default()
    }

    /// `SELECT c.a, c.b FROM c`.
    pub fn select(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Add `IS_DEFINED(c.field)`.
    pub fn where_defined(mut self, field: &str) -> Self {
        self.defined.push(field.to_string());
        self
    }

    /// Add `c.field = @pN`.
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.equals.push((field.to_string(), value.into()));
        self
    }

    pub fn to_sql(&self) -> SqlQuery {
        let projection = if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields
                .iter()
                .map(|f| format!("c.{f}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut conditions: Vec<String> = self
            .defined
            .iter()
            .map(|f| format!("IS_DEFINED(c.{f})"))
            .collect();
        let mut parameters = Vec::new();
        for (i, (field, value)) in self.equals.iter().enumerate() {
            let name = format!("@p{i}");
            conditions.push(format!("c.{field} = {name}"));
            parameters.push(SqlParameter {
                name,
                value: value.clone(),
            });
        }

        let mut query = format!("SELECT {projection} FROM c");
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        SqlQuery { query, parameters }
    }

    /// Whether `document` satisfies every condition.
    pub fn matches(&self, document: &Value) -> bool {
        self.defined.iter().all(|f| document.get(f).is_some())
            && self
                .equals
                .iter()
                .all(|(f, v)| document.get(f) == Some(v))
    }

    /// Apply the projection to a matching document.
    pub fn project(&self, document: &Value) -> Value {
        if self.fields.is_empty() {
            return document.clone();
        }
        let projected: Map<String, Value> = self
            .fields
            .iter()
            .filter_map(|f| document.get(f).map(|v| (f.clone(), v.clone())))
            .collect();
        Value::Object(projected)
    }
}

// ── Patch ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Set,
}

/// One partial-update operation addressed by JSON pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

impl PatchOperation {
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Set,
            path: path.into(),
            value: value.into(),
        }
    }
}

// ── Typed helpers ──

pub async fn read_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    container: &str,
    id: &str,
    partition_key: &str,
) -> Result<Option<T>, StoreError> {
    match store.read(container, id, partition_key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn query_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    container: &str,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    store
        .query(container, query)
        .await?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(StoreError::from))
        .collect()
}

pub async fn upsert_as<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    container: &str,
    partition_key: &str,
    document: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(document)?;
    store.upsert(container, partition_key, &value).await
}
