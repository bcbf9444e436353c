//! One module per event flow. Every flow takes the [`AppContext`] by reference
//! and returns `Result<_, HostError>`; logging of failures is left to the
//! trigger that invoked it unless the flow is best effort by nature.

pub mod devices;
pub mod expiry;
pub mod labels;
pub mod moderation;
pub mod receipts;
pub mod recipes;

use std::collections::BTreeSet;

use mocc_store::{Query, containers};
use serde_json::Value;

use crate::{AppContext, HostError};

/// Distinct ids of every user document.
pub async fn list_user_ids(ctx: &AppContext) -> Result<Vec<String>, HostError> {
    let rows = ctx
        .store
        .query(containers::USERS, &Query::select(&["id"]).where_defined("id"))
        .await?;
    let ids: BTreeSet<String> = rows
        .iter()
        .filter_map(|row| row.get("id").and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    Ok(ids.into_iter().collect())
}

/// Every fridge document of `user_id`.
pub(crate) fn fridges_of(user_id: &str) -> Query {
    Query::all().where_eq("id", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::Harness;
    use serde_json::json;

    #[tokio::test]
    async fn user_ids_are_distinct_and_sorted() {
        let harness = Harness::new();
        harness.store.insert("Users", "b", json!({"id": "b"})).await;
        harness.store.insert("Users", "a", json!({"id": "a"})).await;
        harness.store.insert("Users", "a2", json!({"id": "a", "dup": true})).await;
        harness.store.insert("Users", "n", json!({"id": ""})).await;

        let ids = list_user_ids(&harness.context()).await.unwrap();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
