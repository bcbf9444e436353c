//! Persisted record shapes shared by every flow.
//!
//! Field names follow the stored documents exactly (camelCase). Records that
//! are read and written back keep unknown fields in a flattened `extra` map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// Partition key shared by every post in the `Social` container.
pub const POST_PARTITION_KEY: &str = "post";

/// Placeholder written over the text of a flagged comment.
pub const REMOVED_COMMENT_TEXT: &str = "Removed";

/// Confidence assigned to line items extracted from a receipt.
pub const RECEIPT_ITEM_CONFIDENCE: f64 = 0.9;

/// A user profile. Mutated elsewhere; read-only here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub dietary_restrictions: String,
}

/// One inventory document per user; its `id` is the owning user id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fridge {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub items: Vec<InventoryItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipeStatus {
    Proposed,
}

/// A recipe suggestion written to the `Cookbook` container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedRecipe {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub description: String,
    pub status: RecipeStatus,
    pub eco_points_reward: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(rename = "generatedByAI")]
    pub generated_by_ai: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time_minutes: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StagingStatus {
    InStaging,
}

/// A shopping entry awaiting user confirmation (`History` container).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedRecord {
    pub id: String,
    pub author_id: String,
    pub date: String,
    pub store_name: String,
    pub total_amount: f64,
    pub currency: String,
    pub is_imported: bool,
    #[serde(default)]
    pub items_snapshot: Vec<LineItem>,
    pub receipt_image_url: String,
    pub status: StagingStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StagedRecord {
    /// Build a fresh staged record for `author_id` with a new id.
    pub fn new(
        author_id: &str,
        store_name: String,
        total_amount: f64,
        items: Vec<LineItem>,
        receipt_image_url: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.to_string(),
            date: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            store_name,
            total_amount,
            currency: "EUR".to_string(),
            is_imported: false,
            items_snapshot: items,
            receipt_image_url: receipt_image_url.to_string(),
            status: StagingStatus::InStaging,
            extra: Map::new(),
        }
    }
}

/// One line of a staged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub expiry_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_quantity() -> f64 {
    1.0
}

impl LineItem {
    /// A line item as produced by receipt extraction.
    pub fn from_receipt(name: String, price: f64, quantity: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            price,
            quantity,
            unit: Some("PZ".to_string()),
            confidence: RECEIPT_ITEM_CONFIDENCE,
            category: None,
            brand: None,
            expiry_date: None,
            expiry_type: Some("BEST_BEFORE".to_string()),
            extra: Map::new(),
        }
    }

    pub fn line_total(&self) -> f64 {
        self.price * self.quantity
    }
}

/// A social post and its comments (`Social` container).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// Position of the comment with `comment_id`, if present.
    pub fn comment_index(&self, comment_id: &str) -> Option<usize> {
        self.comments.iter().position(|c| c.id == comment_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub removed: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn staged_record_serializes_stored_field_names() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let item = LineItem::from_receipt("Latte".into(), 1.5, 2.0);
        let record = StagedRecord::new("user-1", "Coop".into(), 3.0, vec![item], "https://x/y", now);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["authorId"], "user-1");
        assert_eq!(json["date"], "2026-03-01T09:30:00Z");
        assert_eq!(json["storeName"], "Coop");
        assert_eq!(json["totalAmount"], 3.0);
        assert_eq!(json["currency"], "EUR");
        assert_eq!(json["isImported"], false);
        assert_eq!(json["status"], "IN_STAGING");
        assert_eq!(json["receiptImageUrl"], "https://x/y");

        let line = &json["itemsSnapshot"][0];
        assert_eq!(line["unit"], "PZ");
        assert_eq!(line["confidence"], 0.9);
        assert_eq!(line["expiryType"], "BEST_BEFORE");
        assert!(line["category"].is_null());
        assert!(line["brand"].is_null());
        assert!(line["expiryDate"].is_null());
    }

    #[test]
    fn staged_record_keeps_unknown_fields() {
        let json = serde_json::json!({
            "id": "h1",
            "authorId": "u1",
            "date": "2026-03-01T09:30:00Z",
            "storeName": "Coop",
            "totalAmount": 4.0,
            "currency": "EUR",
            "isImported": false,
            "itemsSnapshot": [
                {"id": "i1", "name": "Pane", "price": 2.0, "quantity": 2.0, "shelf": "B2"}
            ],
            "receiptImageUrl": "https://x/y",
            "status": "IN_STAGING",
            "_etag": "\"0000\"",
            "_ts": 1700000000
        });

        let record: StagedRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.extra["_ts"], 1700000000);
        assert_eq!(record.items_snapshot[0].extra["shelf"], "B2");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["_etag"], "\"0000\"");
        assert_eq!(back["itemsSnapshot"][0]["shelf"], "B2");
    }

    #[test]
    fn proposed_recipe_omits_absent_fields() {
        let recipe = ProposedRecipe {
            id: "r1".into(),
            author_id: "u1".into(),
            title: "Ricetta AI".into(),
            description: "Pasta".into(),
            status: RecipeStatus::Proposed,
            eco_points_reward: 35,
            ttl: Some(86340),
            generated_by_ai: true,
            calories: None,
            prep_time_minutes: None,
            ingredients: None,
            steps: None,
        };
        let json = serde_json::to_value(&recipe).unwrap();
        assert_eq!(json["status"], "PROPOSED");
        assert_eq!(json["generatedByAI"], true);
        assert_eq!(json["ecoPointsReward"], 35);
        assert!(json.get("calories").is_none());
        assert!(json.get("steps").is_none());
    }

    #[test]
    fn comment_index_finds_by_id() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "comments": [
                {"id": "c1", "text": "ciao"},
                {"id": "c2", "text": "bello", "removed": false}
            ]
        }))
        .unwrap();
        assert_eq!(post.comment_index("c2"), Some(1));
        assert_eq!(post.comment_index("c9"), None);
        assert!(!post.comments[0].removed);
    }
}
