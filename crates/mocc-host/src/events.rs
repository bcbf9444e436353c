//! Event Grid deliveries and their routing onto the flows.
//!
//! A delivery is either an Event Grid array or a single CloudEvents object.
//! Every event is processed in order; failures are logged and never cause a
//! redelivery.

use std::fmt;

use mocc_core::{LabelRef, ReceiptRef, RecipeImageRef};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::flows::moderation::CommentEvent;
use crate::flows::{labels, moderation, receipts, recipes};
use crate::{AppContext, HostError};

pub const VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Delivery {
    Batch(Vec<Event>),
    Single(Event),
}

impl Delivery {
    pub fn into_events(self) -> Vec<Event> {
        match self {
            Delivery::Batch(events) => events,
            Delivery::Single(event) => vec![event],
        }
    }
}

/// The validation code of a subscription handshake, if the delivery is one.
pub fn validation_code(events: &[Event]) -> Option<String> {
    events
        .iter()
        .find(|e| e.event_type.as_deref() == Some(VALIDATION_EVENT))
        .and_then(|e| e.data.get("validationCode"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ── Handlers ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    RecipeFromImage,
    ReceiptImage,
    ProductLabel,
    NewComment,
    SocialImage,
}

impl Handler {
    pub const ALL: [Handler; 5] = [
        Handler::RecipeFromImage,
        Handler::ReceiptImage,
        Handler::ProductLabel,
        Handler::NewComment,
        Handler::SocialImage,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Handler::RecipeFromImage => "generate-recipe-from-image",
            Handler::ReceiptImage => "process-receipt-image",
            Handler::ProductLabel => "process-product-label",
            Handler::NewComment => "process-new-comment",
            Handler::SocialImage => "filter-social-image",
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn text_field<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Run `handler` on one event payload, returning the flow's error.
///
/// Payloads missing their required fields are logged and skipped.
pub async fn handle(ctx: &AppContext, handler: Handler, data: &Value) -> Result<(), HostError> {
    if handler == Handler::NewComment {
        let (Some(post_id), Some(comment_text)) =
            (text_field(data, "postId"), text_field(data, "commentText"))
        else {
            warn!(handler = %handler, "comment event without postId or commentText");
            return Ok(());
        };
        let event = CommentEvent {
            post_id: post_id.to_string(),
            comment_text: comment_text.to_string(),
            comment_id: text_field(data, "commentId").map(str::to_string),
        };
        moderation::process_new_comment(ctx, &event).await?;
        return Ok(());
    }

    let Some(url) = text_field(data, "url") else {
        warn!(handler = %handler, "blob event without url");
        return Ok(());
    };
    info!(handler = %handler, url, "handling blob event");

    match handler {
        Handler::RecipeFromImage => {
            let image = RecipeImageRef::parse(url)?;
            recipes::recipe_from_image(ctx, url, &image).await?;
        }
        Handler::ReceiptImage => {
            let receipt = ReceiptRef::parse(url)?;
            receipts::process_receipt(ctx, url, &receipt).await?;
        }
        Handler::ProductLabel => {
            let label = LabelRef::parse(url)?;
            labels::process_label(ctx, url, &label).await?;
        }
        Handler::SocialImage => {
            moderation::filter_social_image(ctx, url).await?;
        }
        Handler::NewComment => {}
    }
    Ok(())
}

/// Like [`handle`], but logs the outcome instead of returning it.
pub async fn dispatch(ctx: &AppContext, handler: Handler, data: &Value) {
    match handle(ctx, handler, data).await {
        Ok(()) => {}
        Err(HostError::EventUrl(e)) => {
            warn!(error = %e, handler = %handler, "ignoring event with unexpected url");
        }
        Err(e) => error!(error = %e, handler = %handler, "event handler failed"),
    }
}

/// Process every event of a delivery in order.
pub async fn deliver(ctx: &AppContext, handler: Handler, events: &[Event]) {
    for event in events {
        info!(
            handler = %handler,
            event_id = event.id.as_deref().unwrap_or("-"),
            event_type = event.event_type.as_deref().unwrap_or("-"),
            "event received"
        );
        dispatch(ctx, handler, &event.data).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::Harness;
    use mocc_ai::{FakeChatModel, FakeModerator};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn handler_names_round_trip() {
        for handler in Handler::ALL {
            assert_eq!(Handler::from_name(handler.name()), Some(handler));
        }
        assert_eq!(Handler::from_name("process-everything"), None);
    }

    #[test]
    fn parses_batch_and_single_deliveries() {
        let batch: Delivery = serde_json::from_value(json!([
            {"id": "1", "eventType": "Microsoft.Storage.BlobCreated", "data": {"url": "u"}},
            {"id": "2", "eventType": "Microsoft.Storage.BlobCreated", "data": {"url": "v"}}
        ]))
        .unwrap();
        assert_eq!(batch.into_events().len(), 2);

        let single: Delivery = serde_json::from_value(json!({
            "specversion": "1.0",
            "type": "Microsoft.Storage.BlobCreated",
            "data": {"url": "u"}
        }))
        .unwrap();
        let events = single.into_events();
        assert_eq!(events[0].event_type.as_deref(), Some("Microsoft.Storage.BlobCreated"));
        assert_eq!(events[0].data["url"], "u");
    }

    #[test]
    fn finds_validation_code() {
        let events: Vec<Event> = serde_json::from_value(json!([{
            "id": "x",
            "eventType": VALIDATION_EVENT,
            "data": {"validationCode": "abc-123"}
        }]))
        .unwrap();
        assert_eq!(validation_code(&events).as_deref(), Some("abc-123"));

        let plain: Vec<Event> =
            serde_json::from_value(json!([{"eventType": "Other", "data": {}}])).unwrap();
        assert_eq!(validation_code(&plain), None);
    }

    #[tokio::test]
    async fn comment_without_text_is_skipped() {
        let mut harness = Harness::new();
        harness.moderator = Arc::new(FakeModerator::failing());
        let result = handle(
            &harness.context(),
            Handler::NewComment,
            &json!({"postId": "p1", "commentId": "c1"}),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn blob_event_without_url_is_skipped() {
        let harness = Harness::new();
        let result = handle(&harness.context(), Handler::ReceiptImage, &json!({})).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn malformed_path_is_an_event_url_error() {
        let harness = Harness::new();
        let err = handle(
            &harness.context(),
            Handler::ProductLabel,
            &json!({"url": "https://moccstorage.blob.core.windows.net/uploads/other/x.jpg"}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HostError::EventUrl(_)));
    }

    #[tokio::test]
    async fn routes_recipe_images() {
        let mut harness = Harness::new();
        harness.chat = Arc::new(FakeChatModel::new().with_default_response(
            r#"{"title": "Pesto", "description": "Basilico", "calories": 300, "prepTimeMinutes": 10}"#,
        ));
        harness.blobs.put("recipes-input", "users/u1/a.jpg", vec![1]).await;

        dispatch(
            &harness.context(),
            Handler::RecipeFromImage,
            &json!({"url": "https://moccstorage.blob.core.windows.net/recipes-input/users/u1/a.jpg"}),
        )
        .await;

        let recipes = harness.store.documents("Cookbook").await;
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0]["title"], "Pesto");
    }

    #[tokio::test]
    async fn flow_errors_are_swallowed() {
        let harness = Harness::new();
        // Receipt blob is missing: download fails, delivery still completes.
        deliver(
            &harness.context(),
            Handler::ReceiptImage,
            &[Event {
                data: json!({"url": "https://moccstorage.blob.core.windows.net/receipts/u1/r.jpg"}),
                ..Default::default()
            }],
        )
        .await;
        assert_eq!(harness.store.write_count().await, 0);
    }
}
