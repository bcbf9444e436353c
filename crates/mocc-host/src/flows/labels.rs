//! Product labels enrich one item of a staged record.
//!
//! The label photo lives in the `uploads` container; it is removed once read
//! whether or not the merge succeeded.

use mocc_ai::{ChatMessage, ChatRequest};
use mocc_core::label::{LABEL_PROMPT, LABEL_SYSTEM_PROMPT};
use mocc_core::{
    BlobLocation, LabelFields, LabelRef, MergeOutcome, StagedRecord, merge_label, parse_reply,
};
use mocc_notify::refresh_best_effort;
use mocc_store::{containers, read_as, upsert_as};
use tracing::{debug, error, info, warn};

use crate::{AppContext, HostError};

pub const UPLOADS_CONTAINER: &str = "uploads";

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.3;

/// Read the label at `url` and merge it into the referenced staged item.
pub async fn process_label(
    ctx: &AppContext,
    url: &str,
    label: &LabelRef,
) -> Result<MergeOutcome, HostError> {
    let location = match BlobLocation::parse(url) {
        Ok(parsed) => parsed.sibling(UPLOADS_CONTAINER, &label.blob_name),
        Err(e) => {
            debug!(error = %e, "using default account for label blob");
            BlobLocation::new(&ctx.storage_account_url, UPLOADS_CONTAINER, &label.blob_name)
        }
    };
    info!(
        user_id = %label.user_id,
        history_id = %label.history_id,
        item_id = %label.item_id,
        "processing product label"
    );

    let result = merge_from_label(ctx, label, &location).await;

    match ctx.blobs.delete(&location).await {
        Ok(true) => info!(blob = %label.blob_name, "label blob deleted"),
        Ok(false) => debug!(blob = %label.blob_name, "label blob already gone"),
        Err(e) => error!(error = %e, blob = %label.blob_name, "failed to delete label blob"),
    }
    result
}

async fn merge_from_label(
    ctx: &AppContext,
    label: &LabelRef,
    location: &BlobLocation,
) -> Result<MergeOutcome, HostError> {
    let bytes = ctx.blobs.download(location).await?;
    let request = ChatRequest::new(
        vec![
            ChatMessage::system(LABEL_SYSTEM_PROMPT),
            ChatMessage::user_with_image(LABEL_PROMPT, &bytes),
        ],
        MAX_TOKENS,
        TEMPERATURE,
    );
    let reply = ctx.chat.complete(&request).await?;
    let fields: LabelFields = parse_reply(&reply)?;

    let mut record: StagedRecord = read_as(
        ctx.store.as_ref(),
        containers::HISTORY,
        &label.history_id,
        &label.user_id,
    )
    .await?
    .ok_or_else(|| HostError::NotFound(format!("staged record {}", label.history_id)))?;

    let outcome = merge_label(&mut record, &label.item_id, &fields);
    match outcome {
        MergeOutcome::Updated => {
            upsert_as(ctx.store.as_ref(), containers::HISTORY, &label.user_id, &record).await?;
            info!(history_id = %label.history_id, item_id = %label.item_id, "label merged");
            refresh_best_effort(ctx.realtime.as_ref(), &label.user_id).await;
        }
        MergeOutcome::ItemNotFound => {
            warn!(history_id = %label.history_id, item_id = %label.item_id, "item not in staged record");
        }
    }
    Ok(outcome)
}
