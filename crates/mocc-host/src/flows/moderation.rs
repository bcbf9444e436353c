//! Content-safety checks on new comments and social images.
//!
//! Classification only returns a [`Verdict`]; removing a comment or an image
//! is a separate step taken by the flow. The check and the removal are not
//! transactional.

use mocc_core::model::{POST_PARTITION_KEY, REMOVED_COMMENT_TEXT};
use mocc_core::{BlobLocation, Post, Verdict};
use mocc_store::{PatchOperation, containers, read_as};
use tracing::{info, warn};

use crate::{AppContext, HostError};

pub const SOCIAL_CONTAINER: &str = "social";

/// A comment just added to a post.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentEvent {
    pub post_id: String,
    pub comment_text: String,
    pub comment_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagOutcome {
    Flagged { index: usize },
    CommentNotFound,
}

/// Classify comment text. Service failures propagate.
pub async fn check_comment(ctx: &AppContext, text: &str) -> Result<Verdict, HostError> {
    let analysis = ctx.moderator.analyze_text(text).await?;
    Ok(Verdict::from_analysis(&analysis))
}

/// Mark comment `comment_id` of `post_id` as removed and blank its text.
pub async fn flag_comment(
    ctx: &AppContext,
    post_id: &str,
    comment_id: &str,
) -> Result<FlagOutcome, HostError> {
    let post: Post = read_as(ctx.store.as_ref(), containers::SOCIAL, post_id, POST_PARTITION_KEY)
        .await?
        .ok_or_else(|| HostError::NotFound(format!("post {post_id}")))?;

    let Some(index) = post.comment_index(comment_id) else {
        warn!(post_id, comment_id, "comment not found on post");
        return Ok(FlagOutcome::CommentNotFound);
    };

    let operations = [
        PatchOperation::set(format!("/comments/{index}/removed"), true),
        PatchOperation::set(format!("/comments/{index}/text"), REMOVED_COMMENT_TEXT),
    ];
    ctx.store
        .patch(containers::SOCIAL, post_id, POST_PARTITION_KEY, &operations)
        .await?;
    info!(post_id, comment_id, index, "comment flagged");
    Ok(FlagOutcome::Flagged { index })
}

/// Check a new comment and flag it when rejected. Returns the verdict.
pub async fn process_new_comment(
    ctx: &AppContext,
    event: &CommentEvent,
) -> Result<Verdict, HostError> {
    let verdict = check_comment(ctx, &event.comment_text).await?;
    match (&verdict, event.comment_id.as_deref()) {
        (Verdict::Accepted, _) => {
            info!(post_id = %event.post_id, "comment accepted");
        }
        (Verdict::Rejected { flagged }, Some(comment_id)) => {
            info!(post_id = %event.post_id, comment_id, categories = flagged.len(), "comment rejected");
            flag_comment(ctx, &event.post_id, comment_id).await?;
        }
        (Verdict::Rejected { .. }, None) => {
            warn!(post_id = %event.post_id, "rejected comment has no id, cannot flag");
        }
    }
    Ok(verdict)
}

/// Classify an image uploaded to `social`, deleting it when rejected.
pub async fn filter_social_image(ctx: &AppContext, url: &str) -> Result<Verdict, HostError> {
    let location = BlobLocation::parse_in(url, SOCIAL_CONTAINER)?;
    let bytes = ctx.blobs.download(&location).await?;
    let analysis = ctx.moderator.analyze_image(&bytes).await?;
    let verdict = Verdict::from_analysis(&analysis);

    if let Verdict::Rejected { flagged } = &verdict {
        info!(blob = %location.blob_name, categories = flagged.len(), "image rejected, deleting");
        ctx.blobs.delete(&location).await?;
    } else {
        info!(blob = %location.blob_name, "image accepted");
    }
    Ok(verdict)
}
