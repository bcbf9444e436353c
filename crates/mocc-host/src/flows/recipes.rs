//! Recipe proposals: the daily fridge-clearing run and recipes generated from
//! an uploaded image.

use mocc_ai::{ChatMessage, ChatRequest};
use mocc_core::event_url::RECIPES_INPUT_SEGMENT;
use mocc_core::recipe::{
    DAILY_READY_MESSAGE, DAILY_SYSTEM_PROMPT, IMAGE_PROMPT, IMAGE_SYSTEM_PROMPT, ImageRecipeDraft,
    daily_recipe_prompt, ingredient_list,
};
use mocc_core::{BlobLocation, Fridge, ProposedRecipe, RecipeImageRef, User, parse_reply};
use mocc_notify::{refresh_best_effort, send_best_effort};
use mocc_store::{containers, query_as, read_as, upsert_as};
use tracing::{debug, error, info, warn};

use super::{fridges_of, list_user_ids};
use crate::{AppContext, HostError};

const DAILY_MAX_TOKENS: u32 = 500;
const IMAGE_MAX_TOKENS: u32 = 800;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DailyRecipeReport {
    pub users: usize,
    pub recipes: usize,
    pub failed: usize,
}

// ── Daily run ──

/// Generate one proposal per non-empty fridge of every user.
pub async fn run_daily_recipes(ctx: &AppContext) -> Result<DailyRecipeReport, HostError> {
    let user_ids = list_user_ids(ctx).await?;
    let mut report = DailyRecipeReport {
        users: user_ids.len(),
        ..Default::default()
    };
    if user_ids.is_empty() {
        info!("no users, skipping daily recipes");
        return Ok(report);
    }

    send_best_effort(ctx.push.as_ref(), DAILY_READY_MESSAGE, None).await;

    for user_id in &user_ids {
        match recipes_for_user(ctx, user_id).await {
            Ok(count) => report.recipes += count,
            Err(e) => {
                error!(error = %e, user_id = %user_id, "failed to query fridges");
                report.failed += 1;
            }
        }
    }

    info!(
        users = report.users,
        recipes = report.recipes,
        failed = report.failed,
        "daily recipes complete"
    );
    Ok(report)
}

async fn dietary_restrictions(ctx: &AppContext, user_id: &str) -> String {
    match read_as::<User>(ctx.store.as_ref(), containers::USERS, user_id, user_id).await {
        Ok(Some(user)) => user.dietary_restrictions,
        Ok(None) => String::new(),
        Err(e) => {
            warn!(error = %e, user_id, "failed to read user profile");
            String::new()
        }
    }
}

/// Returns the number of proposals stored. Only the fridge query fails the
/// user; generation and write failures are logged per fridge.
async fn recipes_for_user(ctx: &AppContext, user_id: &str) -> Result<usize, HostError> {
    let fridges: Vec<Fridge> =
        query_as(ctx.store.as_ref(), containers::INVENTORY, &fridges_of(user_id)).await?;

    let mut stored = 0;
    for fridge in &fridges {
        let Some(ingredients) = ingredient_list(fridge) else {
            continue;
        };
        let dietary = dietary_restrictions(ctx, user_id).await;

        let request = ChatRequest::new(
            vec![
                ChatMessage::system(DAILY_SYSTEM_PROMPT),
                ChatMessage::user(&daily_recipe_prompt(&ingredients, &dietary)),
            ],
            DAILY_MAX_TOKENS,
            TEMPERATURE,
        );
        let reply = match ctx.chat.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, user_id, "recipe generation failed");
                continue;
            }
        };
        let reply = reply.trim();
        if reply.is_empty() {
            debug!(user_id, "empty recipe reply");
            continue;
        }

        let recipe = ProposedRecipe::daily(user_id, reply.to_string());
        match upsert_as(ctx.store.as_ref(), containers::COOKBOOK, user_id, &recipe).await {
            Ok(()) => {
                info!(user_id, recipe_id = %recipe.id, "stored daily recipe");
                stored += 1;
            }
            Err(e) => error!(error = %e, user_id, "failed to store daily recipe"),
        }
    }
    Ok(stored)
}

// ── Recipe from image ──

/// Turn an image uploaded under `recipes-input` into a proposal. The input
/// blob is deleted afterwards whatever the outcome.
pub async fn recipe_from_image(
    ctx: &AppContext,
    url: &str,
    image: &RecipeImageRef,
) -> Result<ProposedRecipe, HostError> {
    let location = BlobLocation::parse(url)?.sibling(RECIPES_INPUT_SEGMENT, &image.blob_name);
    info!(user_id = %image.user_id, blob = %image.blob_name, "processing recipe image");

    let result = generate_from_image(ctx, &image.user_id, &location).await;

    match ctx.blobs.delete(&location).await {
        Ok(true) => info!(blob = %image.blob_name, "input blob deleted"),
        Ok(false) => debug!(blob = %image.blob_name, "input blob already gone"),
        Err(e) => error!(error = %e, blob = %image.blob_name, "failed to delete input blob"),
    }
    result
}

async fn generate_from_image(
    ctx: &AppContext,
    user_id: &str,
    location: &BlobLocation,
) -> Result<ProposedRecipe, HostError> {
    let bytes = ctx.blobs.download(location).await?;
    let request = ChatRequest::new(
        vec![
            ChatMessage::system(IMAGE_SYSTEM_PROMPT),
            ChatMessage::user_with_image(IMAGE_PROMPT, &bytes),
        ],
        IMAGE_MAX_TOKENS,
        TEMPERATURE,
    );
    let reply = ctx.chat.complete(&request).await?;
    let draft: ImageRecipeDraft = parse_reply(&reply)?;

    let recipe = ProposedRecipe::from_image(user_id, draft);
    upsert_as(ctx.store.as_ref(), containers::COOKBOOK, user_id, &recipe).await?;
    info!(user_id, recipe_id = %recipe.id, title = %recipe.title, "stored image recipe");

    refresh_best_effort(ctx.realtime.as_ref(), user_id).await;
    Ok(recipe)
}
