//! Core types and pure logic for the MOCC event handlers: persisted record
//! shapes, receipt reconciliation, label merge, event URL contracts and
//! moderation verdicts.

pub mod event_url;
pub mod expiry;
pub mod label;
pub mod model;
pub mod moderation;
pub mod receipt;
pub mod recipe;
pub mod reply;

pub use event_url::{BlobLocation, EventUrlError, LabelRef, ReceiptRef, RecipeImageRef};
pub use label::{LabelFields, MergeOutcome, merge_label};
pub use model::{
    Comment, Fridge, InventoryItem, LineItem, Post, ProposedRecipe, StagedRecord, User,
};
pub use moderation::{CategoryAnalysis, HarmCategory, Verdict};
pub use receipt::{AnalyzeResult, ReceiptExtraction, extract_receipt, reconcile_total};
pub use reply::parse_reply;
