//! Contracts for blob URLs carried by storage events.
//!
//! Uploads land under well-known path segments (`recipes-input`, `receipts`,
//! `product-labels`) followed by the owning user id. Paths are split on `/`
//! as-is, so a leading slash produces an empty first segment.

use thiserror::Error;
use url::Url;

pub const RECIPES_INPUT_SEGMENT: &str = "recipes-input";
pub const RECEIPTS_SEGMENT: &str = "receipts";
pub const PRODUCT_LABELS_SEGMENT: &str = "product-labels";

/// Hosts that identify the local storage emulator, where the account name is
/// the first path segment.
const EMULATOR_MARKERS: &[&str] = &["127.0.0.1", "localhost", "devstoreaccount1"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventUrlError {
    #[error("invalid URL {url}: {reason}")]
    Invalid { url: String, reason: String },

    #[error("URL {url} does not match the {expected} pattern")]
    PatternMismatch { url: String, expected: &'static str },

    #[error("URL {url} has too few path segments for {expected}")]
    TooShort { url: String, expected: &'static str },

    #[error("unexpected container '{found}', expected '{expected}'")]
    UnexpectedContainer { found: String, expected: String },
}

fn parse(url: &str) -> Result<Url, EventUrlError> {
    Url::parse(url).map_err(|e| EventUrlError::Invalid {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn segments(parsed: &Url) -> Vec<&str> {
    parsed.path().split('/').collect()
}

fn position(parts: &[&str], segment: &str) -> Option<usize> {
    parts.iter().position(|p| *p == segment)
}

/// An image uploaded to generate a recipe: `.../recipes-input/.../users/{user}/{file}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeImageRef {
    pub user_id: String,
    /// Blob name inside the `recipes-input` container.
    pub blob_name: String,
}

impl RecipeImageRef {
    pub fn parse(url: &str) -> Result<Self, EventUrlError> {
        let parsed = parse(url)?;
        let parts = segments(&parsed);
        let mismatch = || EventUrlError::PatternMismatch {
            url: url.to_string(),
            expected: "recipe image",
        };

        let input_index = position(&parts, RECIPES_INPUT_SEGMENT).ok_or_else(mismatch)?;
        let users_index = position(&parts, "users").ok_or_else(mismatch)?;
        if parts.len() <= users_index + 2 {
            return Err(EventUrlError::TooShort {
                url: url.to_string(),
                expected: "recipe image",
            });
        }

        Ok(Self {
            user_id: parts[users_index + 1].to_string(),
            blob_name: parts[input_index + 1..].join("/"),
        })
    }
}

/// A receipt photo: `.../receipts/{user}/{file}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptRef {
    pub user_id: String,
}

impl ReceiptRef {
    pub fn parse(url: &str) -> Result<Self, EventUrlError> {
        let parsed = parse(url)?;
        let parts = segments(&parsed);

        let index = position(&parts, RECEIPTS_SEGMENT).ok_or_else(|| {
            EventUrlError::PatternMismatch {
                url: url.to_string(),
                expected: "receipt",
            }
        })?;
        if parts.len() <= index + 2 {
            return Err(EventUrlError::TooShort {
                url: url.to_string(),
                expected: "receipt",
            });
        }

        Ok(Self {
            user_id: parts[index + 1].to_string(),
        })
    }
}

/// A product label photo for one staged item:
/// `.../product-labels/{user}/{record}/{item}/{file}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRef {
    pub user_id: String,
    pub history_id: String,
    pub item_id: String,
    /// Blob name inside the `uploads` container, starting at `product-labels`.
    pub blob_name: String,
}

impl LabelRef {
    pub fn parse(url: &str) -> Result<Self, EventUrlError> {
        let parsed = parse(url)?;
        let parts = segments(&parsed);

        let index = position(&parts, PRODUCT_LABELS_SEGMENT).ok_or_else(|| {
            EventUrlError::PatternMismatch {
                url: url.to_string(),
                expected: "product label",
            }
        })?;
        if parts.len() <= index + 4 {
            return Err(EventUrlError::TooShort {
                url: url.to_string(),
                expected: "product label",
            });
        }

        Ok(Self {
            user_id: parts[index + 1].to_string(),
            history_id: parts[index + 2].to_string(),
            item_id: parts[index + 3].to_string(),
            blob_name: parts[index..].join("/"),
        })
    }
}

/// Account, container and blob name addressed by a blob URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLocation {
    /// `scheme://host[:port]`, plus the account segment on the emulator.
    pub account_url: String,
    pub container: String,
    pub blob_name: String,
}

impl BlobLocation {
    pub fn new(account_url: &str, container: &str, blob_name: &str) -> Self {
        Self {
            account_url: account_url.trim_end_matches('/').to_string(),
            container: container.to_string(),
            blob_name: blob_name.to_string(),
        }
    }

    /// Split a full blob URL into account, container and (decoded) blob name.
    pub fn parse(url: &str) -> Result<Self, EventUrlError> {
        let parsed = parse(url)?;
        let host = parsed.host_str().ok_or_else(|| EventUrlError::Invalid {
            url: url.to_string(),
            reason: "missing host".to_string(),
        })?;

        let mut account_url = format!("{}://{}", parsed.scheme(), host);
        if let Some(port) = parsed.port() {
            account_url.push_str(&format!(":{port}"));
        }

        let mut parts: Vec<&str> = parsed.path().split('/').filter(|p| !p.is_empty()).collect();
        if EMULATOR_MARKERS.iter().any(|m| url.contains(m)) && !parts.is_empty() {
            account_url.push('/');
            account_url.push_str(parts.remove(0));
        }
        if parts.len() < 2 {
            return Err(EventUrlError::TooShort {
                url: url.to_string(),
                expected: "blob",
            });
        }

        let blob_name = parts[1..].join("/");
        let blob_name = urlencoding::decode(&blob_name)
            .map(|s| s.into_owned())
            .unwrap_or(blob_name);

        Ok(Self {
            account_url,
            container: parts[0].to_string(),
            blob_name,
        })
    }

    /// Like [`parse`](Self::parse), but rejects any container other than `expected`.
    pub fn parse_in(url: &str, expected: &str) -> Result<Self, EventUrlError> {
        let location = Self::parse(url)?;
        if location.container != expected {
            return Err(EventUrlError::UnexpectedContainer {
                found: location.container,
                expected: expected.to_string(),
            });
        }
        Ok(location)
    }

    /// Same account, different container and blob.
    pub fn sibling(&self, container: &str, blob_name: &str) -> Self {
        Self::new(&self.account_url, container, blob_name)
    }
}
