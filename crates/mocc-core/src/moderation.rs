//! Content-safety verdicts.
//!
//! The moderation service scores four harm categories on a 0–7 scale. Content
//! is rejected as soon as any category reaches [`SEVERITY_THRESHOLD`].

use serde::{Deserialize, Serialize};

/// Severity at or above which content is rejected.
pub const SEVERITY_THRESHOLD: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmCategory {
    Hate,
    SelfHarm,
    Sexual,
    Violence,
}

impl HarmCategory {
    /// Every category submitted for analysis.
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Hate,
        HarmCategory::SelfHarm,
        HarmCategory::Sexual,
        HarmCategory::Violence,
    ];
}

/// Score of one category as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAnalysis {
    pub category: HarmCategory,
    #[serde(default)]
    pub severity: Option<u8>,
}

impl CategoryAnalysis {
    pub fn new(category: HarmCategory, severity: u8) -> Self {
        Self {
            category,
            severity: Some(severity),
        }
    }

    pub fn severity(&self) -> u8 {
        self.severity.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Carries every category that reached the threshold.
    Rejected { flagged: Vec<CategoryAnalysis> },
}

impl Verdict {
    pub fn from_analysis(analysis: &[CategoryAnalysis]) -> Self {
        let flagged: Vec<CategoryAnalysis> = analysis
            .iter()
            .filter(|a| a.severity() >= SEVERITY_THRESHOLD)
            .cloned()
            .collect();
        if flagged.is_empty() {
            Verdict::Accepted
        } else {
            Verdict::Rejected { flagged }
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Verdict::Rejected { .. })
    }
}
