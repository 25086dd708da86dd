//! The persisted unit of a generated passage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{BilingualAlignment, VocabularyItem};

/// A passage with its alignment and the raw model I/O that produced it.
///
/// The prompt and response fields are kept so a bad alignment can be
/// diagnosed without re-running generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageRecord {
    pub id: Uuid,
    pub passage_text: String,
    pub vocabulary: Vec<VocabularyItem>,
    pub alignment: BilingualAlignment,
    /// System and user prompt of the passage call.
    pub generation_prompt: String,
    /// The JSON object embedded in the analysis prompt.
    pub analysis_request: serde_json::Value,
    pub raw_analysis_response: String,
    pub created_at: DateTime<Utc>,
}

impl PassageRecord {
    pub fn summary(&self) -> PassageSummary {
        PassageSummary {
            id: self.id,
            passage_text: self.passage_text.clone(),
            created_at: self.created_at,
        }
    }
}

/// Listing entry for stored passages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageSummary {
    pub id: Uuid,
    pub passage_text: String,
    pub created_at: DateTime<Utc>,
}
