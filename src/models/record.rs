//! Normalized record shape shared by all sources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The common persisted form of one extracted unit.
///
/// Records are append-only and immutable after creation. They carry no
/// back-reference to the job that produced them; job/record linkage is by
/// source and time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Database row ID (0 until persisted).
    pub id: i64,
    /// Source tag, matching the producing strategy ("quotes", ...).
    pub source: String,
    /// Page the unit was extracted from.
    pub source_url: String,
    pub title: Option<String>,
    /// Rendered, human-readable text for the unit.
    pub body_content: String,
    /// Serialized original structured unit, for downstream re-parsing.
    pub raw_payload: String,
    /// Source-specific key/value bag.
    pub metadata: serde_json::Value,
    pub scraped_at: DateTime<Utc>,
}

impl ExtractedRecord {
    pub fn new(
        source: impl Into<String>,
        source_url: impl Into<String>,
        title: Option<String>,
        body_content: String,
        raw_payload: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: 0,
            source: source.into(),
            source_url: source_url.into(),
            title,
            body_content,
            raw_payload,
            metadata,
            scraped_at: Utc::now(),
        }
    }
}
