//! Violation log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlguard_policy::{Violation, ViolationKind};
use uuid::Uuid;

/// One rejected query.
///
/// Entries are ordered by insertion; `occurred_at` is informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationLogEntry {
    /// Unique entry ID.
    pub event_id: Uuid,

    /// When the rejection happened.
    pub occurred_at: DateTime<Utc>,

    /// Role the query was submitted under, as given by the caller.
    pub role: String,

    /// Query text, truncated to the configured length.
    pub query: String,

    /// Violation message.
    pub error: String,

    /// Rule that fired.
    pub kind: ViolationKind,
}

impl ViolationLogEntry {
    pub fn new(role: &str, query: &str, violation: &Violation, max_query_chars: usize) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            role: role.to_string(),
            query: truncate_chars(query, max_query_chars).to_string(),
            error: violation.message.clone(),
            kind: violation.kind,
        }
    }
}

/// The first `max` characters of `text`.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
