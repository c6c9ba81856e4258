//! Audit trail configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the guardrail violation audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether rejected queries are persisted beyond the in-memory log.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// JSON Lines file that receives one entry per rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Longest query text (in characters) kept in a log entry.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            file: None,
            max_query_chars: default_max_query_chars(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_query_chars() -> usize {
    500
}
