//! Audit trail errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// A line of an existing audit file is not a log entry.
    #[error("{}:{line}: unreadable audit entry: {source}", path.display())]
    CorruptEntry {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory index was poisoned by a panicking writer.
    #[error("audit storage lock poisoned")]
    LockPoisoned,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
