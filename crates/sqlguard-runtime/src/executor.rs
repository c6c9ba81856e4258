//! The database executor boundary.
//!
//! A [`QueryExecutor`] runs SQL that has already passed the guardrails. It
//! must apply the query's timeout to the same session the query runs on,
//! immediately before running it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One result row: column name to value.
pub type Row = serde_json::Map<String, Value>;

/// A validated, row-bounded query ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedQuery {
    /// Role the query runs under.
    pub role: String,
    /// Final SQL text, including its LIMIT.
    pub sql: String,
    /// Positional bind parameters.
    pub params: Vec<Value>,
    /// Statement timeout for the session.
    pub timeout: Duration,
}

impl BoundedQuery {
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Failures of a permitted query. These are infrastructure failures, never
/// guardrail violations.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The statement was cancelled by the session timeout.
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),

    /// Could not obtain a connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// The database rejected or failed the statement.
    #[error("database error: {0}")]
    Database(String),

    /// A value could not be bound or decoded.
    #[error("conversion error: {0}")]
    Conversion(String),
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Set the session statement timeout to `query.timeout`, then run
    /// `query.sql` on the same session.
    async fn run(&self, query: &BoundedQuery) -> Result<Vec<Row>, ExecutorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_ms() {
        let query = BoundedQuery {
            role: "CEO".to_string(),
            sql: "SELECT 1 LIMIT 1000".to_string(),
            params: vec![],
            timeout: Duration::from_secs_f64(2.5),
        };
        assert_eq!(query.timeout_ms(), 2500);
    }
}
