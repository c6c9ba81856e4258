//! # sqlguard-runtime
//!
//! The integration point used by agents: [`GuardrailedConnection`] wraps a
//! [`QueryExecutor`], validates every query with the role's guardrails,
//! bounds it with a LIMIT, applies the role's timeout and records
//! rejections in the audit trail.

pub mod connection;
pub mod executor;

pub use connection::{GuardError, GuardrailedConnection};
pub use executor::{BoundedQuery, ExecutorError, QueryExecutor, Row};
