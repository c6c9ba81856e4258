//! # sqlguard-sql
//!
//! Lightweight SQL inspection for the guardrails.
//!
//! This crate provides:
//! - [`QueryParser`]: statement kind, referenced tables and join count of a
//!   SQL text, from a keyword scan backed by `sqlparser` when the text parses
//! - [`wrap_with_limit`]: idempotent row-count bounding of a statement
//! - [`strip_markdown_fences`]: clean-up of model output before validation
//!
//! ## Example
//!
//! ```
//! use sqlguard_sql::{QueryParser, StatementKind, wrap_with_limit};
//!
//! let parsed = QueryParser::new().parse("SELECT * FROM ceo_views.board_summary");
//! assert_eq!(parsed.statement_kind, StatementKind::Select);
//! assert!(parsed.referenced_tables.contains("ceo_views.board_summary"));
//!
//! assert_eq!(
//!     wrap_with_limit("SELECT * FROM ceo_views.board_summary", 1000),
//!     "SELECT * FROM ceo_views.board_summary LIMIT 1000"
//! );
//! ```

mod mask;

pub mod limit;
pub mod parser;
pub mod sanitize;

pub use limit::{BOUNDED_QUERY_ALIAS, wrap_with_limit};
pub use parser::{FORBIDDEN_OPERATIONS, ParsedQuery, QueryParser, StatementKind};
pub use sanitize::strip_markdown_fences;
