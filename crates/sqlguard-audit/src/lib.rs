//! # sqlguard-audit
//!
//! Audit trail of rejected queries.
//!
//! Every guardrail rejection becomes a [`ViolationLogEntry`] (role,
//! truncated query, error message, violation kind). The [`AuditLogger`]
//! keeps them in call order in memory and forwards them to an
//! [`AuditStorage`] backend:
//!
//! | Backend       | Behavior                                   |
//! |---------------|--------------------------------------------|
//! | `NullStorage` | in-memory log only                         |
//! | `FileStorage` | JSON Lines file, one entry per line        |

pub mod error;
pub mod event;
pub mod logger;
pub mod storage;

pub use error::AuditError;
pub use event::ViolationLogEntry;
pub use logger::AuditLogger;
pub use storage::{AuditFilter, AuditStorage, FileStorage, NullStorage, create_storage};
