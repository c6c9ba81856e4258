//! The violation audit trail.
//!
//! `AuditLogger` keeps every rejection in an in-memory, insertion-ordered
//! log and forwards it to a storage backend. The in-memory log is the
//! authoritative record for the owning connection; persistence failures are
//! reported but never lose or hide the entry.

use sqlguard_core::AuditConfig;
use sqlguard_policy::Violation;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::AuditError;
use crate::event::ViolationLogEntry;
use crate::storage::{AuditStorage, NullStorage, create_storage};

/// Records guardrail rejections.
pub struct AuditLogger {
    config: AuditConfig,
    storage: Arc<dyn AuditStorage>,
    entries: Mutex<Vec<ViolationLogEntry>>,
}

impl AuditLogger {
    pub fn new(config: AuditConfig) -> Result<Self, AuditError> {
        let storage = create_storage(&config)?;
        Ok(Self::with_storage(config, storage))
    }

    /// Create a logger with a custom storage backend.
    pub fn with_storage(config: AuditConfig, storage: Arc<dyn AuditStorage>) -> Self {
        Self {
            config,
            storage,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// In-memory log only.
    pub fn in_memory() -> Self {
        Self::with_storage(AuditConfig::default(), Arc::new(NullStorage))
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Record a rejection of `sql` under `role`.
    pub async fn record(&self, role: &str, sql: &str, violation: &Violation) -> ViolationLogEntry {
        let entry = ViolationLogEntry::new(role, sql, violation, self.config.max_query_chars);

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());

        tracing::debug!(
            event_id = %entry.event_id,
            role = %entry.role,
            kind = %entry.kind,
            "Audit event"
        );

        if self.config.enabled
            && let Err(e) = self.storage.store(entry.clone()).await
        {
            tracing::warn!(error = %e, event_id = %entry.event_id, "Failed to persist audit event");
        }

        entry
    }

    /// Copy of the log, oldest first.
    pub fn entries(&self) -> Vec<ViolationLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
