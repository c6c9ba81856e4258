//! Audit storage backends.

use async_trait::async_trait;
use sqlguard_core::AuditConfig;
use sqlguard_policy::ViolationKind;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::AuditError;
use crate::event::ViolationLogEntry;

/// Filter for querying persisted entries.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub role: Option<String>,
    pub kind: Option<ViolationKind>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, entry: &ViolationLogEntry) -> bool {
        if let Some(role) = &self.role
            && !entry.role.eq_ignore_ascii_case(role)
        {
            return false;
        }
        if let Some(kind) = self.kind
            && entry.kind != kind
        {
            return false;
        }
        true
    }
}

/// Trait for audit storage backends.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Persist one entry.
    async fn store(&self, entry: ViolationLogEntry) -> Result<(), AuditError>;

    /// Persisted entries matching `filter`, oldest first.
    async fn query(&self, filter: AuditFilter) -> Result<Vec<ViolationLogEntry>, AuditError>;
}

/// Storage backend for `config`.
pub fn create_storage(config: &AuditConfig) -> Result<Arc<dyn AuditStorage>, AuditError> {
    match (&config.file, config.enabled) {
        (Some(path), true) => Ok(Arc::new(FileStorage::open(path)?)),
        _ => Ok(Arc::new(NullStorage)),
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullStorage;

#[async_trait]
impl AuditStorage for NullStorage {
    async fn store(&self, _entry: ViolationLogEntry) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<ViolationLogEntry>, AuditError> {
        Ok(vec![])
    }
}

/// Appends entries to a JSON Lines file.
///
/// Entries already in the file are loaded on open so that `query` covers
/// the whole history.
pub struct FileStorage {
    path: PathBuf,
    entries: RwLock<Vec<ViolationLogEntry>>,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let mut entries = Vec::new();

        if path.exists() {
            let reader = BufReader::new(std::fs::File::open(&path)?);
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: ViolationLogEntry =
                    serde_json::from_str(&line).map_err(|source| AuditError::CorruptEntry {
                        path: path.clone(),
                        line: idx + 1,
                        source,
                    })?;
                entries.push(entry);
            }
        }

        tracing::debug!(path = %path.display(), existing = entries.len(), "Opened audit file");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn store(&self, entry: ViolationLogEntry) -> Result<(), AuditError> {
        let json = serde_json::to_string(&entry)?;

        // The write lock also serializes appends to the file.
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditError::LockPoisoned)?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;

        entries.push(entry);
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<ViolationLogEntry>, AuditError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditError::LockPoisoned)?;

        let mut results: Vec<_> = entries.iter().filter(|e| filter.matches(e)).cloned().collect();
        if let Some(limit) = filter.limit {
            results.truncate(limit);
        }
        Ok(results)
    }
}
