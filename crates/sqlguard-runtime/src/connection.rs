//! Guardrailed query execution.
//!
//! Every call goes through the same sequence:
//!
//! ```text
//! RECEIVED -> VALIDATED | REJECTED -> LIMIT_APPLIED -> TIMEOUT_SET -> EXECUTED | EXECUTION_FAILED
//! ```
//!
//! A rejection is appended to the audit log and returned; the executor is
//! never reached. Timeout and execution errors come back as
//! [`GuardError::Execution`] untouched.

use serde_json::Value;
use sqlguard_audit::{AuditLogger, ViolationLogEntry};
use sqlguard_core::{PolicyOverrides, SecurityPolicy};
use sqlguard_policy::{Guardrails, Violation};
use sqlguard_sql::wrap_with_limit;
use std::sync::Arc;
use thiserror::Error;

use crate::executor::{BoundedQuery, ExecutorError, QueryExecutor, Row};

/// Why a guarded call failed.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The query was rejected by the guardrails.
    #[error("{0}")]
    Violation(#[from] Violation),

    /// The query was permitted but the database could not complete it.
    #[error(transparent)]
    Execution(#[from] ExecutorError),
}

impl GuardError {
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Self::Violation(v) => Some(v),
            Self::Execution(_) => None,
        }
    }
}

/// A database executor bound to one role's guardrails.
pub struct GuardrailedConnection {
    executor: Arc<dyn QueryExecutor>,
    guardrails: Guardrails,
    policy: SecurityPolicy,
    audit: Arc<AuditLogger>,
}

impl GuardrailedConnection {
    /// Bind `executor` to `role`. An unknown role fails here.
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        guardrails: Guardrails,
        role: &str,
    ) -> Result<Self, Violation> {
        let policy = guardrails.policy(role)?.clone();
        Ok(Self {
            executor,
            guardrails,
            policy,
            audit: Arc::new(AuditLogger::in_memory()),
        })
    }

    /// Use a shared audit logger instead of a private in-memory one.
    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    /// Tighten this connection's thresholds. The registry entry is
    /// unaffected.
    pub fn tighten(mut self, overrides: impl FnOnce(PolicyOverrides) -> PolicyOverrides) -> Self {
        self.policy = overrides(self.policy.derive()).build();
        self
    }

    /// Upper-cased role this connection runs as.
    pub fn role(&self) -> &str {
        self.policy.role()
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    /// Validate, bound and run `sql` under the connection's role.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, GuardError> {
        self.run(&self.policy, sql, params).await
    }

    /// Like [`execute`](Self::execute) but under an explicitly named role.
    pub async fn execute_as(
        &self,
        role: &str,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Row>, GuardError> {
        let policy = match self.guardrails.policy(role) {
            Ok(policy) => policy,
            Err(violation) => {
                tracing::warn!(role, kind = %violation.kind, "Guardrail rejection: {}", violation);
                self.audit.record(role, sql, &violation).await;
                return Err(violation.into());
            }
        };
        self.run(policy, sql, params).await
    }

    /// First column of the first row, if any.
    pub async fn execute_scalar(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<Value>, GuardError> {
        let rows = self.execute(sql, params).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(|(_, value)| value))
    }

    /// Copy of the rejections logged so far, oldest first.
    pub fn violation_log(&self) -> Vec<ViolationLogEntry> {
        self.audit.entries()
    }

    async fn run(
        &self,
        policy: &SecurityPolicy,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<Row>, GuardError> {
        if let Err(violation) = self.guardrails.check_with_policy(policy, sql) {
            self.audit.record(policy.role(), sql, &violation).await;
            return Err(violation.into());
        }

        let query = BoundedQuery {
            role: policy.role().to_string(),
            sql: wrap_with_limit(sql, policy.max_rows()),
            params: params.to_vec(),
            timeout: policy.timeout(),
        };

        tracing::info!(
            role = %query.role,
            max_rows = policy.max_rows(),
            timeout_ms = query.timeout_ms(),
            "Executing guarded query"
        );

        let rows = self.executor.run(&query).await.inspect_err(|e| {
            tracing::error!(role = %query.role, error = %e, "Guarded query failed");
        })?;

        tracing::debug!(role = %query.role, rows = rows.len(), "Guarded query completed");
        Ok(rows)
    }
}
