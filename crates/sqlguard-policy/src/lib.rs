//! # sqlguard-policy
//!
//! Decides whether a role may run a piece of SQL.
//!
//! [`Guardrails`] is the entry point: it looks up the role's policy in a
//! shared [`PolicyRegistry`], parses the text and runs the rule pipeline of
//! [`QueryValidator`]. Rejections are [`Violation`] values carrying a
//! [`ViolationKind`]; nothing here performs I/O, so a `Guardrails` can be
//! shared freely between threads.
//!
//! ```
//! use sqlguard_policy::{Guardrails, ViolationKind};
//!
//! let guardrails = Guardrails::builtin().unwrap();
//! let result = guardrails.validate("CEO", "SELECT * FROM retail.customer");
//! assert!(!result.ok);
//! assert_eq!(result.violation_kind, Some(ViolationKind::TableExplicitlyDenied));
//! ```

pub mod date_filter;
pub mod error;
pub mod tables;
pub mod validator;

pub use error::{Violation, ViolationKind};
pub use validator::QueryValidator;

use serde::{Deserialize, Serialize};
use sqlguard_core::{ConfigError, PolicyRegistry, SecurityPolicy};
use sqlguard_sql::{ParsedQuery, QueryParser, wrap_with_limit};
use std::sync::Arc;
use std::time::Duration;

/// Flat verdict of a validation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub violation_kind: Option<ViolationKind>,
    pub message: Option<String>,
}

impl<T> From<Result<T, Violation>> for ValidationResult {
    fn from(result: Result<T, Violation>) -> Self {
        match result {
            Ok(_) => Self {
                ok: true,
                violation_kind: None,
                message: None,
            },
            Err(violation) => Self {
                ok: false,
                violation_kind: Some(violation.kind),
                message: Some(violation.message),
            },
        }
    }
}

/// Policy validation and row bounding over a shared registry.
#[derive(Debug, Clone)]
pub struct Guardrails {
    registry: Arc<PolicyRegistry>,
    parser: QueryParser,
}

impl Guardrails {
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self {
            registry,
            parser: QueryParser::new(),
        }
    }

    /// Guardrails over the built-in boardroom policies.
    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(PolicyRegistry::builtin()?)))
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// The policy for `role`; an unknown role is a violation.
    pub fn policy(&self, role: &str) -> Result<&SecurityPolicy, Violation> {
        Ok(self.registry.lookup(role)?)
    }

    pub fn parse(&self, sql: &str) -> ParsedQuery {
        self.parser.parse(sql)
    }

    /// Validate `sql` for `role`, returning the policy it passed under.
    pub fn check(&self, role: &str, sql: &str) -> Result<&SecurityPolicy, Violation> {
        let policy = match self.policy(role) {
            Ok(policy) => policy,
            Err(violation) => {
                tracing::warn!(role, kind = %violation.kind, "Guardrail rejection: {}", violation);
                return Err(violation);
            }
        };
        self.check_with_policy(policy, sql)?;
        Ok(policy)
    }

    /// Validate `sql` against an explicit policy, e.g. one derived from a
    /// registry entry with tighter thresholds.
    pub fn check_with_policy(&self, policy: &SecurityPolicy, sql: &str) -> Result<(), Violation> {
        let parsed = self.parser.parse(sql);
        QueryValidator::new(policy).validate(&parsed).inspect_err(|violation| {
            tracing::warn!(
                role = policy.role(),
                kind = %violation.kind,
                "Guardrail rejection: {}",
                violation
            );
        })
    }

    pub fn validate(&self, role: &str, sql: &str) -> ValidationResult {
        self.check(role, sql).into()
    }

    /// Bound `sql` by the role's `max_rows`.
    pub fn wrap_with_limit(&self, sql: &str, role: &str) -> Result<String, Violation> {
        Ok(wrap_with_limit(sql, self.policy(role)?.max_rows()))
    }

    /// Statement timeout for `role`.
    pub fn timeout(&self, role: &str) -> Result<Duration, Violation> {
        Ok(self.policy(role)?.timeout())
    }

    pub fn max_rows(&self, role: &str) -> Result<u64, Violation> {
        Ok(self.policy(role)?.max_rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_result_from_ok() {
        let result = ValidationResult::from(Ok::<(), Violation>(()));
        assert!(result.ok);
        assert_eq!(result.violation_kind, None);
        assert_eq!(result.message, None);
    }

    #[test]
    fn test_accessors() {
        let guardrails = Guardrails::builtin().unwrap();
        assert_eq!(guardrails.max_rows("cmo").unwrap(), 5000);
        assert_eq!(guardrails.timeout("CIO").unwrap(), Duration::from_secs(10));
        assert_eq!(
            guardrails.max_rows("CTO").unwrap_err().kind,
            ViolationKind::UnknownRole
        );
    }

    #[test]
    fn test_check_with_derived_policy() {
        let guardrails = Guardrails::builtin().unwrap();
        let base = guardrails.policy("CFO").unwrap();
        let strict = base.derive().max_joins(0).build();
        let sql = "SELECT * FROM cfo_views.inventory_value a JOIN cfo_views.kpis b ON 1=1";

        assert!(guardrails.check_with_policy(base, sql).is_ok());
        assert_eq!(
            guardrails.check_with_policy(&strict, sql).unwrap_err().kind,
            ViolationKind::TooManyJoins
        );
    }
}
