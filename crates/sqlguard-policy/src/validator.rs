//! The ordered rule pipeline.
//!
//! `QueryValidator` applies the rules of one role's policy to a parsed query:
//!
//! 1. **Forbidden operation** - no mutation or DDL verb, for any role, even
//!    one that only appears in a comment
//! 2. **Empty query** - nothing left once comments are dropped
//! 3. **Table access** - every `FROM` / `JOIN` target is named, then
//!    denylist, schema allowlist, table patterns
//! 4. **Join ceiling** - `JOIN` count within the role's maximum
//! 5. **Date filter** - fact tables carry a date predicate
//!
//! The first violation wins. Every rule is a pure function of the policy and
//! the query text.

use sqlguard_core::SecurityPolicy;
use sqlguard_sql::ParsedQuery;

use crate::date_filter::check_date_filter;
use crate::error::Violation;
use crate::tables::check_table_access;

/// Validates parsed queries against one role's policy.
#[derive(Debug, Clone, Copy)]
pub struct QueryValidator<'a> {
    policy: &'a SecurityPolicy,
}

impl<'a> QueryValidator<'a> {
    pub fn new(policy: &'a SecurityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SecurityPolicy {
        self.policy
    }

    /// Run every rule in order.
    pub fn validate(&self, parsed: &ParsedQuery) -> Result<(), Violation> {
        self.check_forbidden_operation(parsed)?;
        if parsed.statement_count() == 0 {
            return Err(Violation::empty_query());
        }
        if let Some(fragment) = parsed.unreadable_references.first() {
            return Err(Violation::unreadable_table_reference(fragment));
        }
        check_table_access(self.policy, &parsed.referenced_tables)?;
        self.check_join_count(parsed)?;
        check_date_filter(self.policy, parsed)?;
        Ok(())
    }

    /// Role-independent: no policy permits mutation or DDL.
    pub fn check_forbidden_operation(&self, parsed: &ParsedQuery) -> Result<(), Violation> {
        match parsed.forbidden_keyword() {
            Some(operation) => Err(Violation::forbidden_operation(&operation)),
            None => Ok(()),
        }
    }

    pub fn check_join_count(&self, parsed: &ParsedQuery) -> Result<(), Violation> {
        let max = self.policy.max_joins();
        if parsed.join_count > max as usize {
            return Err(Violation::too_many_joins(parsed.join_count, max, self.policy.role()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViolationKind;
    use sqlguard_core::PolicyRegistry;
    use sqlguard_sql::QueryParser;

    fn kind(role: &str, sql: &str) -> Option<ViolationKind> {
        let registry = PolicyRegistry::builtin().unwrap();
        let parsed = QueryParser::new().parse(sql);
        QueryValidator::new(registry.lookup(role).unwrap())
            .validate(&parsed)
            .err()
            .map(|v| v.kind)
    }

    #[test]
    fn test_forbidden_operation_precedes_table_access() {
        // retail.customer is denied for CEO, but the verb is checked first.
        assert_eq!(
            kind("CEO", "DELETE FROM retail.customer"),
            Some(ViolationKind::ForbiddenOperation)
        );
    }

    #[test]
    fn test_table_access_precedes_joins() {
        let sql = "SELECT * FROM cfo_views.a JOIN cfo_views.b ON 1=1 JOIN cfo_views.c ON 1=1 \
                   JOIN cfo_views.d ON 1=1 JOIN cfo_views.e ON 1=1";
        assert_eq!(kind("CEO", sql), Some(ViolationKind::SchemaNotAllowed));
    }

    #[test]
    fn test_joins_precede_date_filter() {
        let sql = "SELECT * FROM cfo_views.daily_pnl a \
                   JOIN cfo_views.b ON 1=1 JOIN cfo_views.c ON 1=1 \
                   JOIN cfo_views.d ON 1=1 JOIN cfo_views.e ON 1=1 JOIN cfo_views.f ON 1=1";
        assert_eq!(kind("CFO", sql), Some(ViolationKind::TooManyJoins));
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(kind("CEO", "  ;\n"), Some(ViolationKind::EmptyQuery));
        assert_eq!(kind("CEO", "-- nothing here"), Some(ViolationKind::EmptyQuery));
    }

    #[test]
    fn test_commented_out_mutation_is_forbidden_not_empty() {
        assert_eq!(
            kind("EVAL", "-- DROP TABLE ceo_views.board_summary"),
            Some(ViolationKind::ForbiddenOperation)
        );
        assert_eq!(
            kind("EVAL", "/* DELETE FROM retail.brand */"),
            Some(ViolationKind::ForbiddenOperation)
        );
    }

    #[test]
    fn test_unreadable_reference_rejected_when_unparsed() {
        assert_eq!(
            kind("CEO", "SELECT * FROM $q$retail.customer$q$ WHERE (("),
            Some(ViolationKind::AmbiguousTableReference)
        );
    }

    #[test]
    fn test_unknown_statement_kind_is_not_forbidden() {
        assert_eq!(kind("CEO", "SHOW search_path"), None);
    }
}
