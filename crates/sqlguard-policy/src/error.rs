//! Guardrail violation types.
//!
//! A [`Violation`] is the verdict of a rejected query: the rule that fired
//! and a message naming the offending operation, table or threshold. It is
//! a plain value; callers branch on [`ViolationKind`].

use serde::{Deserialize, Serialize};
use sqlguard_core::UnknownRoleError;
use std::collections::BTreeSet;
use std::fmt;

/// A rejected query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The rule that rejected the query.
    pub kind: ViolationKind,
    /// Human-readable error message.
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn empty_query() -> Self {
        Self::new(ViolationKind::EmptyQuery, "Empty or invalid SQL query")
    }

    pub fn forbidden_operation(operation: &str) -> Self {
        Self::new(
            ViolationKind::ForbiddenOperation,
            format!("Forbidden operation: {operation}. Only SELECT queries are allowed."),
        )
    }

    // =========================================================================
    // TABLE ACCESS
    // =========================================================================

    pub fn table_explicitly_denied(table: &str, role: &str) -> Self {
        Self::new(
            ViolationKind::TableExplicitlyDenied,
            format!("Access denied to table: {table}. This table is explicitly blocked for {role} role."),
        )
    }

    pub fn schema_not_allowed(schema: &str, role: &str, allowed: &BTreeSet<String>) -> Self {
        Self::new(
            ViolationKind::SchemaNotAllowed,
            format!("Access denied to schema: {schema}. Allowed schemas for {role}: {allowed:?}"),
        )
    }

    pub fn table_not_allowed(table: &str, role: &str) -> Self {
        Self::new(
            ViolationKind::TableNotAllowed,
            format!("Access denied to table: {table}. Does not match allowed patterns for {role} role."),
        )
    }

    pub fn ambiguous_table_reference(table: &str) -> Self {
        Self::new(
            ViolationKind::AmbiguousTableReference,
            format!(
                "Ambiguous table reference: {table}. Please use schema-qualified names (e.g., schema.table)."
            ),
        )
    }

    /// A `FROM` / `JOIN` target the parser could not name. Only raised for
    /// text that did not parse, where the table set may be incomplete.
    pub fn unreadable_table_reference(fragment: &str) -> Self {
        Self::new(
            ViolationKind::AmbiguousTableReference,
            format!("Unreadable table reference: {fragment}. Please name tables as schema.table."),
        )
    }

    // =========================================================================
    // SHAPE
    // =========================================================================

    pub fn too_many_joins(count: usize, max: u32, role: &str) -> Self {
        Self::new(
            ViolationKind::TooManyJoins,
            format!("Too many JOINs: {count}. Maximum allowed for {role}: {max}"),
        )
    }

    pub fn missing_date_filter(tables: &BTreeSet<&str>, date_columns: &BTreeSet<String>) -> Self {
        Self::new(
            ViolationKind::MissingDateFilter,
            format!(
                "Missing date filter for fact table(s): {tables:?}. \
                 Queries on these tables must include a date filter \
                 (e.g., WHERE sale_date BETWEEN ... AND ...). \
                 Valid date columns: {date_columns:?}"
            ),
        )
    }

    pub fn unknown_role(err: &UnknownRoleError) -> Self {
        Self::new(ViolationKind::UnknownRole, err.to_string())
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Violation {}

impl From<UnknownRoleError> for Violation {
    fn from(err: UnknownRoleError) -> Self {
        Self::unknown_role(&err)
    }
}

/// The rule a query violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Blank text, or only comments and terminators.
    EmptyQuery,
    /// A mutation or DDL verb appears in the text.
    ForbiddenOperation,
    /// The table is on the role's denylist.
    TableExplicitlyDenied,
    /// The table's schema is not allowed for the role.
    SchemaNotAllowed,
    /// The table matches none of the role's allowed patterns.
    TableNotAllowed,
    /// A bare table name resolves against none of the allowed schemas.
    AmbiguousTableReference,
    /// More JOINs than the role's ceiling.
    TooManyJoins,
    /// A fact table is queried without a date predicate.
    MissingDateFilter,
    /// No policy exists for the role.
    UnknownRole,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyQuery => "EmptyQuery",
            Self::ForbiddenOperation => "ForbiddenOperation",
            Self::TableExplicitlyDenied => "TableExplicitlyDenied",
            Self::SchemaNotAllowed => "SchemaNotAllowed",
            Self::TableNotAllowed => "TableNotAllowed",
            Self::AmbiguousTableReference => "AmbiguousTableReference",
            Self::TooManyJoins => "TooManyJoins",
            Self::MissingDateFilter => "MissingDateFilter",
            Self::UnknownRole => "UnknownRole",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let v = Violation::forbidden_operation("DROP");
        assert_eq!(v.to_string(), "Forbidden operation: DROP. Only SELECT queries are allowed.");

        let v = Violation::too_many_joins(4, 3, "CEO");
        assert_eq!(v.message, "Too many JOINs: 4. Maximum allowed for CEO: 3");
    }

    #[test]
    fn test_schema_message_lists_allowed_schemas() {
        let allowed = BTreeSet::from(["ceo_views".to_string()]);
        let v = Violation::schema_not_allowed("cfo_views", "CEO", &allowed);
        assert_eq!(v.kind, ViolationKind::SchemaNotAllowed);
        assert!(v.message.ends_with(r#"Allowed schemas for CEO: {"ceo_views"}"#));
    }

    #[test]
    fn test_unknown_role_conversion() {
        let err = UnknownRoleError {
            role: "CTO".to_string(),
            valid: vec!["CEO".to_string()],
        };
        let v = Violation::from(err);
        assert_eq!(v.kind, ViolationKind::UnknownRole);
        assert!(v.message.starts_with("Unknown role: CTO"));
    }
}
