//! Table access rules.
//!
//! For each referenced table, in order:
//! - the denylist always wins
//! - a qualified name needs an allowed schema and a matching pattern
//! - a bare name must resolve, through some allowed schema, to a pattern

use sqlguard_core::SecurityPolicy;
use std::collections::BTreeSet;

use crate::error::Violation;

/// Check every table against the policy, stopping at the first violation.
pub fn check_table_access(
    policy: &SecurityPolicy,
    tables: &BTreeSet<String>,
) -> Result<(), Violation> {
    for table in tables {
        check_table(policy, table)?;
    }
    Ok(())
}

fn check_table(policy: &SecurityPolicy, table: &str) -> Result<(), Violation> {
    if policy.is_denied(table) {
        return Err(Violation::table_explicitly_denied(table, policy.role()));
    }

    match table.split_once('.') {
        Some((schema, _)) => {
            if !policy.is_schema_allowed(schema) {
                return Err(Violation::schema_not_allowed(
                    schema,
                    policy.role(),
                    policy.allowed_schemas(),
                ));
            }
            if !policy.matches_pattern(table) {
                return Err(Violation::table_not_allowed(table, policy.role()));
            }
        }
        None => {
            let resolved = policy
                .allowed_schemas()
                .iter()
                .any(|schema| policy.matches_pattern(&format!("{schema}.{table}")));
            if !resolved && !policy.allowed_patterns().is_empty() {
                return Err(Violation::ambiguous_table_reference(table));
            }
        }
    }

    Ok(())
}
