//! Mandatory temporal predicate on fact tables.
//!
//! Matching runs on the raw text with the policy's compiled date-column
//! patterns: a recognized date column, optionally cast with `::type`,
//! followed by a comparison operator, `BETWEEN` or `IN` counts as a filter.
//! A column wrapped in `CAST(col AS date)` or another function call does not.
//! `MIN(col)` or `MAX(col)` on a date column marks a date-range discovery
//! query, which is exempt.

use sqlguard_core::SecurityPolicy;
use sqlguard_sql::ParsedQuery;
use std::collections::BTreeSet;

use crate::error::Violation;

pub fn check_date_filter(policy: &SecurityPolicy, parsed: &ParsedQuery) -> Result<(), Violation> {
    let needing_filter: BTreeSet<&str> = parsed
        .referenced_tables
        .iter()
        .filter(|t| policy.requires_date_filter(t))
        .map(String::as_str)
        .collect();

    if needing_filter.is_empty() {
        return Ok(());
    }

    if policy.is_date_range_discovery(&parsed.raw_text) {
        tracing::debug!(role = policy.role(), "Date-range discovery query; date filter waived");
        return Ok(());
    }
    if policy.has_date_filter(&parsed.raw_text) {
        return Ok(());
    }

    Err(Violation::missing_date_filter(&needing_filter, policy.date_columns()))
}
