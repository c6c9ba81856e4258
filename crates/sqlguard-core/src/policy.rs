//! Compiled, immutable security policies.
//!
//! A [`SecurityPolicy`] is built once from a [`PolicyConfig`] and never
//! mutated. Names are lower-cased on the way in so that the rule pipeline
//! can compare them against lower-cased table references directly.

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::config::{ConfigError, PolicyConfig};

/// An allowlist pattern over `schema.table` names.
///
/// Matching is case-insensitive and anchored at the start of the name.
#[derive(Clone)]
pub struct TablePattern {
    source: String,
    regex: Regex,
}

impl TablePattern {
    fn compile(role: &str, source: &str) -> Result<Self, ConfigError> {
        let regex = Regex::new(&format!("(?i)^(?:{source})")).map_err(|e| ConfigError::Pattern {
            role: role.to_string(),
            pattern: source.to_string(),
            source: e,
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, table: &str) -> bool {
        self.regex.is_match(table)
    }

    /// The pattern as written in configuration.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for TablePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TablePattern").field(&self.source).finish()
    }
}

const DATE_CAST: &str = r"(?:\s*::\s*[a-z_][a-z0-9_]*)?";
const DATE_COMPARISON: &str = r"\s*(?:>=|<=|=|>|<|\bbetween\b|\bin\b)";

/// Date-column regexes of one policy.
///
/// A filter is a date column, optionally cast with `::type`, followed by a
/// comparison operator, `BETWEEN` or `IN`. A discovery query aggregates a
/// date column with `MIN` or `MAX`.
#[derive(Clone)]
struct DatePredicates {
    filter: Regex,
    discovery: Regex,
}

impl DatePredicates {
    /// `None` when the policy names no date columns.
    fn compile(role: &str, columns: &BTreeSet<String>) -> Result<Option<Self>, ConfigError> {
        if columns.is_empty() {
            return Ok(None);
        }
        let cols = columns
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");
        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|e| {
                ConfigError::Config(format!("role {role}: date columns do not compile: {e}"))
            })
        };
        Ok(Some(Self {
            filter: build(format!(r"(?i)\b(?:{cols})\b{DATE_CAST}{DATE_COMPARISON}"))?,
            discovery: build(format!(r"(?i)\b(?:min|max)\s*\(\s*(?:{cols})\b"))?,
        }))
    }
}

impl fmt::Debug for DatePredicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DatePredicates")
    }
}

/// The security policy of one role.
#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    role: String,
    description: Option<String>,
    allowed_schemas: BTreeSet<String>,
    allowed_patterns: Vec<TablePattern>,
    denied_tables: BTreeSet<String>,
    max_joins: u32,
    max_rows: u64,
    timeout: Duration,
    fact_tables_requiring_date: BTreeSet<String>,
    date_columns: BTreeSet<String>,
    date_predicates: Option<DatePredicates>,
}

fn lowered(items: &[String]) -> BTreeSet<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl SecurityPolicy {
    /// Compile a policy definition, validating its thresholds and patterns.
    pub fn compile(config: &PolicyConfig) -> Result<Self, ConfigError> {
        let role = config.role.trim().to_uppercase();
        if role.is_empty() {
            return Err(ConfigError::Config("policy has an empty role name".to_string()));
        }
        if config.max_rows == 0 {
            return Err(ConfigError::Config(format!("role {role}: max_rows must be positive")));
        }
        let timeout = Duration::try_from_secs_f64(config.timeout_seconds)
            .ok()
            .filter(|t| !t.is_zero())
            .ok_or_else(|| {
                ConfigError::Config(format!(
                    "role {role}: timeout_seconds must be a positive number, got {}",
                    config.timeout_seconds
                ))
            })?;

        let allowed_patterns = config
            .allowed_patterns
            .iter()
            .map(|p| TablePattern::compile(&role, p))
            .collect::<Result<Vec<_>, _>>()?;
        let date_columns = lowered(&config.date_columns);
        let date_predicates = DatePredicates::compile(&role, &date_columns)?;

        Ok(Self {
            description: config.description.clone(),
            allowed_schemas: lowered(&config.allowed_schemas),
            allowed_patterns,
            denied_tables: lowered(&config.denied_tables),
            max_joins: config.max_joins,
            max_rows: config.max_rows,
            timeout,
            fact_tables_requiring_date: lowered(&config.fact_tables_requiring_date),
            date_columns,
            date_predicates,
            role,
        })
    }

    /// Upper-cased role name.
    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn allowed_schemas(&self) -> &BTreeSet<String> {
        &self.allowed_schemas
    }

    pub fn allowed_patterns(&self) -> &[TablePattern] {
        &self.allowed_patterns
    }

    pub fn denied_tables(&self) -> &BTreeSet<String> {
        &self.denied_tables
    }

    pub fn max_joins(&self) -> u32 {
        self.max_joins
    }

    pub fn max_rows(&self) -> u64 {
        self.max_rows
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn fact_tables_requiring_date(&self) -> &BTreeSet<String> {
        &self.fact_tables_requiring_date
    }

    pub fn date_columns(&self) -> &BTreeSet<String> {
        &self.date_columns
    }

    pub fn is_schema_allowed(&self, schema: &str) -> bool {
        self.allowed_schemas.contains(schema)
    }

    pub fn is_denied(&self, table: &str) -> bool {
        self.denied_tables.contains(table)
    }

    /// Whether `table` matches at least one allowlist pattern.
    pub fn matches_pattern(&self, table: &str) -> bool {
        self.allowed_patterns.iter().any(|p| p.is_match(table))
    }

    pub fn requires_date_filter(&self, table: &str) -> bool {
        self.fact_tables_requiring_date.contains(table)
    }

    /// Whether `sql` compares a date column with `=`, `<`, `>`, `<=`, `>=`,
    /// `BETWEEN` or `IN`. `CAST(col AS date)` is not recognized.
    pub fn has_date_filter(&self, sql: &str) -> bool {
        self.date_predicates.as_ref().is_some_and(|p| p.filter.is_match(sql))
    }

    /// Whether `sql` aggregates a date column with `MIN(...)` or `MAX(...)`.
    pub fn is_date_range_discovery(&self, sql: &str) -> bool {
        self.date_predicates.as_ref().is_some_and(|p| p.discovery.is_match(sql))
    }

    /// Start deriving a tighter policy from this one.
    ///
    /// The registry entry is untouched; the derived policy is a fresh value.
    pub fn derive(&self) -> PolicyOverrides {
        PolicyOverrides {
            policy: self.clone(),
        }
    }
}

/// Builder for a policy derived from a registry entry.
///
/// Overrides only ever tighten: a requested value looser than the base
/// policy's is ignored.
#[derive(Debug, Clone)]
pub struct PolicyOverrides {
    policy: SecurityPolicy,
}

impl PolicyOverrides {
    pub fn max_rows(mut self, max_rows: u64) -> Self {
        if max_rows > 0 {
            self.policy.max_rows = self.policy.max_rows.min(max_rows);
        }
        self
    }

    pub fn max_joins(mut self, max_joins: u32) -> Self {
        self.policy.max_joins = self.policy.max_joins.min(max_joins);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.policy.timeout = self.policy.timeout.min(timeout);
        }
        self
    }

    pub fn build(self) -> SecurityPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfo_config() -> PolicyConfig {
        PolicyConfig {
            role: "cfo".to_string(),
            allowed_schemas: vec!["CFO_Views".to_string()],
            allowed_patterns: vec![r"^cfo_views\.\w+$".to_string()],
            denied_tables: vec!["Retail.Customer".to_string()],
            max_joins: 4,
            max_rows: 5000,
            fact_tables_requiring_date: vec!["cfo_views.daily_pnl".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_compile_normalizes_names() {
        let policy = SecurityPolicy::compile(&cfo_config()).unwrap();
        assert_eq!(policy.role(), "CFO");
        assert!(policy.is_schema_allowed("cfo_views"));
        assert!(policy.is_denied("retail.customer"));
        assert!(policy.requires_date_filter("cfo_views.daily_pnl"));
    }

    #[test]
    fn test_pattern_is_case_insensitive_and_anchored() {
        let policy = SecurityPolicy::compile(&cfo_config()).unwrap();
        assert!(policy.matches_pattern("cfo_views.daily_pnl"));
        assert!(policy.matches_pattern("CFO_VIEWS.DAILY_PNL"));
        assert!(!policy.matches_pattern("x_cfo_views.daily_pnl"));
    }

    #[test]
    fn test_unanchored_pattern_still_matches_from_start() {
        let config = PolicyConfig {
            role: "ops".to_string(),
            allowed_patterns: vec![r"ops\.\w+".to_string()],
            ..Default::default()
        };
        let policy = SecurityPolicy::compile(&config).unwrap();
        assert!(policy.matches_pattern("ops.jobs"));
        assert!(!policy.matches_pattern("devops.jobs"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = PolicyConfig {
            role: "broken".to_string(),
            allowed_patterns: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        let err = SecurityPolicy::compile(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn test_invalid_thresholds_are_rejected() {
        let zero_rows = PolicyConfig {
            role: "r".to_string(),
            max_rows: 0,
            ..Default::default()
        };
        assert!(SecurityPolicy::compile(&zero_rows).is_err());

        let bad_timeout = PolicyConfig {
            role: "r".to_string(),
            timeout_seconds: -1.0,
            ..Default::default()
        };
        assert!(SecurityPolicy::compile(&bad_timeout).is_err());
    }

    #[test]
    fn test_date_predicates_compiled_with_policy() {
        let config = PolicyConfig {
            date_columns: vec!["Sale_Date".to_string(), "created_at".to_string()],
            ..cfo_config()
        };
        let policy = SecurityPolicy::compile(&config).unwrap();
        assert!(policy.has_date_filter("SELECT * FROM f WHERE sale_date >= '2025-01-01'"));
        assert!(policy.has_date_filter("SELECT * FROM f WHERE sale_date::date = '2025-01-01'"));
        assert!(policy.is_date_range_discovery("SELECT max(created_at) FROM f"));

        let no_columns = PolicyConfig {
            date_columns: Vec::new(),
            ..cfo_config()
        };
        let policy = SecurityPolicy::compile(&no_columns).unwrap();
        assert!(!policy.has_date_filter("SELECT * FROM f WHERE sale_date = '2025-01-01'"));
        assert!(!policy.is_date_range_discovery("SELECT MIN(sale_date) FROM f"));
    }

    #[test]
    fn test_derive_only_tightens() {
        let policy = SecurityPolicy::compile(&cfo_config()).unwrap();
        let derived = policy
            .derive()
            .max_rows(100)
            .max_joins(10)
            .timeout(Duration::from_secs(60))
            .build();

        assert_eq!(derived.max_rows(), 100);
        assert_eq!(derived.max_joins(), 4);
        assert_eq!(derived.timeout(), Duration::from_secs(5));
        // Base policy untouched.
        assert_eq!(policy.max_rows(), 5000);
    }
}
