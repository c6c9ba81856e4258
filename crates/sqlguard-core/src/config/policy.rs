//! Declarative per-role policy definitions.
//!
//! A `PolicyConfig` is the serialized form of a role's security policy, as it
//! appears inline under `roles:` in the main configuration file or as a
//! standalone file in `roles_dir`. It is compiled into an immutable
//! [`SecurityPolicy`](crate::SecurityPolicy) when the registry is built.
//!
//! ```yaml
//! role: CFO
//! allowed_schemas: [cfo_views]
//! allowed_patterns: ['^cfo_views\.\w+$']
//! denied_tables: [retail.customer, retail.supplier]
//! max_joins: 4
//! max_rows: 5000
//! timeout_seconds: 5.0
//! fact_tables_requiring_date: [cfo_views.daily_pnl]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::ConfigError;

/// Date and timestamp columns recognized as a temporal filter when a role
/// does not configure its own set.
pub const DEFAULT_DATE_COLUMNS: &[&str] = &[
    "sale_date",
    "transaction_date",
    "return_date",
    "order_date",
    "effective_start",
    "effective_end",
    "created_at",
    "check_date",
];

/// Serialized security policy for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Role identifier (e.g. "CFO"). May be omitted for inline roles, where
    /// the map key is used instead.
    #[serde(default)]
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Schemas the role may reference.
    #[serde(default)]
    pub allowed_schemas: Vec<String>,

    /// Regular expressions over `schema.table`; a table must match one.
    #[serde(default)]
    pub allowed_patterns: Vec<String>,

    /// Exact `schema.table` names that are always rejected.
    #[serde(default)]
    pub denied_tables: Vec<String>,

    /// Inclusive ceiling on JOIN keyword occurrences.
    #[serde(default = "default_max_joins")]
    pub max_joins: u32,

    /// Ceiling on result rows, enforced through a LIMIT clause.
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,

    /// Statement timeout applied to the executing session.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Fact tables that must carry a date predicate.
    #[serde(default)]
    pub fact_tables_requiring_date: Vec<String>,

    /// Columns whose comparison counts as a date predicate.
    #[serde(default = "default_date_columns")]
    pub date_columns: Vec<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            role: String::new(),
            description: None,
            allowed_schemas: Vec::new(),
            allowed_patterns: Vec::new(),
            denied_tables: Vec::new(),
            max_joins: default_max_joins(),
            max_rows: default_max_rows(),
            timeout_seconds: default_timeout_seconds(),
            fact_tables_requiring_date: Vec::new(),
            date_columns: default_date_columns(),
        }
    }
}

impl PolicyConfig {
    /// Load a policy definition from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse a policy definition from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }
}

fn default_max_joins() -> u32 {
    5
}

fn default_max_rows() -> u64 {
    5000
}

fn default_timeout_seconds() -> f64 {
    5.0
}

pub(crate) fn default_date_columns() -> Vec<String> {
    DEFAULT_DATE_COLUMNS.iter().map(|c| c.to_string()).collect()
}
