//! Configuration types for the SQL guardrails.
//!
//! Configuration is loaded once at process start from a YAML file and never
//! mutated afterwards. Role policies can be declared inline under `roles:`,
//! collected from a `roles_dir` (one `*.yaml` file per role), or listed
//! explicitly in `role_files`. When no roles are declared anywhere, the
//! built-in boardroom policies are used.
//!
//! ```yaml
//! project: boardroom
//! upstream:
//!   url_env: DATABASE_URL
//! audit:
//!   file: logs/guardrail_violations.jsonl
//! roles_dir: roles
//! ```

pub mod audit;
pub mod defaults;
pub mod policy;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use audit::AuditConfig;
pub use defaults::builtin_policies;
pub use policy::{DEFAULT_DATE_COLUMNS, PolicyConfig};
pub use upstream::UpstreamConfig;

/// Complete guardrail configuration loaded from files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub project: Option<String>,

    /// Warehouse connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Violation audit trail.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Directory containing role policy files.
    #[serde(default)]
    pub roles_dir: Option<PathBuf>,

    /// Individual role policy files.
    #[serde(default)]
    pub role_files: Vec<PathBuf>,

    /// Inline role policies keyed by role name.
    #[serde(default)]
    pub roles: BTreeMap<String, PolicyConfig>,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid table pattern '{pattern}' for role {role}: {source}")]
    Pattern {
        role: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GuardConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        for (name, policy) in config.roles.iter_mut() {
            if policy.role.is_empty() {
                policy.role = name.clone();
            }
        }
        Ok(config)
    }

    /// Load configuration and resolve `roles_dir` and `role_files`
    /// relative to the configuration file.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(roles_dir) = &config.roles_dir {
            let roles_path = resolve(&base_dir, roles_dir);
            if !roles_path.is_dir() {
                return Err(ConfigError::Config(format!(
                    "roles_dir {} is not a directory",
                    roles_path.display()
                )));
            }

            let mut files: Vec<PathBuf> = fs::read_dir(&roles_path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|e| e == "yaml" || e == "yml"))
                .collect();
            // Deterministic load order across platforms.
            files.sort();

            for file in files {
                config.insert_role_file(&file)?;
            }
        }

        for role_file in config.role_files.clone() {
            let role_path = resolve(&base_dir, &role_file);
            config.insert_role_file(&role_path)?;
        }

        Ok(config)
    }

    fn insert_role_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let policy = PolicyConfig::from_file(path)?;
        if policy.role.trim().is_empty() {
            return Err(ConfigError::Config(format!(
                "role file {} does not name a role",
                path.display()
            )));
        }
        tracing::debug!(role = %policy.role, file = %path.display(), "Loaded role policy");
        self.roles.insert(policy.role.clone(), policy);
        Ok(())
    }

    /// Role policies in effect: the configured ones, or the built-in
    /// boardroom policies when none are configured.
    pub fn effective_policies(&self) -> Vec<PolicyConfig> {
        if self.roles.is_empty() {
            builtin_policies()
        } else {
            self.roles.values().cloned().collect()
        }
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_inline_role_takes_name_from_key() {
        let config = GuardConfig::from_yaml(
            "roles:\n  analyst:\n    allowed_schemas: [marts]\n    max_rows: 200\n",
        )
        .unwrap();
        let policies = config.effective_policies();
        assert_eq!(policies.len(), 1);
        assert_eq!(policies[0].role, "analyst");
        assert_eq!(policies[0].max_rows, 200);
    }

    #[test]
    fn test_empty_config_falls_back_to_builtin_roles() {
        let config = GuardConfig::from_yaml("project: boardroom\n").unwrap();
        let roles: Vec<String> = config.effective_policies().into_iter().map(|p| p.role).collect();
        assert_eq!(roles, vec!["CEO", "CFO", "CMO", "CIO", "EVAL"]);
    }

    #[test]
    fn test_load_with_context_reads_roles_dir() {
        let dir = tempfile::tempdir().unwrap();
        let roles_dir = dir.path().join("roles");
        fs::create_dir(&roles_dir).unwrap();

        let mut cfo = fs::File::create(roles_dir.join("cfo.yaml")).unwrap();
        writeln!(cfo, "role: CFO\nallowed_schemas: [cfo_views]\nmax_joins: 4").unwrap();
        fs::write(roles_dir.join("notes.txt"), "ignored").unwrap();

        let main = dir.path().join("guard.yaml");
        fs::write(&main, "roles_dir: roles\n").unwrap();

        let config = GuardConfig::load_with_context(&main).unwrap();
        assert_eq!(config.roles.len(), 1);
        assert_eq!(config.roles["CFO"].max_joins, 4);
    }

    #[test]
    fn test_missing_roles_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("guard.yaml");
        fs::write(&main, "roles_dir: nowhere\n").unwrap();

        let err = GuardConfig::load_with_context(&main).unwrap_err();
        assert!(matches!(err, ConfigError::Config(_)));
    }

    #[test]
    fn test_role_file_without_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("anon.yaml"), "max_rows: 10\n").unwrap();
        let main = dir.path().join("guard.yaml");
        fs::write(&main, "role_files: [anon.yaml]\n").unwrap();

        assert!(GuardConfig::load_with_context(&main).is_err());
    }
}
