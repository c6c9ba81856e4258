//! Role-keyed registry of security policies.
//!
//! The registry is populated once and exposes no mutation API. Lookups are
//! case-insensitive on the role name; a miss is a configuration defect and
//! never falls back to a default policy.

use std::collections::BTreeMap;

use crate::config::{ConfigError, GuardConfig, PolicyConfig, builtin_policies};
use crate::policy::SecurityPolicy;

/// Error returned when a role has no policy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {role}. Valid roles: {valid:?}")]
pub struct UnknownRoleError {
    pub role: String,
    pub valid: Vec<String>,
}

/// Immutable table of security policies keyed by upper-cased role name.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, SecurityPolicy>,
}

impl PolicyRegistry {
    /// Compile a set of policy definitions into a registry.
    ///
    /// Role names must be unique ignoring case.
    pub fn from_policies(
        configs: impl IntoIterator<Item = PolicyConfig>,
    ) -> Result<Self, ConfigError> {
        let mut policies = BTreeMap::new();
        for config in configs {
            let policy = SecurityPolicy::compile(&config)?;
            let key = policy.role().to_string();
            if policies.contains_key(&key) {
                return Err(ConfigError::Config(format!("duplicate policy for role {key}")));
            }
            policies.insert(key, policy);
        }
        if policies.is_empty() {
            return Err(ConfigError::Config("no role policies configured".to_string()));
        }
        tracing::debug!(roles = policies.len(), "Policy registry built");
        Ok(Self { policies })
    }

    /// Registry for the policies in effect for `config`.
    pub fn from_config(config: &GuardConfig) -> Result<Self, ConfigError> {
        Self::from_policies(config.effective_policies())
    }

    /// Registry of the built-in boardroom policies.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_policies(builtin_policies())
    }

    /// Look up the policy for `role`, ignoring case.
    pub fn lookup(&self, role: &str) -> Result<&SecurityPolicy, UnknownRoleError> {
        self.policies
            .get(&role.trim().to_uppercase())
            .ok_or_else(|| UnknownRoleError {
                role: role.to_string(),
                valid: self.roles().into_iter().map(String::from).collect(),
            })
    }

    /// Sorted role names.
    pub fn roles(&self) -> Vec<&str> {
        self.policies.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecurityPolicy> {
        self.policies.values()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = PolicyRegistry::builtin().unwrap();
        assert_eq!(registry.lookup("cfo").unwrap().role(), "CFO");
        assert_eq!(registry.lookup(" Ceo ").unwrap().max_rows(), 1000);
    }

    #[test]
    fn test_unknown_role_fails_closed() {
        let registry = PolicyRegistry::builtin().unwrap();
        let err = registry.lookup("CTO").unwrap_err();
        assert_eq!(err.role, "CTO");
        assert_eq!(err.valid, vec!["CEO", "CFO", "CIO", "CMO", "EVAL"]);
        assert!(err.to_string().starts_with("Unknown role: CTO"));
    }

    #[test]
    fn test_duplicate_roles_are_rejected() {
        let a = PolicyConfig {
            role: "ops".to_string(),
            ..Default::default()
        };
        let b = PolicyConfig {
            role: "OPS".to_string(),
            ..Default::default()
        };
        assert!(PolicyRegistry::from_policies(vec![a, b]).is_err());
    }

    #[test]
    fn test_empty_registry_is_rejected() {
        assert!(PolicyRegistry::from_policies(Vec::new()).is_err());
    }

    #[test]
    fn test_builtin_thresholds() {
        let registry = PolicyRegistry::builtin().unwrap();
        let cio = registry.lookup("CIO").unwrap();
        assert_eq!(cio.max_rows(), 10000);
        assert_eq!(cio.timeout().as_secs(), 10);
        assert_eq!(registry.lookup("EVAL").unwrap().max_joins(), 6);
    }
}
