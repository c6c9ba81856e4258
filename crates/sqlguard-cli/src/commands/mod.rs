pub mod check;
pub mod exec;
pub mod roles;

use anyhow::{Context, Result};
use sqlguard_core::{GuardConfig, PolicyRegistry};
use sqlguard_policy::Guardrails;
use std::path::Path;
use std::sync::Arc;

/// Load the guardrail configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<GuardConfig> {
    match path {
        Some(path) => GuardConfig::load_with_context(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(GuardConfig::default()),
    }
}

pub fn build_guardrails(config: &GuardConfig) -> Result<Guardrails> {
    let registry = PolicyRegistry::from_config(config).context("invalid role policy")?;
    Ok(Guardrails::new(Arc::new(registry)))
}

/// SQL from the command line, or from `file` when given.
pub fn read_sql(sql: Option<String>, file: Option<&Path>) -> Result<String> {
    match (sql, file) {
        (_, Some(file)) => std::fs::read_to_string(file)
            .with_context(|| format!("failed to read SQL from {}", file.display())),
        (Some(sql), None) => Ok(sql),
        (None, None) => anyhow::bail!("no SQL given: pass it as an argument or with --file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_uses_builtin_roles() {
        let config = load_config(None).unwrap();
        let guardrails = build_guardrails(&config).unwrap();
        assert_eq!(
            guardrails.registry().roles(),
            vec!["CEO", "CFO", "CIO", "CMO", "EVAL"]
        );
    }

    #[test]
    fn test_config_file_replaces_builtin_roles() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sqlguard.yaml");
        std::fs::write(
            &path,
            r#"
roles:
  AUDITOR:
    role: AUDITOR
    allowed_schemas: [finance]
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        let guardrails = build_guardrails(&config).unwrap();
        assert_eq!(guardrails.registry().roles(), vec!["AUDITOR"]);
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let err = load_config(Some(Path::new("/nonexistent/sqlguard.yaml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/sqlguard.yaml"));
    }

    #[test]
    fn test_read_sql_prefers_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "SELECT 1").unwrap();

        assert_eq!(read_sql(None, Some(file.path())).unwrap(), "SELECT 1");
        assert_eq!(read_sql(Some("SELECT 2".into()), None).unwrap(), "SELECT 2");
        assert!(read_sql(None, None).is_err());
    }
}
