use anyhow::{Context, Result};
use serde_json::Value;
use sqlguard_adapter_pg::PostgresExecutor;
use sqlguard_audit::AuditLogger;
use sqlguard_core::GuardConfig;
use sqlguard_runtime::GuardrailedConnection;
use std::sync::Arc;

use super::build_guardrails;

/// A `--param` value: JSON when it parses, else the raw text.
fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub async fn run_exec(
    mut config: GuardConfig,
    role: &str,
    sql: &str,
    database_url: Option<String>,
    params: &[String],
) -> Result<()> {
    if let Some(url) = database_url {
        config.upstream.url_env = None;
        config.upstream.url = Some(url);
    }

    let guardrails = build_guardrails(&config)?;
    let audit = AuditLogger::new(config.audit.clone()).context("failed to open audit trail")?;
    let executor = PostgresExecutor::connect(&config.upstream)
        .await
        .context("failed to connect to warehouse")?;

    let conn = GuardrailedConnection::new(Arc::new(executor), guardrails, role)?
        .with_audit(Arc::new(audit));

    let params: Vec<Value> = params.iter().map(|p| parse_param(p)).collect();
    let rows = conn.execute(sql, &params).await?;

    tracing::info!(role = %conn.role(), rows = rows.len(), "Query complete");
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
