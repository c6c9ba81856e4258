use anyhow::Result;
use sqlguard_core::{GuardConfig, SecurityPolicy};

use super::build_guardrails;

fn join_or_dash<'a>(items: impl Iterator<Item = &'a str>) -> String {
    let joined = items.collect::<Vec<_>>().join(", ");
    if joined.is_empty() { "-".to_string() } else { joined }
}

fn describe(policy: &SecurityPolicy) -> String {
    let mut out = policy.role().to_string();
    if let Some(description) = policy.description() {
        out.push_str(&format!("  {description}"));
    }
    out.push('\n');
    out.push_str(&format!(
        "  schemas:       {}\n",
        join_or_dash(policy.allowed_schemas().iter().map(String::as_str))
    ));
    out.push_str(&format!(
        "  patterns:      {}\n",
        join_or_dash(policy.allowed_patterns().iter().map(|p| p.as_str()))
    ));
    out.push_str(&format!(
        "  denied:        {}\n",
        join_or_dash(policy.denied_tables().iter().map(String::as_str))
    ));
    out.push_str(&format!(
        "  limits:        {} joins, {} rows, {}s timeout\n",
        policy.max_joins(),
        policy.max_rows(),
        policy.timeout().as_secs()
    ));
    out.push_str(&format!(
        "  date filter:   {}\n",
        join_or_dash(policy.fact_tables_requiring_date().iter().map(String::as_str))
    ));
    out
}

pub fn run_roles(config: &GuardConfig) -> Result<()> {
    let guardrails = build_guardrails(config)?;
    let registry = guardrails.registry();

    println!("{} role(s)\n", registry.len());
    for policy in registry.iter() {
        println!("{}", describe(policy));
    }
    Ok(())
}
