use anyhow::Result;
use serde::Serialize;
use sqlguard_core::GuardConfig;
use sqlguard_policy::{Guardrails, ValidationResult};
use sqlguard_sql::strip_markdown_fences;

use super::build_guardrails;

/// Verdict plus the facts the rules were evaluated on.
#[derive(Debug, Serialize)]
struct CheckReport {
    role: String,
    #[serde(flatten)]
    verdict: ValidationResult,
    statement_kind: String,
    statement_count: usize,
    tables: Vec<String>,
    join_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    bounded_sql: Option<String>,
}

fn check_report(guardrails: &Guardrails, role: &str, sql: &str) -> CheckReport {
    let parsed = guardrails.parse(sql);
    let verdict = guardrails.validate(role, sql);
    let bounded_sql = if verdict.ok {
        guardrails.wrap_with_limit(sql, role).ok()
    } else {
        None
    };

    CheckReport {
        role: role.to_uppercase(),
        verdict,
        statement_kind: parsed.statement_kind.to_string(),
        statement_count: parsed.statement_count(),
        tables: parsed.referenced_tables.iter().cloned().collect(),
        join_count: parsed.join_count,
        bounded_sql,
    }
}

fn render(report: &CheckReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Role:       {}\n", report.role));
    out.push_str(&format!(
        "Statement:  {} ({} statement{})\n",
        report.statement_kind,
        report.statement_count,
        if report.statement_count == 1 { "" } else { "s" }
    ));
    let tables = if report.tables.is_empty() {
        "-".to_string()
    } else {
        report.tables.join(", ")
    };
    out.push_str(&format!("Tables:     {tables}\n"));
    out.push_str(&format!("Joins:      {}\n", report.join_count));

    match (&report.verdict.violation_kind, &report.verdict.message) {
        (Some(kind), Some(message)) => {
            out.push_str(&format!("Verdict:    REJECTED ({kind})\n"));
            out.push_str(&format!("Reason:     {message}\n"));
        }
        _ => out.push_str("Verdict:    ALLOWED\n"),
    }
    if let Some(bounded) = &report.bounded_sql {
        out.push_str(&format!("\n{bounded}\n"));
    }
    out
}

/// Print the verdict for `sql`. Returns whether the query is allowed.
pub fn run_check(
    config: &GuardConfig,
    role: &str,
    sql: &str,
    strip_fences: bool,
    json: bool,
) -> Result<bool> {
    let guardrails = build_guardrails(config)?;
    let sql = if strip_fences {
        strip_markdown_fences(sql)
    } else {
        sql
    };

    let report = check_report(&guardrails, role, sql);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&report));
    }
    Ok(report.verdict.ok)
}

/// Print the row-bounded form of `sql` without validating it.
pub fn run_rewrite(config: &GuardConfig, role: &str, sql: &str) -> Result<()> {
    let guardrails = build_guardrails(config)?;
    println!("{}", guardrails.wrap_with_limit(sql, role)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guardrails() -> Guardrails {
        Guardrails::builtin().unwrap()
    }

    #[test]
    fn test_allowed_report() {
        let report = check_report(
            &guardrails(),
            "cfo",
            "SELECT * FROM cfo_views.daily_pnl WHERE sale_date >= '2025-01-01'",
        );
        assert!(report.verdict.ok);
        assert_eq!(report.role, "CFO");
        assert_eq!(report.tables, vec!["cfo_views.daily_pnl"]);
        assert_eq!(
            report.bounded_sql.as_deref(),
            Some("SELECT * FROM cfo_views.daily_pnl WHERE sale_date >= '2025-01-01' LIMIT 5000")
        );

        let text = render(&report);
        assert!(text.contains("Verdict:    ALLOWED"));
        assert!(text.contains("(1 statement)"));
    }

    #[test]
    fn test_rejected_report() {
        let report = check_report(&guardrails(), "CEO", "SELECT * FROM retail.customer");
        assert!(!report.verdict.ok);
        assert!(report.bounded_sql.is_none());

        let text = render(&report);
        assert!(text.contains("REJECTED (TableExplicitlyDenied)"));
        assert!(text.contains("Reason:     Access denied to table: retail.customer."));
    }

    #[test]
    fn test_report_serializes_flat() {
        let report = check_report(&guardrails(), "CEO", "DROP TABLE x");
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["ok"], false);
        assert_eq!(value["violation_kind"], "ForbiddenOperation");
        assert_eq!(value["statement_kind"], "DDL");
        assert!(value.get("bounded_sql").is_none());
    }
}
