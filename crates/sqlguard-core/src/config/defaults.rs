//! Built-in boardroom role policies.
//!
//! Used when a configuration defines no roles of its own.

use super::policy::{PolicyConfig, default_date_columns};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The five boardroom policies: CEO, CFO, CMO, CIO and EVAL.
pub fn builtin_policies() -> Vec<PolicyConfig> {
    vec![ceo(), cfo(), cmo(), cio(), eval()]
}

fn ceo() -> PolicyConfig {
    PolicyConfig {
        role: "CEO".to_string(),
        description: Some("Board-level aggregates only".to_string()),
        allowed_schemas: strings(&["ceo_views"]),
        allowed_patterns: strings(&[r"^ceo_views\.\w+$"]),
        denied_tables: strings(&[
            "retail.customer",
            "retail.pos_transaction",
            "retail.pos_transaction_line",
            "retail.supplier_product",
        ]),
        max_joins: 3,
        max_rows: 1000,
        timeout_seconds: 5.0,
        // CEO views are pre-aggregated.
        fact_tables_requiring_date: Vec::new(),
        date_columns: default_date_columns(),
    }
}

fn cfo() -> PolicyConfig {
    PolicyConfig {
        role: "CFO".to_string(),
        description: Some("Financial views: P&L, margins, returns".to_string()),
        allowed_schemas: strings(&["cfo_views"]),
        allowed_patterns: strings(&[
            r"^cfo_views\.\w+$",
            r"^cfo_views\.margin_\w+$",
            r"^cfo_views\.returns_\w+$",
        ]),
        denied_tables: strings(&["retail.customer", "retail.supplier", "retail.supplier_product"]),
        max_joins: 4,
        max_rows: 5000,
        timeout_seconds: 5.0,
        fact_tables_requiring_date: strings(&[
            "cfo_views.daily_pnl",
            "cfo_views.margin_by_store",
            "cfo_views.margin_by_category",
            "cfo_views.discount_analysis",
            "cfo_views.returns_impact",
        ]),
        date_columns: default_date_columns(),
    }
}

fn cmo() -> PolicyConfig {
    PolicyConfig {
        role: "CMO".to_string(),
        description: Some("Demand, segment and basket views; no raw customers".to_string()),
        allowed_schemas: strings(&["cmo_views"]),
        allowed_patterns: strings(&[r"^cmo_views\.\w+$"]),
        denied_tables: strings(&[
            "retail.customer",
            "retail.pos_transaction",
            "retail.pos_transaction_line",
        ]),
        max_joins: 4,
        max_rows: 5000,
        timeout_seconds: 5.0,
        fact_tables_requiring_date: strings(&[
            "cmo_views.sales_demand_category",
            "cmo_views.sales_demand_store",
            "cmo_views.basket_metrics",
        ]),
        date_columns: default_date_columns(),
    }
}

fn cio() -> PolicyConfig {
    PolicyConfig {
        role: "CIO".to_string(),
        description: Some("Data health and freshness views".to_string()),
        allowed_schemas: strings(&["cio_views"]),
        allowed_patterns: strings(&[r"^cio_views\.\w+$"]),
        denied_tables: strings(&["retail.customer"]),
        max_joins: 5,
        // Health checks scan wider result sets.
        max_rows: 10000,
        timeout_seconds: 10.0,
        fact_tables_requiring_date: strings(&["cio_views.health_check_history"]),
        date_columns: default_date_columns(),
    }
}

fn eval() -> PolicyConfig {
    PolicyConfig {
        role: "EVAL".to_string(),
        description: Some("Evaluator: read access across every schema".to_string()),
        allowed_schemas: strings(&["retail", "ceo_views", "cfo_views", "cmo_views", "cio_views"]),
        allowed_patterns: strings(&[r"^\w+\.\w+$"]),
        denied_tables: Vec::new(),
        max_joins: 6,
        max_rows: 50000,
        timeout_seconds: 10.0,
        fact_tables_requiring_date: Vec::new(),
        date_columns: default_date_columns(),
    }
}
