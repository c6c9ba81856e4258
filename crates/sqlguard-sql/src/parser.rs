//! Structural facts extracted from raw SQL text.
//!
//! The scan is deliberately shallow: tables are the identifiers that follow
//! `FROM` or `JOIN`, joins are counted as `JOIN` keywords, and the statement
//! kind comes from the first significant keyword. When the text also parses
//! as PostgreSQL, relations found by walking the AST are added on top of the
//! regex matches, which catches comma-separated `FROM` lists and quoted
//! identifiers. String literals and comments are not excluded from the
//! table, join, or forbidden-keyword scans.

use regex::Regex;
use sqlparser::ast::visit_relations;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::LazyLock;

use crate::mask::mask_literals_and_comments;

/// Statement verbs that can never run through the guardrails.
pub const FORBIDDEN_OPERATIONS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "TRUNCATE", "GRANT", "REVOKE",
    "COPY", "VACUUM", "ANALYZE",
];

/// A plain or double-quoted identifier.
const IDENT: &str = r#"(?:[a-zA-Z_][a-zA-Z0-9_$]*|"(?:[^"]|"")+")"#;

/// `FROM` / `JOIN`, plus the `ONLY` / `LATERAL` modifiers Postgres allows
/// before the relation.
const REF_KEYWORD: &str = r"(?i)\b(?:FROM|JOIN)\s+(?:(?:ONLY|LATERAL)\s+)?";

static TABLE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{REF_KEYWORD}({IDENT})(?:\s*\.\s*({IDENT}))?"))
        .expect("table reference pattern is valid")
});

/// What follows a `FROM` / `JOIN`, up to the next whitespace.
static REF_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"{REF_KEYWORD}(\S*)")).expect("reference target pattern is valid")
});

static JOIN_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bJOIN\b").expect("join pattern is valid"));

static FORBIDDEN_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", FORBIDDEN_OPERATIONS.join("|")))
        .expect("forbidden keyword pattern is valid")
});

static LEADING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s(]*([A-Za-z_]+)").expect("leading keyword pattern is valid")
});

/// Kind of statement, derived from its first significant keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
    Unknown,
}

impl StatementKind {
    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "SELECT" | "WITH" | "VALUES" | "TABLE" => Self::Select,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "DROP" | "CREATE" | "ALTER" | "TRUNCATE" | "GRANT" | "REVOKE" | "COPY" | "VACUUM"
            | "ANALYZE" => Self::Ddl,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Ddl => write!(f, "DDL"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Facts about one SQL text, created per validation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub statement_kind: StatementKind,
    /// First significant keyword, upper-cased.
    pub leading_keyword: Option<String>,
    /// Lower-cased table names, schema-qualified when written that way.
    pub referenced_tables: BTreeSet<String>,
    pub join_count: usize,
    /// Whether the text also parsed as PostgreSQL.
    pub ast_parsed: bool,
    /// Text after a `FROM` or `JOIN` that names no table the scan can read.
    /// Only collected when the text did not parse.
    pub unreadable_references: Vec<String>,
    pub raw_text: String,
}

impl ParsedQuery {
    /// The forbidden verb this text carries, if any.
    ///
    /// The leading keyword is reported first; otherwise the first
    /// word-boundary occurrence anywhere in the text.
    pub fn forbidden_keyword(&self) -> Option<String> {
        if let Some(keyword) = &self.leading_keyword
            && FORBIDDEN_OPERATIONS.contains(&keyword.as_str())
        {
            return Some(keyword.clone());
        }
        FORBIDDEN_KEYWORD
            .captures(&self.raw_text)
            .map(|caps| caps[1].to_uppercase())
    }

    /// Best-effort count of `;`-separated statements.
    pub fn statement_count(&self) -> usize {
        mask_literals_and_comments(&self.raw_text)
            .split(';')
            .filter(|s| !s.trim().is_empty())
            .count()
    }
}

/// Extracts [`ParsedQuery`] facts from SQL text.
pub struct QueryParser {
    dialect: PostgreSqlDialect,
}

impl Clone for QueryParser {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryParser").finish_non_exhaustive()
    }
}

impl QueryParser {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Parse `sql`. Never fails: unparseable text still yields the facts the
    /// regex scan can find.
    pub fn parse(&self, sql: &str) -> ParsedQuery {
        let leading_keyword = LEADING_KEYWORD
            .captures(&mask_literals_and_comments(sql))
            .map(|caps| caps[1].to_uppercase());
        let statement_kind = leading_keyword
            .as_deref()
            .map_or(StatementKind::Unknown, StatementKind::from_keyword);

        let mut referenced_tables: BTreeSet<String> = TABLE_REF
            .captures_iter(sql)
            .filter_map(|caps| match caps.get(2) {
                Some(table) => Some(normalize_name(&format!("{}.{}", &caps[1], table.as_str()))),
                // `LATERAL (subquery)` leaves the modifier as the only word.
                None if is_modifier(&caps[1]) => None,
                None => Some(normalize_name(&caps[1])),
            })
            .collect();

        let ast_tables = self.ast_relations(sql);
        let ast_parsed = ast_tables.is_some();
        let unreadable_references = match ast_tables {
            Some(tables) => {
                referenced_tables.extend(tables);
                Vec::new()
            }
            None => unreadable_references(sql),
        };

        let join_count = JOIN_KEYWORD.find_iter(sql).count();

        tracing::debug!(
            kind = %statement_kind,
            tables = ?referenced_tables,
            joins = join_count,
            ast_parsed,
            "Parsed SQL"
        );

        ParsedQuery {
            statement_kind,
            leading_keyword,
            referenced_tables,
            join_count,
            ast_parsed,
            unreadable_references,
            raw_text: sql.to_string(),
        }
    }

    /// Relations named anywhere in the AST, or `None` if the text does not
    /// parse.
    fn ast_relations(&self, sql: &str) -> Option<Vec<String>> {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                tracing::debug!(error = %e, "SQL did not parse; using keyword scan only");
                return None;
            }
        };

        let mut names = Vec::new();
        for statement in &statements {
            let _ = visit_relations(statement, |relation| {
                names.push(normalize_name(&relation.to_string()));
                ControlFlow::<()>::Continue(())
            });
        }
        Some(names)
    }
}

/// Lower-case a dotted name and drop identifier quoting.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect::<String>()
        .to_lowercase()
}

fn is_modifier(word: &str) -> bool {
    word.eq_ignore_ascii_case("only") || word.eq_ignore_ascii_case("lateral")
}

fn starts_reference(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '_' | '"' | '(')
}

/// `FROM` / `JOIN` targets that are neither an identifier nor a
/// parenthesized subquery.
fn unreadable_references(sql: &str) -> Vec<String> {
    REF_TARGET
        .captures_iter(sql)
        .filter_map(|caps| caps.get(1))
        .map(|target| target.as_str())
        .filter(|target| !target.is_empty() && !target.starts_with(starts_reference))
        .map(str::to_string)
        .collect()
}
