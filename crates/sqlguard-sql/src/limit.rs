//! Row-count bounding of validated SQL.
//!
//! [`wrap_with_limit`] guarantees that the statement's top-level result is
//! bounded by `max_rows`, and is idempotent on its own output.

use regex::Regex;
use std::sync::LazyLock;

use crate::mask::mask_literals_and_comments;

/// Alias of the subquery produced when a limit has to be wrapped.
pub const BOUNDED_QUERY_ALIAS: &str = "bounded_query";

static NUMERIC_LIMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)\b").expect("limit pattern is valid"));

static LIMIT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\b").expect("limit keyword pattern is valid"));

/// A literal limit that ends the clause. `LIMIT 1000 * 1000` does not match.
static LIMIT_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:(\d+)|(ALL))\s*(?:$|;|\)|\bOFFSET\b|\bFOR\b)")
        .expect("limit argument pattern is valid")
});

static FETCH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bFETCH\s+(?:FIRST|NEXT)\b").expect("fetch pattern is valid")
});

/// Bound `sql` to at most `max_rows` rows.
///
/// - every numeric `LIMIT n` with `n > max_rows` is clamped to `max_rows`
/// - a top-level `LIMIT ALL` becomes `LIMIT max_rows`
/// - a top-level limit that is not a lone literal (a bind parameter or an
///   expression such as `1000 * 1000`) or a `FETCH FIRST` clause is
///   wrapped in an outer
///   `SELECT * FROM (...) AS bounded_query LIMIT max_rows`
/// - otherwise a trailing `;` is dropped and `LIMIT max_rows` appended
pub fn wrap_with_limit(sql: &str, max_rows: u64) -> String {
    let clamped = clamp_numeric_limits(sql, max_rows);
    let masked = mask_literals_and_comments(&clamped);

    if let Some(keyword) = last_top_level(&LIMIT_KEYWORD, &masked) {
        let after = keyword.end();
        return match LIMIT_ARGUMENT.captures(&masked[after..]) {
            Some(caps) => match caps.get(2) {
                Some(all) => {
                    let mut out = clamped;
                    let range = after + all.start()..after + all.end();
                    out.replace_range(range, &max_rows.to_string());
                    tracing::debug!(max_rows, "Replaced LIMIT ALL");
                    out
                }
                None => clamped,
            },
            None => wrap_in_subquery(&clamped, max_rows),
        };
    }

    if last_top_level(&FETCH_FIRST, &masked).is_some() {
        return wrap_in_subquery(&clamped, max_rows);
    }

    let body = strip_terminator(&clamped);
    let separator = if ends_in_comment(body) { "\n" } else { " " };
    tracing::debug!(max_rows, "Appended LIMIT");
    format!("{body}{separator}LIMIT {max_rows}")
}

fn clamp_numeric_limits(sql: &str, max_rows: u64) -> String {
    let masked = mask_literals_and_comments(sql);
    let mut out = String::with_capacity(sql.len());
    let mut last = 0;

    for caps in NUMERIC_LIMIT.captures_iter(&masked) {
        let Some(value) = caps.get(1) else { continue };
        // Overflowing literals are certainly above the bound.
        let exceeds = value.as_str().parse::<u64>().map_or(true, |n| n > max_rows);
        if exceeds {
            tracing::debug!(from = value.as_str(), to = max_rows, "Clamped LIMIT");
            out.push_str(&sql[last..value.start()]);
            out.push_str(&max_rows.to_string());
            last = value.end();
        }
    }

    out.push_str(&sql[last..]);
    out
}

/// Last match of `pattern` in `masked` that sits outside any parentheses.
fn last_top_level<'a>(pattern: &Regex, masked: &'a str) -> Option<regex::Match<'a>> {
    pattern
        .find_iter(masked)
        .filter(|m| depth_at(masked, m.start()) == 0)
        .last()
}

fn depth_at(masked: &str, pos: usize) -> i64 {
    masked.as_bytes()[..pos].iter().fold(0, |depth, b| match b {
        b'(' => depth + 1,
        b')' => depth - 1,
        _ => depth,
    })
}

fn wrap_in_subquery(sql: &str, max_rows: u64) -> String {
    tracing::debug!(max_rows, "Wrapped unbounded query in subquery");
    format!(
        "SELECT * FROM (\n{}\n) AS {BOUNDED_QUERY_ALIAS} LIMIT {max_rows}",
        strip_terminator(sql)
    )
}

fn strip_terminator(sql: &str) -> &str {
    sql.trim_end_matches(|c: char| c.is_whitespace() || c == ';')
}

/// Whether the text ends inside a comment, so that appended SQL would be
/// swallowed by it.
fn ends_in_comment(body: &str) -> bool {
    let code_end = mask_literals_and_comments(body).trim_end().len();
    body[code_end..].trim_start().starts_with("--")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_appends_limit() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM ceo_views.board_summary", 1000),
            "SELECT * FROM ceo_views.board_summary LIMIT 1000"
        );
    }

    #[test]
    fn test_strips_terminator_before_appending() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM ceo_views.kpis;  \n", 1000),
            "SELECT * FROM ceo_views.kpis LIMIT 1000"
        );
    }

    #[test]
    fn test_clamps_large_limit() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM cfo_views.daily_pnl LIMIT 50000", 1000),
            "SELECT * FROM cfo_views.daily_pnl LIMIT 1000"
        );
    }

    #[test]
    fn test_keeps_small_limit() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM cfo_views.daily_pnl limit 10", 1000),
            "SELECT * FROM cfo_views.daily_pnl limit 10"
        );
    }

    #[test]
    fn test_keeps_limit_with_offset() {
        let sql = "SELECT * FROM t ORDER BY id LIMIT 20 OFFSET 40";
        assert_eq!(wrap_with_limit(sql, 1000), sql);
    }

    #[test]
    fn test_idempotent() {
        for sql in [
            "SELECT * FROM ceo_views.board_summary",
            "SELECT * FROM t LIMIT 50000;",
            "SELECT * FROM t LIMIT ALL",
            "SELECT * FROM t LIMIT $1",
            "SELECT * FROM t LIMIT 1000 * 1000",
            "SELECT * FROM t LIMIT 50000 * 2",
            "SELECT * FROM t FETCH FIRST 5 ROWS ONLY",
            "SELECT * FROM t -- trailing note",
        ] {
            let once = wrap_with_limit(sql, 1000);
            assert_eq!(wrap_with_limit(&once, 1000), once, "input: {sql}");
        }
    }

    #[test]
    fn test_subquery_limit_is_not_the_statement_bound() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM (SELECT * FROM t LIMIT 5) s", 1000),
            "SELECT * FROM (SELECT * FROM t LIMIT 5) s LIMIT 1000"
        );
    }

    #[test]
    fn test_clamps_nested_limit_too() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM (SELECT * FROM t LIMIT 90000) s LIMIT 10", 1000),
            "SELECT * FROM (SELECT * FROM t LIMIT 1000) s LIMIT 10"
        );
    }

    #[test]
    fn test_limit_all_is_replaced() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM t LIMIT ALL", 500),
            "SELECT * FROM t LIMIT 500"
        );
    }

    #[test]
    fn test_parameterised_limit_is_wrapped() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM t WHERE a = $1 LIMIT $2;", 1000),
            "SELECT * FROM (\nSELECT * FROM t WHERE a = $1 LIMIT $2\n) AS bounded_query LIMIT 1000"
        );
    }

    #[test]
    fn test_limit_expression_is_wrapped() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM t LIMIT 1000 * 1000", 1000),
            "SELECT * FROM (\nSELECT * FROM t LIMIT 1000 * 1000\n) AS bounded_query LIMIT 1000"
        );
        assert_eq!(
            wrap_with_limit("SELECT * FROM t LIMIT 50000 * 2;", 1000),
            "SELECT * FROM (\nSELECT * FROM t LIMIT 1000 * 2\n) AS bounded_query LIMIT 1000"
        );
    }

    #[test]
    fn test_fetch_first_is_wrapped() {
        let out = wrap_with_limit("SELECT * FROM t FETCH FIRST 5 ROWS ONLY", 100);
        assert!(out.starts_with("SELECT * FROM (\n"));
        assert!(out.ends_with(") AS bounded_query LIMIT 100"));
    }

    #[test]
    fn test_limit_inside_literal_is_ignored() {
        assert_eq!(
            wrap_with_limit("SELECT 'LIMIT 99999' AS note FROM t", 1000),
            "SELECT 'LIMIT 99999' AS note FROM t LIMIT 1000"
        );
    }

    #[test]
    fn test_trailing_line_comment_gets_newline() {
        assert_eq!(
            wrap_with_limit("SELECT * FROM t -- weekly", 1000),
            "SELECT * FROM t -- weekly\nLIMIT 1000"
        );
    }
}
