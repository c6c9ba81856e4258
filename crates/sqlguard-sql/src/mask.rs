//! Blanking of string literals, quoted identifiers and comments.
//!
//! The masked text has exactly the same byte length as the input, so byte
//! offsets found in it are valid in the original SQL.

/// Replace the contents of literals, quoted identifiers and comments with
/// spaces.
///
/// Recognizes `'...'` (with `''` escapes), `"..."`, `-- ...` to end of line,
/// `/* ... */`, and Postgres dollar quoting (`$$...$$`, `$tag$...$tag$`).
/// Unterminated constructs are masked to the end of the input.
pub(crate) fn mask_literals_and_comments(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < bytes.len() {
        let rest = &sql[i..];
        let end = if rest.starts_with("--") {
            rest.find('\n').map_or(sql.len(), |n| i + n)
        } else if rest.starts_with("/*") {
            rest[2..].find("*/").map_or(sql.len(), |n| i + 2 + n + 2)
        } else if rest.starts_with('\'') {
            quoted_end(sql, i, b'\'')
        } else if rest.starts_with('"') {
            quoted_end(sql, i, b'"')
        } else if let Some(tag) = dollar_tag(rest) {
            rest[tag.len()..]
                .find(tag)
                .map_or(sql.len(), |n| i + tag.len() + n + tag.len())
        } else {
            let ch = rest.chars().next().map_or(1, char::len_utf8);
            out.push_str(&sql[i..i + ch]);
            i += ch;
            continue;
        };

        blank(&mut out, &sql[i..end]);
        i = end;
    }

    out
}

/// End offset (exclusive) of a quoted run starting at `start`, honouring
/// doubled-quote escapes.
fn quoted_end(sql: &str, start: usize, quote: u8) -> usize {
    let bytes = sql.as_bytes();
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    sql.len()
}

/// `$$` or `$tag$` at the start of `s`. Positional parameters (`$1`) are
/// not dollar quotes.
fn dollar_tag(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'$') {
        return None;
    }
    if bytes.get(1) == Some(&b'$') {
        return Some(&s[..2]);
    }
    match bytes.get(1) {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return None,
    }
    let close = s[1..].find('$')? + 1;
    let tag_body = &s[1..close];
    if tag_body.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        Some(&s[..=close])
    } else {
        None
    }
}

fn blank(out: &mut String, text: &str) {
    for ch in text.chars() {
        if ch == '\n' {
            out.push('\n');
        } else {
            out.extend(std::iter::repeat_n(' ', ch.len_utf8()));
        }
    }
}
