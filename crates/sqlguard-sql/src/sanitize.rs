//! Clean-up of model-generated SQL before it is validated.

/// Remove a surrounding markdown code fence (```` ```sql ```` or ```` ``` ````)
/// and trim whitespace.
///
/// Text without a fence is only trimmed. Nothing inside the fence is
/// altered; the result still has to pass validation.
pub fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (`sql`, `postgresql`, ...) on the opening line.
    let body = match rest.find('\n') {
        Some(newline) if rest[..newline].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        _ => rest,
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
