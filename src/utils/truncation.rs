const MAX_ERROR_LENGTH: usize = 500;
const CHARS_PER_TOKEN: usize = 4;

/// Rough token estimate used for prompt budgeting: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Character allowance for a token count.
pub fn tokens_to_chars(tokens: usize) -> usize {
    tokens.saturating_mul(CHARS_PER_TOKEN)
}

/// Keep the first `max_chars` characters and append a visible marker naming
/// how much was cut. Always splits on a char boundary.
pub fn truncate_with_marker(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let cut = byte_offset(text, max_chars);
    format!(
        "{}\n// ... [truncated {} characters to fit the analysis budget] ...\n",
        &text[..cut],
        total - max_chars
    )
}

/// Shorten provider error bodies before they reach logs and reports.
pub fn truncate_error(error: &str) -> String {
    if error.chars().count() <= MAX_ERROR_LENGTH {
        error.to_string()
    } else {
        format!("{}...", &error[..byte_offset(error, MAX_ERROR_LENGTH)])
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(text.len())
}
