/// Content of the first fenced code block, without the fence or language tag.
/// Returns `None` when there is no fence or it is never closed.
pub fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let content_start = after_fence.find('\n').map(|nl| nl + 1)?;
    let content = &after_fence[content_start..];
    let end = content.find("```")?;
    Some(content[..end].trim())
}

struct Scan<'a> {
    spans: Vec<&'a str>,
    /// Top-level object still open when the text ends.
    open_tail: Option<&'a str>,
}

fn scan_objects(text: &str) -> Scan<'_> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    let open_tail = (depth > 0).then(|| {
        let tail = text[start..].trim_end();
        tail.strip_suffix("```").unwrap_or(tail).trim_end()
    });
    Scan { spans, open_tail }
}

/// Top-level `{...}` spans, with braces inside string literals ignored.
pub fn balanced_spans(text: &str) -> Vec<&str> {
    scan_objects(text).spans
}

/// The top-level object a cut-off reply leaves unclosed, from its `{` to the end.
pub fn unclosed_tail(text: &str) -> Option<&str> {
    scan_objects(text).open_tail
}

/// The widest balanced span; the earliest one wins a tie.
pub fn widest_object(text: &str) -> Option<&str> {
    balanced_spans(text)
        .into_iter()
        .fold(None, |best: Option<&str>, span| match best {
            Some(b) if b.len() >= span.len() => Some(b),
            _ => Some(span),
        })
}

/// Candidates for the extraction stage, in the order they are tried.
pub fn extraction_candidates(text: &str) -> Vec<&str> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(block) = fenced_block(text) {
        candidates.push(block);
    }
    if let Some(span) = widest_object(text) {
        if !candidates.contains(&span) {
            candidates.push(span);
        }
    }
    candidates
}

/// Substring handed to structural repair: the fenced block, else the longer of
/// the widest balanced span and an unclosed trailing object, else everything
/// from the first `{`.
pub fn repair_target(text: &str) -> Option<&str> {
    if let Some(block) = fenced_block(text) {
        if let Some(open) = block.find('{') {
            return Some(&block[open..]);
        }
    }
    let widest = widest_object(text);
    if let Some(tail) = unclosed_tail(text) {
        if widest.map_or(true, |span| tail.len() > span.len()) {
            return Some(tail);
        }
    }
    if let Some(span) = widest {
        return Some(span);
    }
    let open = text.find('{')?;
    let tail = text[open..].trim_end();
    Some(tail.strip_suffix("```").unwrap_or(tail).trim_end())
}
