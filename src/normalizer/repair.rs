pub type RepairFn = fn(&str) -> String;

/// Named structural repairs for almost-JSON, in the order they run. Repairs
/// are cumulative: each runs on the previous output and the text is re-parsed
/// after every step.
pub const REPAIRS: &[(&str, RepairFn)] = &[
    ("smart_quotes", normalize_smart_quotes),
    ("comments", strip_comments),
    ("single_quotes", convert_single_quotes),
    ("bare_keys", quote_bare_keys),
    ("trailing_separators", strip_trailing_separators),
    ("unbalanced", close_unbalanced),
];

fn is_curly_double(c: char) -> bool {
    matches!(c, '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}')
}

fn is_curly_single(c: char) -> bool {
    matches!(c, '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}')
}

/// True where a key or value may begin.
fn opens_value(prev: Option<char>) -> bool {
    matches!(prev, None | Some('{') | Some('[') | Some(',') | Some(':'))
}

#[derive(Clone, Copy)]
enum QuoteState {
    Outside,
    /// Inside a literal opened by a straight quote.
    Straight(char),
    /// Inside a literal opened by a typographic quote, emitted as the given straight quote.
    Curly(char),
}

/// Replaces typographic quotes used as JSON delimiters with straight ones.
/// Typographic quotes inside string content are left as written.
pub fn normalize_smart_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut state = QuoteState::Outside;
    let mut prev: Option<char> = None;
    let mut escaped = false;

    for c in input.chars() {
        match state {
            QuoteState::Straight(q) => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    state = QuoteState::Outside;
                    prev = Some(q);
                }
            }
            QuoteState::Curly(q) => {
                if escaped {
                    escaped = false;
                    out.push(c);
                    continue;
                }
                let closes = if q == '"' { is_curly_double(c) } else { is_curly_single(c) };
                if closes {
                    out.push(q);
                    state = QuoteState::Outside;
                    prev = Some(q);
                } else if c == q {
                    out.push('\\');
                    out.push(c);
                } else {
                    if c == '\\' {
                        escaped = true;
                    }
                    out.push(c);
                }
            }
            QuoteState::Outside => {
                let straight = if is_curly_double(c) {
                    Some('"')
                } else if is_curly_single(c) {
                    Some('\'')
                } else {
                    None
                };
                match straight {
                    Some(q) => {
                        out.push(q);
                        if opens_value(prev) {
                            state = QuoteState::Curly(q);
                        }
                    }
                    None => {
                        out.push(c);
                        if c == '"' || (c == '\'' && opens_value(prev)) {
                            state = QuoteState::Straight(c);
                        }
                    }
                }
                if !c.is_whitespace() {
                    prev = Some(c);
                }
            }
        }
    }
    out
}

/// Removes `//` and `/* */` comments that sit outside string literals.
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Rewrites `'...'` strings as `"..."`, escaping embedded double quotes.
pub fn convert_single_quotes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_double {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
            }
            continue;
        }
        if in_single {
            if escaped {
                escaped = false;
                if c != '\'' {
                    out.push('\\');
                }
                out.push(c);
                continue;
            }
            match c {
                '\\' => escaped = true,
                '\'' => {
                    in_single = false;
                    out.push('"');
                }
                '"' => out.push_str("\\\""),
                _ => out.push(c),
            }
            continue;
        }
        match c {
            '"' => {
                in_double = true;
                out.push(c);
            }
            '\'' => {
                in_single = true;
                out.push('"');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Quotes identifier keys such as `{title: "x"}`.
pub fn quote_bare_keys(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut expect_key = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if expect_key && (c.is_alphabetic() || c == '_') {
            let start = i;
            let mut end = i;
            while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_' || chars[end] == '-') {
                end += 1;
            }
            let mut lookahead = end;
            while lookahead < chars.len() && chars[lookahead].is_whitespace() {
                lookahead += 1;
            }
            let is_key = lookahead < chars.len() && chars[lookahead] == ':';
            if is_key {
                out.push('"');
            }
            out.extend(&chars[start..end]);
            if is_key {
                out.push('"');
            }
            i = end;
            expect_key = false;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                expect_key = false;
            }
            '{' | ',' => expect_key = true,
            c if c.is_whitespace() => {}
            _ => expect_key = false,
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Drops a `,` that directly precedes a closing `}` or `]`.
pub fn strip_trailing_separators(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        if c == '"' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

/// Terminates an open string and closes open brackets, innermost first.
pub fn close_unbalanced(input: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
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
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' if stack.last() == Some(&c) => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = input.trim_end().to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    let trimmed = out.trim_end();
    let mut out = trimmed.strip_suffix(',').unwrap_or(trimmed).trim_end().to_string();
    if out.ends_with(':') {
        out.push_str(" null");
    }
    while let Some(close) = stack.pop() {
        out.push(close);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parses(text: &str) -> bool {
        serde_json::from_str::<Value>(text).is_ok()
    }

    #[test]
    fn test_smart_quotes() {
        assert_eq!(normalize_smart_quotes("{\u{201C}a\u{201D}: 1}"), "{\"a\": 1}");
        assert_eq!(normalize_smart_quotes("[\u{2018}x\u{2019}]"), "['x']");
    }

    #[test]
    fn test_smart_quotes_inside_strings_are_content() {
        let input = "{\"title\": \"Owner can call \u{201C}kill\u{201D}\", \"note\": \"it\u{2019}s \\\" fine\"}";
        let out = normalize_smart_quotes(input);
        assert_eq!(out, input);
        let value: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["title"], "Owner can call \u{201C}kill\u{201D}");
    }

    #[test]
    fn test_straight_quote_inside_curly_string_is_escaped() {
        let out = normalize_smart_quotes("{\u{201C}title\u{201D}: \u{201C}say \"hi\"\u{201D}}");
        assert_eq!(out, "{\"title\": \"say \\\"hi\\\"\"}");
        assert!(parses(&out));
    }

    #[test]
    fn test_comments_outside_strings_only() {
        let input = "{\"url\": \"https://example.com\", // trailing note\n \"n\": /* inline */ 1}";
        let out = strip_comments(input);
        assert!(out.contains("https://example.com"));
        assert!(!out.contains("trailing note"));
        assert!(!out.contains("inline"));
        assert!(parses(&out));
    }

    #[test]
    fn test_single_quotes_converted() {
        let out = convert_single_quotes("{'title': 'say \"hi\"', 'ok': \"it's\"}");
        assert_eq!(out, "{\"title\": \"say \\\"hi\\\"\", \"ok\": \"it's\"}");
        assert!(parses(&out));
    }

    #[test]
    fn test_bare_keys_quoted_but_values_untouched() {
        let out = quote_bare_keys("{title: \"a, b: c\", nested: {severity: HIGH}, list: [true, null]}");
        assert_eq!(out, "{\"title\": \"a, b: c\", \"nested\": {\"severity\": HIGH}, \"list\": [true, null]}");
    }

    #[test]
    fn test_trailing_separators() {
        let out = strip_trailing_separators("{\"a\": [1, 2, ], \"b\": \"x,}\",}");
        assert_eq!(out, "{\"a\": [1, 2 ], \"b\": \"x,}\"}");
        assert!(parses(&out));
    }

    #[test]
    fn test_close_truncated_reply() {
        let out = close_unbalanced("{\"security_findings\": [{\"title\": \"Reentrancy in withd");
        assert_eq!(out, "{\"security_findings\": [{\"title\": \"Reentrancy in withd\"}]}");
        assert!(parses(&out));
    }

    #[test]
    fn test_close_dangling_key() {
        let out = close_unbalanced("{\"scores\": {\"overall\":");
        assert!(parses(&out));
    }

    #[test]
    fn test_repairs_compose_in_order() {
        let mut text = "{\u{2018}title\u{2019}: 'x', // note\n severity: 'HIGH',}".to_string();
        for (_, repair) in REPAIRS {
            text = repair(&text);
        }
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["severity"], "HIGH");
    }
}
