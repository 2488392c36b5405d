pub const MAX_SUBJECT_CHARS: usize = 200;

/// Characters stripped from both ends of user input. Other Unicode
/// whitespace, such as U+00A0, is content and is kept.
const TRIMMED: &[char] = &[' ', '\t', '\n', '\r', '\0', '\x0B'];

pub fn trim_input(text: &str) -> &str {
    text.trim_matches(TRIMMED)
}

/// Escape markup and quote characters in user-provided text.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn sanitize_body(body: &str) -> String {
    escape_html(trim_input(body))
}

/// Trim, escape, then cap at `MAX_SUBJECT_CHARS`. The cap applies to the
/// escaped text, so an entity straddling the limit is cut mid-way.
pub fn sanitize_subject(subject: &str) -> String {
    let escaped = escape_html(trim_input(subject));
    match escaped.char_indices().nth(MAX_SUBJECT_CHARS) {
        Some((cut, _)) => escaped[..cut].to_string(),
        None => escaped,
    }
}
