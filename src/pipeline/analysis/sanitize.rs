// Sanitize evidence text before it is embedded in the directive document.
// Removes invisible Unicode, quotes lines that impersonate directive
// structure, and caps the size of a single fragment.

/// Maximum characters kept from one file's extracted text.
pub const MAX_FRAGMENT_CHARS: usize = 200_000;

/// Maximum characters kept from the operator's free-text context.
pub const MAX_CONTEXT_CHARS: usize = 50_000;

const TRUNCATION_MARKER: &str = "…[TRUNCATED]";

/// Prefix for evidence lines that look like directive structure. The line
/// text itself is kept.
const QUOTE_PREFIX: &str = "> ";

/// Sanitize extracted file text. `origin` is only used for audit logging
/// and never logged together with content.
pub fn sanitize_fragment(raw: &str, origin: &str) -> String {
    let cleaned = remove_invisible_chars(&raw.replace("\r\n", "\n"));
    let (quoted, count) = quote_spoofed_lines(&cleaned);

    if count > 0 {
        tracing::warn!(
            artifact = %origin,
            quoted_lines = count,
            "Directive-like lines quoted in file content"
        );
    }

    truncate_chars(&quoted, MAX_FRAGMENT_CHARS)
}

/// Sanitize operator context. Operator text is trusted, so only invisible
/// characters are stripped and length is capped.
pub fn sanitize_context(raw: &str) -> String {
    let cleaned = remove_invisible_chars(&raw.replace("\r\n", "\n"));
    truncate_chars(cleaned.trim(), MAX_CONTEXT_CHARS)
}

/// Remove zero-width and bidi control characters that could hide text
/// from a human reviewer. Standard whitespace is preserved.
fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if matches!(*c, ' ' | '\n' | '\t') {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

/// Lines that would be mistaken for directive section headers, file fences,
/// or chat role markers.
fn is_spoofed_line(trimmed_lower: &str) -> bool {
    trimmed_lower.starts_with("--- start file:")
        || trimmed_lower.starts_with("--- end file:")
        || trimmed_lower.starts_with("instructions:")
        || trimmed_lower.starts_with("task:")
        || trimmed_lower.starts_with("system:")
        || trimmed_lower.starts_with("[system]")
        || trimmed_lower.starts_with("[inst]")
        || trimmed_lower.starts_with("<<sys>>")
        || trimmed_lower.contains("ignore previous instructions")
        || trimmed_lower.contains("ignore all instructions")
        || trimmed_lower.contains("disregard your instructions")
}

fn quote_spoofed_lines(text: &str) -> (String, usize) {
    let mut out = Vec::new();
    let mut quoted = 0usize;
    for line in text.lines() {
        if is_spoofed_line(&line.trim().to_lowercase()) {
            quoted += 1;
            out.push(format!("{QUOTE_PREFIX}{line}"));
        } else {
            out.push(line.to_string());
        }
    }
    (out.join("\n"), quoted)
}

/// Truncate to `max_chars` characters, breaking at the last whitespace.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..cut];
    match head.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => format!("{}{TRUNCATION_MARKER}", &head[..pos]),
        _ => format!("{head}{TRUNCATION_MARKER}"),
    }
}
