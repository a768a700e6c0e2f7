use thiserror::Error;

use super::schema::{conform, report_schema};
use super::types::AnalysisReport;

/// Why a raw response was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationFault {
    #[error("empty response")]
    Empty,

    #[error("not valid JSON: {0}")]
    Malformed(String),

    #[error("schema mismatch: {0}")]
    Schema(String),
}

/// Strip enclosing code-fence markers and surrounding whitespace from a raw
/// response. Idempotent: valid JSON comes back unchanged (modulo outer
/// whitespace), whatever its top-level shape.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(after_open) = text.strip_prefix("```") {
        // Drop the info string (```json) up to the end of the opening line.
        text = match after_open.find('\n') {
            Some(newline) => &after_open[newline + 1..],
            None => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
        text = text.trim_end();
        if let Some(before_close) = text.strip_suffix("```") {
            text = before_close;
        }
        text = text.trim();
    }

    // Prose around the object ("Here is the report: {...}"), only when the
    // text is not JSON as it stands.
    if !is_json(text) {
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if start < end && is_json(&text[start..=end]) {
                text = &text[start..=end];
            }
        }
    }

    text
}

fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde::de::IgnoredAny>(text).is_ok()
}

/// Parse and structurally validate a raw response into a report.
///
/// Optional fields absent from the response are filled with empty values;
/// required sections, enum members and score bounds are enforced.
pub fn parse_report(raw: &str) -> Result<AnalysisReport, ValidationFault> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Err(ValidationFault::Empty);
    }

    let mut value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ValidationFault::Malformed(e.to_string()))?;

    conform(&mut value, report_schema(), "").map_err(ValidationFault::Schema)?;

    serde_json::from_value(value).map_err(|e| ValidationFault::Schema(e.to_string()))
}
