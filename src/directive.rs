//! Classification of raw generator output into a single directive.
//!
//! Two explicit stages so behavior is testable independent of generator
//! noise: first pick the candidate line, then classify it. Output with no
//! recognized prefix anywhere becomes an explicit `Unrecognized` directive
//! instead of being treated as if it were an action.

pub const FUNCTION_CALL_PREFIX: &str = "FUNCTION_CALL:";
pub const FINAL_ANSWER_PREFIX: &str = "FINAL_ANSWER:";
pub const ERROR_HALT_PREFIX: &str = "ERROR_HALT:";

/// One classified instruction extracted from generator output. Produced
/// fresh each turn, never persisted beyond it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Invoke {
        tool_name: String,
        raw_tokens: Vec<String>,
    },
    FinalAnswer(String),
    Halt(String),
    Unrecognized,
}

/// First line whose trimmed form starts with a recognized prefix, in
/// original line order. Falls back to the whole trimmed text when the
/// generator emitted no marked line.
pub fn extract_candidate_line(raw: &str) -> &str {
    for line in raw.lines() {
        let line = line.trim();
        if line.starts_with(FUNCTION_CALL_PREFIX)
            || line.starts_with(FINAL_ANSWER_PREFIX)
            || line.starts_with(ERROR_HALT_PREFIX)
        {
            return line;
        }
    }
    raw.trim()
}

/// Classify a single candidate line. `FUNCTION_CALL:` remainders split on
/// `|`: the first segment is the tool name, the rest are raw parameter
/// tokens (all trimmed, empty segments dropped).
pub fn classify(line: &str) -> Directive {
    if let Some(rest) = line.strip_prefix(FUNCTION_CALL_PREFIX) {
        let mut parts = rest.split('|').map(str::trim);
        let tool_name = parts.next().unwrap_or("").to_string();
        if tool_name.is_empty() {
            return Directive::Unrecognized;
        }
        let raw_tokens = parts
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        return Directive::Invoke {
            tool_name,
            raw_tokens,
        };
    }
    if let Some(rest) = line.strip_prefix(FINAL_ANSWER_PREFIX) {
        return Directive::FinalAnswer(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix(ERROR_HALT_PREFIX) {
        return Directive::Halt(rest.trim().to_string());
    }
    Directive::Unrecognized
}

/// Parse a full generator response into a directive.
pub fn parse_directive(raw: &str) -> Directive {
    classify(extract_candidate_line(raw))
}
