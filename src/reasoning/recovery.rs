//! Extraction and heuristic repair of JSON embedded in model output.
//!
//! Two stages: isolate the first balanced `{...}` / `[...]` block from the
//! surrounding prose, then, only if that block fails to parse, run a small
//! set of repairs. Quote repair is a character automaton (in-string /
//! not-in-string plus an escape flag). The structural clean-ups (trailing
//! commas, bare keys) are regexes applied to the text outside string literals.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Extract, parse and if necessary repair the JSON value in `raw`.
/// Returns `None` when nothing parseable can be recovered.
pub fn recover_json(raw: &str) -> Option<Value> {
    let block = extract_balanced_block(fenced_region(raw))?;
    if let Ok(value) = serde_json::from_str::<Value>(block) {
        return Some(value);
    }

    let repaired = repair_json(block);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            tracing::debug!(block_len = block.len(), "Recovered malformed JSON via repair");
            Some(value)
        }
        Err(_) => None,
    }
}

/// Return the substring from the first `{` or `[` to the point where its
/// bracket stack first returns to empty. Brackets inside string literals are
/// ignored. An unterminated block yields everything from the opening bracket.
pub fn extract_balanced_block(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
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
            '{' | '[' => stack.push(c),
            '}' | ']' => {
                stack.pop();
                if stack.is_empty() {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    Some(&text[start..])
}

/// Heuristically repair near-valid JSON.
///
/// If the repaired text still does not parse, the original block is
/// returned unchanged so the caller can decide to retry.
pub fn repair_json(block: &str) -> String {
    let repaired = repair_string_quotes(block);
    // Quote repair can rebalance a block that was cut short, so trim any tail again.
    let repaired = extract_balanced_block(&repaired).unwrap_or(&repaired).to_string();
    let repaired = map_outside_strings(&repaired, strip_trailing_commas);
    let repaired = map_outside_strings(&repaired, quote_bare_keys);
    let repaired = quote_bare_array_elements(&repaired);

    if serde_json::from_str::<Value>(&repaired).is_ok() {
        repaired
    } else {
        block.to_string()
    }
}

/// Narrow the search to a ```json fenced block when one is present.
fn fenced_region(raw: &str) -> &str {
    match raw.find("```json") {
        Some(start) => {
            let after_fence = &raw[start + 7..];
            match after_fence.find("```") {
                Some(end) => &after_fence[..end],
                None => after_fence,
            }
        }
        None => raw,
    }
}

// ──────────────────────────────────────────────
// Quote repair automaton
// ──────────────────────────────────────────────

/// Re-scan string literals. A `"` inside a string only terminates it when the
/// next non-whitespace character is a structural delimiter (`,` `}` `]` `:`)
/// or end of input; any other `"` is an unescaped inner quote and gets
/// escaped. When an inner quote is preceded by a dangling comma and starts
/// something shaped like an object key, the string lost its closing quote:
/// it is closed before the comma and the quote opens the key.
fn repair_string_quotes(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' if terminates_string(&chars, i + 1) => {
                in_string = false;
                out.push(c);
            }
            '"' if out.trim_end().ends_with(',') && opens_object_key(&chars, i + 1) => {
                let without_comma = out.trim_end().len() - 1;
                out.truncate(without_comma);
                let content_end = out.trim_end().len();
                out.truncate(content_end);
                // Close the value, then open the key string.
                out.push_str("\", \"");
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }

    out
}

fn terminates_string(chars: &[char], from: usize) -> bool {
    match chars[from..].iter().find(|c| !c.is_whitespace()) {
        None => true,
        Some(c) => matches!(c, ',' | '}' | ']' | ':'),
    }
}

/// `name"` followed by optional whitespace and `:`.
fn opens_object_key(chars: &[char], from: usize) -> bool {
    let mut j = from;
    while j < chars.len() && chars[j] != '"' {
        if chars[j] == '\n' || chars[j] == '\\' {
            return false;
        }
        j += 1;
    }
    if j == from || j >= chars.len() {
        return false;
    }
    matches!(chars[j + 1..].iter().find(|c| !c.is_whitespace()), Some(':'))
}

// ──────────────────────────────────────────────
// Structural clean-ups
// ──────────────────────────────────────────────

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

static BARE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*):").unwrap());

fn strip_trailing_commas(segment: &str) -> String {
    TRAILING_COMMA.replace_all(segment, "${1}").into_owned()
}

fn quote_bare_keys(segment: &str) -> String {
    BARE_KEY.replace_all(segment, "${1}\"${2}\"${3}:").into_owned()
}

/// Apply `transform` to every run of text outside string literals.
fn map_outside_strings(input: &str, transform: fn(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut segment = String::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in input.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            out.push_str(&transform(&segment));
            segment.clear();
            out.push(c);
            in_string = true;
        } else {
            segment.push(c);
        }
    }
    out.push_str(&transform(&segment));
    out
}

/// Quote scalar array elements that are not strings, numbers, booleans,
/// `null`, or nested structures: `[Head, Neck]` → `["Head", "Neck"]`.
fn quote_bare_array_elements(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut containers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut expecting_element = false;
    let mut i = 0;

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

        match c {
            '"' => {
                in_string = true;
                expecting_element = false;
                out.push(c);
            }
            '[' | '{' => {
                containers.push(c);
                expecting_element = c == '[';
                out.push(c);
            }
            ']' | '}' => {
                containers.pop();
                expecting_element = false;
                out.push(c);
            }
            ',' => {
                expecting_element = containers.last() == Some(&'[');
                out.push(c);
            }
            _ if c.is_whitespace() => out.push(c),
            _ if expecting_element => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| matches!(ch, ',' | ']' | '\n'))
                    .map_or(chars.len(), |p| i + p);
                let token: String = chars[i..end].iter().collect();
                let trimmed = token.trim_end();

                if is_json_scalar(trimmed) {
                    out.push_str(trimmed);
                } else {
                    out.push('"');
                    out.push_str(&trimmed.replace('\\', "\\\\").replace('"', "\\\""));
                    out.push('"');
                }
                out.push_str(&token[trimmed.len()..]);

                expecting_element = false;
                i = end;
                continue;
            }
            _ => {
                expecting_element = false;
                out.push(c);
            }
        }
        i += 1;
    }

    out
}

fn is_json_scalar(token: &str) -> bool {
    matches!(token, "true" | "false" | "null")
        || serde_json::from_str::<Value>(token)
            .map(|v| v.is_number())
            .unwrap_or(false)
}
