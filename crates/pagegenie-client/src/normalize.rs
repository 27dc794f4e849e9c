//! Tolerant parsing of AI and backend response shapes.
//!
//! Everything here is best-effort: a shape that is not recognized degrades to
//! plain text (or `None`) and no function in this module returns an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use pagegenie_core::{AiContent, Citation, ConceptComparison, NoteCategories, StructuredResult};

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^```[\w+-]*\s*\n([\s\S]*?)\n```$").expect("valid fence regex")
});

static LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[\w+-]*\s*\n?").expect("valid fence regex"));

static PROOFREAD_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(PROOFREAD(?:_TEXT)?|CORRECTED(?:_TEXT)?)\s*:\s*")
        .expect("valid label regex")
});

// =============================================================================
// RESULT EXTRACTION
// =============================================================================

/// Pull the result string out of a backend AI response.
///
/// Accepts a bare string, `{result}`, `{output}`, `{data: {result}}` and
/// `{data: {output}}`, in that order.
pub fn extract_result(value: &Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    let paths: [&[&str]; 4] = [
        &["result"],
        &["output"],
        &["data", "result"],
        &["data", "output"],
    ];
    paths
        .iter()
        .find_map(|path| lookup(value, path).and_then(Value::as_str))
        .map(str::to_string)
}

/// Reduce an on-device model output to display text.
///
/// `null` becomes the empty string; unrecognized objects are serialized.
pub fn to_plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(_) => {
            for key in ["text", "correctedText", "result", "output"] {
                if let Some(s) = value.get(key).and_then(Value::as_str) {
                    return s.to_string();
                }
            }
            if let Some(s) = lookup(value, &["choices"])
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("text"))
                .and_then(Value::as_str)
            {
                return s.to_string();
            }
            if let Some(parts) = value
                .get("candidates")
                .and_then(|c| c.get(0))
                .and_then(|c| lookup(c, &["content", "parts"]))
                .and_then(Value::as_array)
            {
                let joined = parts
                    .iter()
                    .map(|p| p.get("text").and_then(Value::as_str).unwrap_or(""))
                    .collect::<Vec<_>>()
                    .join("\n");
                let joined = joined.trim();
                if !joined.is_empty() {
                    return joined.to_string();
                }
            }
            value.to_string()
        }
        other => other.to_string(),
    }
}

/// Remove one surrounding Markdown code fence, keeping the body.
pub fn strip_code_fences(s: &str) -> String {
    if let Some(body) = FENCED_BLOCK
        .captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|body| !body.is_empty())
    {
        return body.to_string();
    }
    if s.starts_with("```") && s.ends_with("```") {
        let without_head = LEADING_FENCE.replace(s, "");
        return without_head
            .strip_suffix("```")
            .unwrap_or(&without_head)
            .to_string();
    }
    s.to_string()
}

/// Drop a leading `PROOFREAD:` / `CORRECTED_TEXT:` label some models emit.
pub fn clean_proofread_text(s: &str) -> String {
    PROOFREAD_LABEL.replace(s, "").trim().to_string()
}

// =============================================================================
// STRUCTURED RESULTS
// =============================================================================

/// Find the JSON value embedded in model output.
///
/// Handles a surrounding code fence, a double-encoded JSON string, and
/// leading/trailing prose around a single object.
pub fn parse_embedded_json(text: &str) -> Option<Value> {
    let mut s = text.trim();
    if s.starts_with("```") {
        if let Some(nl) = s.find('\n') {
            s = &s[nl + 1..];
        }
        if let Some(last) = s.rfind("```") {
            s = &s[..last];
        }
        s = s.trim();
    }

    let inner = match serde_json::from_str::<Value>(s) {
        Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
            Ok(v) => return Some(v),
            Err(_) => inner,
        },
        Ok(v) => return Some(v),
        Err(_) => s.to_string(),
    };

    first_balanced_object(&inner).and_then(|span| serde_json::from_str(span).ok())
}

/// First `{...}` span whose braces balance.
///
/// Braces inside JSON string literals are counted like any other brace, so
/// an object containing `"}"` in a string value is cut short and fails to
/// parse.
fn first_balanced_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in s[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&s[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Recognize a `{bullets, citations}` object.
///
/// `points` is accepted for `bullets` and `references` for `citations`. Empty
/// bullets are dropped and at least one must remain.
pub fn normalize_structured(value: &Value) -> Option<StructuredResult> {
    let obj = value.as_object()?;
    let bullets = obj
        .get("bullets")
        .and_then(Value::as_array)
        .or_else(|| obj.get("points").and_then(Value::as_array))?;

    let bullets: Vec<String> = bullets
        .iter()
        .map(|b| match b {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .filter(|b| !b.is_empty())
        .collect();
    if bullets.is_empty() {
        return None;
    }

    let citations = obj
        .get("citations")
        .and_then(Value::as_array)
        .or_else(|| obj.get("references").and_then(Value::as_array))
        .map(|entries| entries.iter().map(normalize_citation).collect())
        .unwrap_or_default();

    Some(StructuredResult { bullets, citations })
}

fn normalize_citation(entry: &Value) -> Citation {
    if entry.is_object() {
        let url = first_non_empty(entry, &["url", "href"]).unwrap_or("");
        let title = first_non_empty(entry, &["title", "text", "url", "href"]).unwrap_or("Source");
        let note = first_non_empty(entry, &["note", "reason"]).unwrap_or("");
        return Citation {
            url: url.to_string(),
            title: title.to_string(),
            note: note.to_string(),
        };
    }

    let s = match entry {
        Value::String(s) => s.clone(),
        Value::Null | Value::Bool(false) => String::new(),
        other => other.to_string(),
    };
    Citation {
        url: if s.starts_with("http") {
            s.clone()
        } else {
            String::new()
        },
        title: if s.is_empty() { "Source".to_string() } else { s },
        note: String::new(),
    }
}

/// Canonical content of a raw AI result value.
pub fn normalize(value: &Value) -> AiContent {
    match value {
        Value::String(s) => normalize_text(s),
        other => {
            if let Some(structured) = normalize_structured(other) {
                return AiContent::Structured(structured);
            }
            match extract_result(other) {
                Some(text) => normalize_text(&text),
                None => AiContent::Text(to_plain_text(other)),
            }
        }
    }
}

/// Canonical content of a raw AI result string. Unrecognized text is
/// returned verbatim.
pub fn normalize_text(text: &str) -> AiContent {
    parse_embedded_json(text)
        .as_ref()
        .and_then(normalize_structured)
        .map(AiContent::Structured)
        .unwrap_or_else(|| AiContent::Text(text.to_string()))
}

// =============================================================================
// BACKEND PAYLOADS
// =============================================================================

/// Reading suggestions from any of the list shapes the backend uses.
pub fn normalize_suggestions(value: &Value) -> Vec<Value> {
    if let Some(items) = value.as_array() {
        return items.clone();
    }
    for key in ["data", "items", "suggestions"] {
        if let Some(items) = value.get(key).and_then(Value::as_array) {
            return items.clone();
        }
    }
    if first_non_empty(value, &["suggestedUrl", "url"]).is_some() {
        return vec![value.clone()];
    }
    Vec::new()
}

/// Quiz id from a generate response, as a string.
pub fn extract_quiz_id(value: &Value) -> Option<String> {
    let paths: [&[&str]; 4] = [&["id"], &["quizId"], &["data", "id"], &["data", "quizId"]];
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Concept comparison fields, accepting snake and camel case keys.
pub fn normalize_comparison(value: &Value) -> ConceptComparison {
    let field = |keys: &[&str]| first_non_empty(value, keys).unwrap_or("").to_string();
    ConceptComparison {
        key_claim: field(&["key_claim", "keyClaim"]),
        agreement: field(&["agreement"]),
        drift: field(&["drift_analysis", "drift"]),
    }
}

/// Note categorization, stored by the backend as a JSON string in
/// `categoriesJson` (or occasionally as an object).
pub fn extract_note_categories(value: &Value) -> Option<NoteCategories> {
    let raw = value
        .get("categoriesJson")
        .or_else(|| lookup(value, &["data", "categoriesJson"]))?;
    let parsed = match raw {
        Value::String(s) => serde_json::from_str::<Value>(s).ok()?,
        Value::Object(_) => raw.clone(),
        _ => return None,
    };
    serde_json::from_value(parsed).ok()
}

// =============================================================================
// HELPERS
// =============================================================================

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

fn first_non_empty<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}
