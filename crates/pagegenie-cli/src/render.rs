//! Terminal rendering of results and notices.

use chrono::{DateTime, Utc};
use serde_json::Value;

use pagegenie_client::normalize;
use pagegenie_core::{AiContent, AiResult, ConceptComparison, Error, Operation, Quiz, Settings};

/// Display text for a routed result: bullets and sources when the output is
/// structured, otherwise the cleaned text.
pub fn ai_result(operation: Operation, result: &AiResult) -> String {
    match normalize::normalize_text(&result.text) {
        AiContent::Structured(structured) => {
            let mut out: Vec<String> = structured
                .bullets
                .iter()
                .map(|b| format!("• {}", b))
                .collect();
            if !structured.citations.is_empty() {
                out.push(String::new());
                out.push("Sources:".to_string());
                for citation in &structured.citations {
                    let mut line = format!("  - {}", citation.title);
                    if !citation.url.is_empty() && citation.url != citation.title {
                        line.push_str(&format!(" <{}>", citation.url));
                    }
                    if !citation.note.is_empty() {
                        line.push_str(&format!(" ({})", citation.note));
                    }
                    out.push(line);
                }
            }
            out.join("\n")
        }
        AiContent::Text(text) => {
            let text = normalize::strip_code_fences(&text);
            if operation == Operation::Proofread {
                normalize::clean_proofread_text(&text)
            } else {
                text
            }
        }
    }
}

/// One-line notice for a failed command.
pub fn notice(error: &anyhow::Error) -> String {
    let message = match error.downcast_ref::<Error>() {
        Some(e) if e.requires_login() => format!("{} Run `pagegenie login`.", e),
        Some(e @ Error::BackendNotConfigured) => {
            format!("{} Run `pagegenie config set backendUrl <url>`.", e)
        }
        Some(e) => e.to_string(),
        None => format!("{:#}", error),
    };
    message.replace('\n', " ")
}

pub fn timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Settings as JSON with the token masked.
pub fn settings(settings: &Settings) -> Value {
    let mut value = serde_json::to_value(settings).unwrap_or(Value::Null);
    if let Some(token) = value.get_mut("apiToken") {
        if token.as_str().is_some_and(|t| !t.is_empty()) {
            *token = Value::String("********".to_string());
        }
    }
    value
}

pub fn quiz(id: &str, quiz: &Quiz) -> String {
    let mut out = vec![format!("Quiz {} ({} questions)", id, quiz.questions.len())];
    for (i, question) in quiz.questions.iter().enumerate() {
        out.push(String::new());
        out.push(format!("{}. {}", i + 1, question.question));
        for (j, option) in question.options.iter().enumerate() {
            out.push(format!("   [{}] {}", j, option));
        }
    }
    out.join("\n")
}

pub fn comparison(comparison: &ConceptComparison) -> String {
    let field = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    format!(
        "Key claim: {}\nAgreement: {}\nDrift: {}",
        field(&comparison.key_claim),
        field(&comparison.agreement),
        field(&comparison.drift)
    )
}

/// One line per list item: its title, falling back to compact JSON.
pub fn items(items: &[Value]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items
        .iter()
        .map(|item| {
            let title = ["title", "name", "content"]
                .iter()
                .find_map(|k| item.get(*k).and_then(Value::as_str));
            let url = item.get("url").and_then(Value::as_str);
            match (title, url) {
                (Some(t), Some(u)) => format!("- {} <{}>", t, u),
                (Some(t), None) => format!("- {}", t),
                _ => format!("- {}", item),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
