//! Classification of recovered JSON into the closed `ModelResponse` union.
//!
//! Total by construction: every input resolves to a variant, with
//! `unknown_shape` / `unexpected_json` errors as the fallback arm.

use serde_json::{Map, Value};

use super::types::{
    ConversationSummary, ModelResponse, QuestionPrompt, ResponseError, SummaryAnswer,
    UNEXPECTED_JSON, UNKNOWN_SHAPE,
};

/// Classify a parsed JSON root. Arrays must be unwrapped by the caller.
pub fn classify_response(value: &Value) -> ModelResponse {
    let Some(obj) = value.as_object() else {
        return ModelResponse::error(UNEXPECTED_JSON, "Model output is not a JSON object");
    };

    if let Some(kind) = lookup_field(obj, "type").and_then(Value::as_str) {
        let classified = match kind.trim().to_lowercase().as_str() {
            "question" => question_from(obj),
            "summary" => summary_from(obj),
            "error" => error_from(obj),
            _ => None,
        };
        return classified.unwrap_or_else(unknown_shape);
    }

    if lookup_field(obj, "question").is_some() {
        return question_from(obj).unwrap_or_else(unknown_shape);
    }
    if lookup_field(obj, "summaryText").is_some() {
        return summary_from(obj).unwrap_or_else(unknown_shape);
    }
    if lookup_field(obj, "errorCode").is_some() {
        return error_from(obj).unwrap_or_else(unknown_shape);
    }

    unknown_shape()
}

/// Exact key first, then a case-insensitive match.
pub(crate) fn lookup_field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

/// Render a scalar as text. Objects and arrays are rejected.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn unknown_shape() -> ModelResponse {
    ModelResponse::error(UNKNOWN_SHAPE, "Model output did not match any known response shape")
}

fn question_from(obj: &Map<String, Value>) -> Option<ModelResponse> {
    let question = lookup_field(obj, "question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())?
        .to_string();

    let options = lookup_field(obj, "options")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(scalar_text)
                .filter(|o| !o.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let multiple = lookup_field(obj, "multiple").is_some_and(|v| match v {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    });

    Some(ModelResponse::Question(QuestionPrompt {
        question,
        options,
        multiple,
    }))
}

fn summary_from(obj: &Map<String, Value>) -> Option<ModelResponse> {
    let summary_text = lookup_field(obj, "summaryText")
        .and_then(Value::as_str)?
        .trim()
        .to_string();

    let symptom = lookup_field(obj, "symptom")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    let answers = lookup_field(obj, "answers")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(|pair| {
                    let question = lookup_field(pair, "question").and_then(scalar_text)?;
                    let answer = lookup_field(pair, "answer")
                        .and_then(scalar_text)
                        .unwrap_or_default();
                    Some(SummaryAnswer { question, answer })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(ModelResponse::Summary(ConversationSummary {
        symptom,
        answers,
        summary_text,
    }))
}

fn error_from(obj: &Map<String, Value>) -> Option<ModelResponse> {
    let error_code = lookup_field(obj, "errorCode").and_then(scalar_text)?;
    let message = lookup_field(obj, "message")
        .and_then(scalar_text)
        .unwrap_or_default();
    Some(ModelResponse::Error(ResponseError {
        error_code,
        message,
    }))
}
