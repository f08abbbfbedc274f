use std::time::Duration;

use serde_json::Value;

use super::classify::classify_response;
use super::prompt::{
    build_diagnosis_prompt, build_turn_prompt, DIAGNOSIS_SYSTEM_PROMPT, INTERACTIVE_SYSTEM_PROMPT,
};
use super::recovery::recover_json;
use super::types::{
    DiagnosisCondition, DiagnosisRequest, LlmClient, ModelResponse, ReasoningBackend, TurnRequest,
    EMPTY_RESPONSE, INVALID_JSON, UNEXPECTED_JSON,
};
use super::ReasoningError;
use crate::config::DEFAULT_RETRY_BACKOFF_MS;
use crate::diagnosis::ranking::normalize_conditions;

/// Total attempts per gateway call (first try included).
pub const MAX_ATTEMPTS: usize = 3;

/// Why one attempt produced nothing usable. All of these are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptFailure {
    EmptyContent,
    InvalidJson,
    EmptyArray,
    NoConditions,
}

impl AttemptFailure {
    fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyContent => "empty content",
            Self::InvalidJson => "unparseable JSON",
            Self::EmptyArray => "empty array",
            Self::NoConditions => "no usable conditions",
        }
    }
}

/// Mediates every call to the text-generation backend:
/// prompt → LLM (bounded retries) → JSON recovery → typed result.
///
/// Holds no conversation state. Each request carries its full history.
pub struct ReasoningGateway {
    client: Box<dyn LlmClient + Send + Sync>,
    retry_backoff: Duration,
}

impl ReasoningGateway {
    pub fn new(client: Box<dyn LlmClient + Send + Sync>) -> Self {
        Self {
            client,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    /// Base delay of the linear, attempt-scaled backoff between retries.
    pub fn with_retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    fn backoff(&self, attempt: usize) {
        let delay = self.retry_backoff * attempt as u32;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    /// Run the bounded retry loop.
    ///
    /// `Ok(Ok(_))` on success, `Ok(Err(failure))` when every attempt produced
    /// unusable content, `Err(_)` for rate limits (immediately) and for
    /// transport errors that persist through the last attempt.
    fn call_with_retry<T>(
        &self,
        operation: &'static str,
        system: &str,
        prompt: &str,
        interpret: impl Fn(&str) -> Result<T, AttemptFailure>,
    ) -> Result<Result<T, AttemptFailure>, ReasoningError> {
        let mut last_failure = AttemptFailure::EmptyContent;

        for attempt in 1..=MAX_ATTEMPTS {
            let content = match self.client.complete(system, prompt) {
                Ok(content) => content,
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) if e.is_retryable() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(operation, attempt, error = %e, "LLM call failed, retrying");
                    self.backoff(attempt);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(operation, attempt, error = %e, "LLM call failed");
                    return Err(e);
                }
            };

            match interpret(&content) {
                Ok(result) => return Ok(Ok(result)),
                Err(failure) => {
                    tracing::warn!(
                        operation,
                        attempt,
                        content_len = content.len(),
                        failure = failure.as_str(),
                        "LLM response unusable"
                    );
                    last_failure = failure;
                    if attempt < MAX_ATTEMPTS {
                        self.backoff(attempt);
                    }
                }
            }
        }

        Ok(Err(last_failure))
    }
}

/// Turn one raw completion into a response variant, or say why it could not.
fn interpret_turn(content: &str) -> Result<ModelResponse, AttemptFailure> {
    if content.trim().is_empty() {
        return Err(AttemptFailure::EmptyContent);
    }
    let value = recover_json(content).ok_or(AttemptFailure::InvalidJson)?;

    let root = match value {
        Value::Array(items) => items.into_iter().next().ok_or(AttemptFailure::EmptyArray)?,
        other => other,
    };
    if !root.is_object() {
        return Ok(ModelResponse::error(
            UNEXPECTED_JSON,
            "Model output is not a JSON object",
        ));
    }
    Ok(classify_response(&root))
}

fn interpret_diagnosis(content: &str) -> Result<Vec<DiagnosisCondition>, AttemptFailure> {
    if content.trim().is_empty() {
        return Err(AttemptFailure::EmptyContent);
    }
    let value = recover_json(content).ok_or(AttemptFailure::InvalidJson)?;
    let conditions = normalize_conditions(&value);
    if conditions.is_empty() {
        return Err(AttemptFailure::NoConditions);
    }
    Ok(conditions)
}

impl ReasoningBackend for ReasoningGateway {
    fn interactive_response(&self, request: &TurnRequest) -> Result<ModelResponse, ReasoningError> {
        let prompt = build_turn_prompt(request);
        tracing::debug!(
            answers = request.answers.len(),
            skipped = request.skipped_questions.len(),
            summary_only = request.is_summary_only(),
            "Requesting interactive turn"
        );

        let outcome =
            self.call_with_retry("interactive", INTERACTIVE_SYSTEM_PROMPT, &prompt, interpret_turn)?;

        Ok(match outcome {
            Ok(response) => response,
            Err(AttemptFailure::EmptyContent) => ModelResponse::error(
                EMPTY_RESPONSE,
                "The model returned an empty response",
            ),
            Err(AttemptFailure::EmptyArray) => ModelResponse::error(
                UNEXPECTED_JSON,
                "The model returned an empty array",
            ),
            Err(AttemptFailure::InvalidJson) | Err(AttemptFailure::NoConditions) => {
                ModelResponse::error(INVALID_JSON, "The model returned invalid JSON")
            }
        })
    }

    fn diagnose_symptoms(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<Vec<DiagnosisCondition>, ReasoningError> {
        let prompt = build_diagnosis_prompt(request);
        tracing::debug!(answers = request.answers.len(), "Requesting differential diagnosis");

        match self.call_with_retry("diagnose", DIAGNOSIS_SYSTEM_PROMPT, &prompt, interpret_diagnosis)? {
            Ok(conditions) => {
                tracing::info!(count = conditions.len(), "Differential diagnosis received");
                Ok(conditions)
            }
            Err(_) => Err(ReasoningError::NoConditions(MAX_ATTEMPTS)),
        }
    }
}
