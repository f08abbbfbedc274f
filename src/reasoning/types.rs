use serde::{Deserialize, Serialize};

use super::ReasoningError;

/// Error codes the gateway produces when it cannot obtain a usable variant.
pub const EMPTY_RESPONSE: &str = "empty_response";
pub const INVALID_JSON: &str = "invalid_json";
pub const UNEXPECTED_JSON: &str = "unexpected_json";
pub const UNKNOWN_SHAPE: &str = "unknown_shape";

/// One answered question, replayed to the backend on every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Answer")]
    pub answer: String,
}

/// Interactive turn request. Carries the full conversation history so the
/// gateway holds no state between turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    #[serde(rename = "Symptom")]
    pub symptom: String,
    #[serde(rename = "Answers", default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(rename = "SkippedQuestions", default)]
    pub skipped_questions: Vec<String>,
    #[serde(rename = "summaryOnly", default, skip_serializing_if = "Option::is_none")]
    pub summary_only: Option<bool>,
    #[serde(
        rename = "requestedAdditionalQuestions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_additional_questions: Option<u32>,
}

impl TurnRequest {
    pub fn is_summary_only(&self) -> bool {
        self.summary_only.unwrap_or(false)
    }

    /// Questions the backend must not ask again: answered ∪ skipped.
    pub fn forbidden_questions(&self) -> Vec<String> {
        let mut forbidden: Vec<String> = Vec::new();
        let candidates = self
            .answers
            .iter()
            .map(|a| &a.question)
            .chain(self.skipped_questions.iter());
        for question in candidates {
            if !forbidden.contains(question) {
                forbidden.push(question.clone());
            }
        }
        forbidden
    }
}

/// A follow-up question proposed by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPrompt {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub multiple: bool,
}

/// Question/answer pair as it appears inside a summary variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryAnswer {
    pub question: String,
    pub answer: String,
}

/// End-of-conversation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub symptom: String,
    #[serde(default)]
    pub answers: Vec<SummaryAnswer>,
    pub summary_text: String,
}

/// Error reported by the model, or synthesized by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseError {
    pub error_code: String,
    pub message: String,
}

/// The closed set of shapes one gateway call resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelResponse {
    Question(QuestionPrompt),
    Summary(ConversationSummary),
    Error(ResponseError),
}

impl ModelResponse {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error(ResponseError {
            error_code: code.to_string(),
            message: message.into(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Question(_) => "question",
            Self::Summary(_) => "summary",
            Self::Error(_) => "error",
        }
    }
}

/// Diagnosis request: conversation outcome plus basic vitals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    #[serde(rename = "Symptom")]
    pub symptom: String,
    #[serde(rename = "Answers", default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(rename = "Age", default)]
    pub age: Option<u32>,
    #[serde(rename = "Gender", default)]
    pub gender: Option<String>,
    #[serde(rename = "Temperature", default)]
    pub temperature: Option<f32>,
    #[serde(rename = "BloodPressure", default)]
    pub blood_pressure: Option<String>,
    #[serde(rename = "HeartRate", default)]
    pub heart_rate: Option<u32>,
}

/// Vitals the caller supplies when asking for a differential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientVitals {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub temperature: Option<f32>,
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<u32>,
}

/// One entry of the differential list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisCondition {
    pub label: String,
    pub score: f32,
    pub icd: String,
    pub details: String,
    pub physician: String,
    pub reasoning: String,
    pub is_emergency: bool,
}

impl DiagnosisCondition {
    /// True when mapping produced nothing usable.
    pub fn is_empty(&self) -> bool {
        self.label.trim().is_empty()
            && self.icd.trim().is_empty()
            && self.details.trim().is_empty()
            && self.physician.trim().is_empty()
            && self.reasoning.trim().is_empty()
            && self.score == 0.0
            && !self.is_emergency
    }
}

/// Chat-completion backend abstraction (allows mocking).
pub trait LlmClient {
    /// Send one system + user exchange and return the raw content text.
    /// An empty string means the envelope carried no content.
    fn complete(&self, system: &str, prompt: &str) -> Result<String, ReasoningError>;

    /// Model identifier, for logging and health reporting.
    fn model(&self) -> &str;
}

/// Seam between the conversation orchestrator and whatever answers its turns.
pub trait ReasoningBackend {
    fn interactive_response(&self, request: &TurnRequest) -> Result<ModelResponse, ReasoningError>;

    fn diagnose_symptoms(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<Vec<DiagnosisCondition>, ReasoningError>;
}

impl<T: ReasoningBackend + ?Sized> ReasoningBackend for std::sync::Arc<T> {
    fn interactive_response(&self, request: &TurnRequest) -> Result<ModelResponse, ReasoningError> {
        (**self).interactive_response(request)
    }

    fn diagnose_symptoms(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<Vec<DiagnosisCondition>, ReasoningError> {
        (**self).diagnose_symptoms(request)
    }
}
