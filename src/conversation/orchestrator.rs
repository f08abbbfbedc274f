//! The conversation control loop.
//!
//! Ties the ledger, the phase machine and a `ReasoningBackend` together.
//! Every public operation resolves to a tagged result; backend failures never
//! cross this boundary as errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::ledger::ConversationLedger;
use super::phase::{ConversationPhase, ConversationState, PhaseMachine, SESSION_CAP};
use super::request::{build_diagnosis_request, build_turn_request};
use crate::diagnosis::ranking::RankingFilter;
use crate::reasoning::types::{
    ConversationSummary, DiagnosisCondition, ModelResponse, PatientVitals, QuestionPrompt,
    ReasoningBackend, SummaryAnswer,
};
use crate::reasoning::ReasoningError;

/// Consecutive duplicate questions tolerated before giving up on a turn.
pub const MAX_DUPLICATE_RETRIES: u32 = 3;

pub const RATE_LIMITED: &str = "rate_limited";
pub const TRANSPORT: &str = "transport";
pub const DUPLICATE_QUESTION: &str = "duplicate_question";
pub const INVALID_COUNT: &str = "invalid_count";
pub const INVALID_PHASE: &str = "invalid_phase";
pub const NO_ACTIVE_QUESTION: &str = "no_active_question";
pub const QUESTION_PENDING: &str = "question_pending";
pub const NO_CONDITIONS: &str = "no_conditions";

/// Shared "a backend call is in flight" signal.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlag(Arc<AtomicBool>);

impl LoadingFlag {
    pub fn is_loading(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, loading: bool) {
        self.0.store(loading, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnFailure {
    pub code: String,
    pub message: String,
}

impl TurnFailure {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// What the caller should show next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TurnAction {
    ShowQuestion(QuestionPrompt),
    ShowSummary(ConversationSummary),
    ShowMorePrompt,
    ShowCountPrompt,
    Error(TurnFailure),
}

impl TurnAction {
    fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error(TurnFailure::new(code, message))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum DiagnosisOutcome {
    Ranked { conditions: Vec<DiagnosisCondition> },
    Error(TurnFailure),
}

/// Drives one conversation. Not re-entrant: operations on one instance must
/// not run concurrently, which `&mut self` enforces.
pub struct ConversationOrchestrator<B: ReasoningBackend> {
    backend: B,
    ledger: ConversationLedger,
    machine: PhaseMachine,
    current_question: Option<QuestionPrompt>,
    /// Questions the patient skipped, as opposed to duplicates skipped by us.
    user_skips: usize,
    conversation_id: Uuid,
    loading: LoadingFlag,
    ranking: RankingFilter,
}

impl<B: ReasoningBackend> ConversationOrchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            ledger: ConversationLedger::new(),
            machine: PhaseMachine::new(),
            current_question: None,
            user_skips: 0,
            conversation_id: Uuid::new_v4(),
            loading: LoadingFlag::default(),
            ranking: RankingFilter::default(),
        }
    }

    pub fn with_ranking(mut self, ranking: RankingFilter) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> &ConversationState {
        self.machine.state()
    }

    pub fn ledger(&self) -> &ConversationLedger {
        &self.ledger
    }

    pub fn current_question(&self) -> Option<&QuestionPrompt> {
        self.current_question.as_ref()
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn loading_flag(&self) -> LoadingFlag {
        self.loading.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    pub fn start_conversation(&mut self, symptom: &str) {
        self.ledger.reset();
        self.machine.start_conversation(symptom.trim());
        self.current_question = None;
        self.user_skips = 0;
        self.conversation_id = Uuid::new_v4();
        tracing::info!(conversation_id = %self.conversation_id, "Conversation started");
    }

    /// Fetch a question when none is pending: the opening question, or a
    /// retry after a fetch that ended in an error result.
    pub fn get_first_question(&mut self) -> TurnAction {
        if !self.machine.phase().accepts_answers() {
            return self.invalid_phase("get_first_question");
        }
        if self.current_question.is_some() {
            return TurnAction::error(
                QUESTION_PENDING,
                "Answer or skip the current question first",
            );
        }
        self.fetch_next_question()
    }

    pub fn submit_answer(&mut self, answer: &str) -> TurnAction {
        let question = match self.take_current_question("submit_answer") {
            Ok(question) => question,
            Err(action) => return action,
        };
        self.ledger.record_answer(&question.question, answer);
        self.after_interaction()
    }

    pub fn skip_question(&mut self) -> TurnAction {
        let question = match self.take_current_question("skip_question") {
            Ok(question) => question,
            Err(action) => return action,
        };
        self.ledger.record_skipped_question(&question.question);
        self.user_skips += 1;
        self.after_interaction()
    }

    pub fn respond_to_more_questions_prompt(&mut self, want_more: bool) -> TurnAction {
        if self.machine.phase() != ConversationPhase::MoreQuestionsPrompt {
            return self.invalid_phase("respond_to_more_questions_prompt");
        }
        if want_more {
            self.machine.ask_for_question_count();
            TurnAction::ShowCountPrompt
        } else {
            self.request_summary()
        }
    }

    pub fn respond_to_count_prompt(&mut self, count: i64) -> TurnAction {
        if self.machine.phase() != ConversationPhase::MoreQuestionsCount {
            return self.invalid_phase("respond_to_count_prompt");
        }
        if !self.machine.request_more_questions(count) {
            return TurnAction::error(INVALID_COUNT, "Please enter a number between 1 and 10");
        }
        tracing::info!(
            conversation_id = %self.conversation_id,
            granted = self.machine.state().remaining_additional_questions,
            "Additional questions granted"
        );
        self.fetch_next_question()
    }

    /// Differential diagnosis for a completed conversation, thresholded and
    /// sorted by the ranking filter.
    pub fn request_diagnosis(&self, vitals: &PatientVitals) -> DiagnosisOutcome {
        if self.machine.phase() != ConversationPhase::Complete {
            return DiagnosisOutcome::Error(TurnFailure::new(
                INVALID_PHASE,
                "A diagnosis is only available once the conversation is complete",
            ));
        }

        let request = build_diagnosis_request(&self.ledger, self.machine.state(), vitals);
        match self.call_backend(|backend| backend.diagnose_symptoms(&request)) {
            Ok(conditions) => {
                let received = conditions.len();
                let conditions = self.ranking.apply(conditions);
                tracing::info!(
                    conversation_id = %self.conversation_id,
                    received,
                    kept = conditions.len(),
                    "Diagnosis ranked"
                );
                DiagnosisOutcome::Ranked { conditions }
            }
            Err(ReasoningError::NoConditions(attempts)) => {
                tracing::warn!(conversation_id = %self.conversation_id, attempts, "No usable diagnosis");
                DiagnosisOutcome::Error(TurnFailure::new(
                    NO_CONDITIONS,
                    "No diagnosis could be produced. Please try again.",
                ))
            }
            Err(e) => DiagnosisOutcome::Error(self.failure_from_error(e)),
        }
    }

    /// Abandon the conversation. A result still in flight is discarded by
    /// the caller, since nothing here can be interrupted.
    pub fn reset(&mut self) {
        self.ledger.reset();
        self.machine.reset();
        self.current_question = None;
        self.user_skips = 0;
        self.loading.set(false);
        tracing::info!(conversation_id = %self.conversation_id, "Conversation reset");
    }

    // ──────────────────────────────────────────────
    // Turn internals
    // ──────────────────────────────────────────────

    fn take_current_question(&mut self, operation: &str) -> Result<QuestionPrompt, TurnAction> {
        if !self.machine.phase().accepts_answers() {
            return Err(self.invalid_phase(operation));
        }
        self.current_question.take().ok_or_else(|| {
            TurnAction::error(NO_ACTIVE_QUESTION, "There is no question to respond to")
        })
    }

    /// Count the interaction just recorded and decide the next step.
    fn after_interaction(&mut self) -> TurnAction {
        let base_exhausted = self.machine.increment_question_count();
        let remaining = self.machine.state().remaining_additional_questions;
        let total = self.machine.state().total_questions_asked;

        match self.machine.phase() {
            ConversationPhase::AskingQuestions if base_exhausted => {
                self.machine.ask_for_more_questions();
                TurnAction::ShowMorePrompt
            }
            ConversationPhase::AskingAdditional if remaining == 0 => self.request_summary(),
            _ if total >= SESSION_CAP => self.request_summary(),
            _ => self.fetch_next_question(),
        }
    }

    /// Fetch a question the ledger has not seen. Duplicates are recorded as
    /// skipped and refetched, at most `MAX_DUPLICATE_RETRIES` times.
    fn fetch_next_question(&mut self) -> TurnAction {
        let mut depth = 0;

        loop {
            let request = build_turn_request(&self.ledger, self.machine.state(), false);
            let response = match self.call_backend(|backend| backend.interactive_response(&request)) {
                Ok(response) => response,
                Err(e) => return TurnAction::Error(self.failure_from_error(e)),
            };

            match response {
                ModelResponse::Question(question) => {
                    if self.ledger.has_been_asked(&question.question) {
                        self.ledger.record_skipped_question(&question.question);
                        depth += 1;
                        tracing::debug!(
                            conversation_id = %self.conversation_id,
                            depth,
                            "Backend repeated a question"
                        );
                        if depth > MAX_DUPLICATE_RETRIES {
                            tracing::warn!(
                                conversation_id = %self.conversation_id,
                                depth,
                                "Giving up after repeated duplicate questions"
                            );
                            return TurnAction::error(
                                DUPLICATE_QUESTION,
                                "Unable to fetch a new question. Please try again.",
                            );
                        }
                        continue;
                    }

                    self.ledger.record_asked_question(&question.question);
                    self.current_question = Some(question.clone());
                    return TurnAction::ShowQuestion(question);
                }
                ModelResponse::Summary(summary) => {
                    self.machine.complete_conversation();
                    self.current_question = None;
                    return TurnAction::ShowSummary(summary);
                }
                ModelResponse::Error(error) => {
                    tracing::warn!(
                        conversation_id = %self.conversation_id,
                        code = %error.error_code,
                        "Backend returned an error variant"
                    );
                    let message = if error.message.trim().is_empty() {
                        format!("The assistant could not continue ({})", error.error_code)
                    } else {
                        error.message
                    };
                    return TurnAction::error(&error.error_code, message);
                }
            }
        }
    }

    /// Complete the conversation and produce a summary. Always yields
    /// `ShowSummary`: anything but a summary variant falls back to one
    /// assembled from the ledger.
    fn request_summary(&mut self) -> TurnAction {
        self.machine.complete_conversation();
        self.current_question = None;

        let request = build_turn_request(&self.ledger, self.machine.state(), true);
        match self.call_backend(|backend| backend.interactive_response(&request)) {
            Ok(ModelResponse::Summary(summary)) => TurnAction::ShowSummary(summary),
            Ok(other) => {
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    kind = other.kind(),
                    "Summary request returned another variant, using ledger summary"
                );
                TurnAction::ShowSummary(self.fallback_summary())
            }
            Err(e) => {
                tracing::warn!(
                    conversation_id = %self.conversation_id,
                    error = %e,
                    "Summary request failed, using ledger summary"
                );
                TurnAction::ShowSummary(self.fallback_summary())
            }
        }
    }

    fn fallback_summary(&self) -> ConversationSummary {
        let symptom = self.machine.state().initial_symptom.clone();
        let answers: Vec<SummaryAnswer> = self
            .ledger
            .answers()
            .into_iter()
            .map(|record| SummaryAnswer {
                question: record.question,
                answer: record.answer,
            })
            .collect();

        let mut summary_text = format!("Presenting symptom: {}.", symptom);
        for answer in &answers {
            summary_text.push_str(&format!("\n- {} {}", answer.question, answer.answer));
        }
        if self.user_skips > 0 {
            summary_text.push_str(&format!("\n{} question(s) were skipped.", self.user_skips));
        }

        ConversationSummary {
            symptom,
            answers,
            summary_text,
        }
    }

    fn call_backend<T>(
        &self,
        call: impl FnOnce(&B) -> Result<T, ReasoningError>,
    ) -> Result<T, ReasoningError> {
        self.loading.set(true);
        let result = call(&self.backend);
        self.loading.set(false);
        result
    }

    fn failure_from_error(&self, e: ReasoningError) -> TurnFailure {
        tracing::warn!(conversation_id = %self.conversation_id, error = %e, "Backend call failed");
        match e {
            ReasoningError::RateLimited { retry_after } => TurnFailure::new(
                RATE_LIMITED,
                match retry_after {
                    Some(secs) => format!(
                        "The assistant is busy. Please wait {} seconds and try again.",
                        secs
                    ),
                    None => "The assistant is busy. Please wait a moment and try again.".to_string(),
                },
            ),
            _ => TurnFailure::new(
                TRANSPORT,
                "Could not reach the assistant. Please try again.",
            ),
        }
    }

    fn invalid_phase(&self, operation: &str) -> TurnAction {
        tracing::debug!(operation, phase = self.machine.phase().as_str(), "Operation not valid in phase");
        TurnAction::error(
            INVALID_PHASE,
            format!(
                "Cannot {} while the conversation is in phase {}",
                operation.replace('_', " "),
                self.machine.phase().as_str()
            ),
        )
    }
}
