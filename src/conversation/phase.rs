//! Conversation phase state machine and question budgets.
//!
//! `initial → asking-questions → more-questions-prompt → more-questions-count
//! → asking-additional → complete`. Every transition replaces the
//! `ConversationState` wholesale; nothing outside this module mutates it.

use serde::{Deserialize, Serialize};

/// Base follow-up interactions before the first "more questions?" prompt.
pub const INITIAL_LIMIT: u32 = 5;

/// Hard ceiling on interactions for the whole session.
pub const SESSION_CAP: u32 = 15;

/// Largest additional-question count a patient may request at once.
pub const MAX_ADDITIONAL_REQUEST: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationPhase {
    #[default]
    Initial,
    AskingQuestions,
    MoreQuestionsPrompt,
    MoreQuestionsCount,
    AskingAdditional,
    Complete,
}

impl ConversationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::AskingQuestions => "asking-questions",
            Self::MoreQuestionsPrompt => "more-questions-prompt",
            Self::MoreQuestionsCount => "more-questions-count",
            Self::AskingAdditional => "asking-additional",
            Self::Complete => "complete",
        }
    }

    /// Phases in which a question may be on screen and answered.
    pub fn accepts_answers(&self) -> bool {
        matches!(self, Self::AskingQuestions | Self::AskingAdditional)
    }
}

/// Snapshot of the conversation's phase and budget counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub phase: ConversationPhase,
    pub initial_symptom: String,
    pub total_questions_asked: u32,
    pub remaining_additional_questions: u32,
    pub additional_questions_requested: u32,
    pub conversation_complete: bool,
}

/// Owns the `ConversationState` and enforces legal transitions.
#[derive(Debug, Clone, Default)]
pub struct PhaseMachine {
    state: ConversationState,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn phase(&self) -> ConversationPhase {
        self.state.phase
    }

    pub fn start_conversation(&mut self, symptom: &str) {
        self.state = ConversationState {
            phase: ConversationPhase::AskingQuestions,
            initial_symptom: symptom.to_string(),
            ..ConversationState::default()
        };
    }

    /// Count one interaction (answer or skip).
    ///
    /// Returns true exactly when the base budget was just exhausted: the total
    /// reached `INITIAL_LIMIT` and no additional-question budget was in effect.
    pub fn increment_question_count(&mut self) -> bool {
        let previous = self.state.clone();
        let no_additional_budget = previous.additional_questions_requested == 0;

        let total_questions_asked = (previous.total_questions_asked + 1).min(SESSION_CAP);
        let remaining_additional_questions = if previous.phase
            == ConversationPhase::AskingAdditional
            && previous.remaining_additional_questions > 0
        {
            previous.remaining_additional_questions - 1
        } else {
            previous.remaining_additional_questions
        };

        self.state = ConversationState {
            total_questions_asked,
            remaining_additional_questions,
            ..previous
        };

        total_questions_asked == INITIAL_LIMIT && no_additional_budget
    }

    pub fn ask_for_more_questions(&mut self) {
        self.transition(ConversationPhase::MoreQuestionsPrompt);
    }

    pub fn ask_for_question_count(&mut self) {
        self.transition(ConversationPhase::MoreQuestionsCount);
    }

    /// Grant an additional-question budget. Rejects counts outside `1..=10`
    /// without touching the state.
    pub fn request_more_questions(&mut self, count: i64) -> bool {
        if !(1..=MAX_ADDITIONAL_REQUEST).contains(&count) {
            return false;
        }
        let remaining_capacity = SESSION_CAP - INITIAL_LIMIT;
        // count is within 1..=10 here
        let granted = (count as u32).min(remaining_capacity);

        self.state = ConversationState {
            phase: ConversationPhase::AskingAdditional,
            additional_questions_requested: granted,
            remaining_additional_questions: granted,
            ..self.state.clone()
        };
        true
    }

    pub fn complete_conversation(&mut self) {
        self.state = ConversationState {
            phase: ConversationPhase::Complete,
            conversation_complete: true,
            ..self.state.clone()
        };
    }

    pub fn reset(&mut self) {
        self.state = ConversationState::default();
    }

    fn transition(&mut self, phase: ConversationPhase) {
        tracing::debug!(from = self.state.phase.as_str(), to = phase.as_str(), "Phase transition");
        self.state = ConversationState {
            phase,
            ..self.state.clone()
        };
    }
}
