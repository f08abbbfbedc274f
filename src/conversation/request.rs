//! Immutable request snapshots. Every backend call replays the full history
//! taken from the ledger and phase state at call time.

use super::ledger::ConversationLedger;
use super::phase::{ConversationPhase, ConversationState};
use crate::reasoning::types::{DiagnosisRequest, PatientVitals, TurnRequest};

pub fn build_turn_request(
    ledger: &ConversationLedger,
    state: &ConversationState,
    summary_only: bool,
) -> TurnRequest {
    let requested_additional_questions = (!summary_only
        && state.phase == ConversationPhase::AskingAdditional)
        .then_some(state.remaining_additional_questions);

    TurnRequest {
        symptom: state.initial_symptom.clone(),
        answers: ledger.answers(),
        skipped_questions: ledger.skipped_questions(),
        summary_only: summary_only.then_some(true),
        requested_additional_questions,
    }
}

pub fn build_diagnosis_request(
    ledger: &ConversationLedger,
    state: &ConversationState,
    vitals: &PatientVitals,
) -> DiagnosisRequest {
    DiagnosisRequest {
        symptom: state.initial_symptom.clone(),
        answers: ledger.answers(),
        age: vitals.age,
        gender: vitals.gender.clone(),
        temperature: vitals.temperature,
        blood_pressure: vitals.blood_pressure.clone(),
        heart_rate: vitals.heart_rate,
    }
}
