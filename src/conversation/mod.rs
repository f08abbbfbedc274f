pub mod ledger;
pub mod phase;
pub mod request;
pub mod orchestrator;

pub use ledger::ConversationLedger;
pub use orchestrator::{
    ConversationOrchestrator, DiagnosisOutcome, LoadingFlag, TurnAction, TurnFailure,
};
pub use phase::{ConversationPhase, ConversationState, PhaseMachine};
pub use request::{build_diagnosis_request, build_turn_request};
