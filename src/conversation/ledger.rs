use crate::reasoning::types::AnswerRecord;

/// Record of every question asked, skipped, or answered in one conversation.
///
/// The ledger is the only source of truth for duplicate detection.
/// Membership is an exact, case-sensitive match on the question text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLedger {
    asked: Vec<String>,
    skipped: Vec<String>,
    answers: Vec<AnswerRecord>,
}

impl ConversationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a question as asked. Recording the same text twice is a no-op.
    pub fn record_asked_question(&mut self, question: &str) {
        if !self.asked.iter().any(|q| q == question) {
            self.asked.push(question.to_string());
        }
    }

    /// Record a question as skipped. Stored at most once.
    pub fn record_skipped_question(&mut self, question: &str) {
        if !self.skipped.iter().any(|q| q == question) {
            self.skipped.push(question.to_string());
        }
    }

    /// Append an answer. Answers keep submission order.
    pub fn record_answer(&mut self, question: &str, answer: &str) {
        self.answers.push(AnswerRecord {
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }

    /// True if the question was ever asked or skipped.
    pub fn has_been_asked(&self, question: &str) -> bool {
        self.asked.iter().any(|q| q == question) || self.skipped.iter().any(|q| q == question)
    }

    pub fn asked_questions(&self) -> Vec<String> {
        self.asked.clone()
    }

    pub fn skipped_questions(&self) -> Vec<String> {
        self.skipped.clone()
    }

    pub fn answers(&self) -> Vec<AnswerRecord> {
        self.answers.clone()
    }

    /// Answers plus skips.
    pub fn total_interactions(&self) -> usize {
        self.answers.len() + self.skipped.len()
    }

    pub fn reset(&mut self) {
        self.asked.clear();
        self.skipped.clear();
        self.answers.clear();
    }
}
