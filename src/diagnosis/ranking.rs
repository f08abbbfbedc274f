use serde_json::Value;

use super::mapping::{map_condition, map_conditions};
use crate::config::DEFAULT_SCORE_THRESHOLD;
use crate::reasoning::classify::lookup_field;
use crate::reasoning::types::DiagnosisCondition;

/// Normalize differential output into conditions.
///
/// Accepts a bare array, an object with a `conditions` array, an object
/// whose first array-valued property holds the list, or a single condition
/// object. Unusable elements are dropped.
pub fn normalize_conditions(value: &Value) -> Vec<DiagnosisCondition> {
    match value {
        Value::Array(items) => map_conditions(items),
        Value::Object(obj) => {
            if let Some(items) = lookup_field(obj, "conditions").and_then(Value::as_array) {
                return map_conditions(items);
            }
            if let Some(items) = obj.values().find_map(Value::as_array) {
                return map_conditions(items);
            }
            map_condition(value).into_iter().collect()
        }
        _ => Vec::new(),
    }
}

/// Score threshold plus descending sort. Emergency ordering is left to the
/// model; this filter never reorders by `is_emergency`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingFilter {
    threshold: f32,
}

impl Default for RankingFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SCORE_THRESHOLD)
    }
}

impl RankingFilter {
    pub fn new(threshold: f32) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_SCORE_THRESHOLD
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Keep conditions with `score >= threshold`, highest score first.
    /// Ties keep their input order.
    pub fn apply(&self, conditions: Vec<DiagnosisCondition>) -> Vec<DiagnosisCondition> {
        let mut kept: Vec<DiagnosisCondition> = conditions
            .into_iter()
            .filter(|c| c.score >= self.threshold)
            .collect();
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        kept
    }

    /// Normalize raw output, then threshold and sort.
    pub fn rank_raw(&self, value: &Value) -> Vec<DiagnosisCondition> {
        self.apply(normalize_conditions(value))
    }
}
