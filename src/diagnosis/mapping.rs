//! Tolerant field-by-field mapping of model-produced condition objects.

use serde_json::{Map, Value};

use crate::reasoning::classify::{lookup_field, scalar_text};
use crate::reasoning::types::DiagnosisCondition;

// Key fallbacks, tried in order. Lookup is case-insensitive.
const LABEL_KEYS: &[&str] = &["label", "name", "condition", "diagnosis"];
const SCORE_KEYS: &[&str] = &["score", "probability", "confidence", "likelihood"];
const ICD_KEYS: &[&str] = &["icd", "icd10", "icdCode", "icd_code", "icd10Code"];
const DETAILS_KEYS: &[&str] = &["details", "description", "summary"];
const PHYSICIAN_KEYS: &[&str] = &["physician", "specialist", "specialty", "doctor"];
const REASONING_KEYS: &[&str] = &["reasoning", "rationale", "explanation"];
const EMERGENCY_KEYS: &[&str] = &["isEmergency", "is_emergency", "emergency", "urgent"];

/// Map one element. Non-objects and entirely empty records yield `None`.
pub fn map_condition(value: &Value) -> Option<DiagnosisCondition> {
    let obj = value.as_object()?;

    let condition = DiagnosisCondition {
        label: text_field(obj, LABEL_KEYS),
        score: first_field(obj, SCORE_KEYS).and_then(parse_score).unwrap_or(0.0),
        icd: text_field(obj, ICD_KEYS),
        details: text_field(obj, DETAILS_KEYS),
        physician: text_field(obj, PHYSICIAN_KEYS),
        reasoning: text_field(obj, REASONING_KEYS),
        is_emergency: first_field(obj, EMERGENCY_KEYS).is_some_and(parse_flag),
    };

    (!condition.is_empty()).then_some(condition)
}

/// Map every element, dropping the ones that carry nothing.
pub fn map_conditions<'a>(items: impl IntoIterator<Item = &'a Value>) -> Vec<DiagnosisCondition> {
    items.into_iter().filter_map(map_condition).collect()
}

/// Parse a score given as a number or a string, with or without `%`.
///
/// Percent-suffixed strings and bare values above 1 are read as
/// percentages. The result is clamped to `0..=1`.
pub fn parse_score(value: &Value) -> Option<f32> {
    let (raw, percent) = match value {
        Value::Number(n) => (n.as_f64()?, false),
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.strip_suffix('%') {
                Some(number) => (number.trim().parse::<f64>().ok()?, true),
                None => (trimmed.parse::<f64>().ok()?, false),
            }
        }
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    let fraction = if percent || raw > 1.0 { raw / 100.0 } else { raw };
    Some(fraction.clamp(0.0, 1.0) as f32)
}

/// Booleans, "true"/"yes"/"1" strings, and non-zero numbers count as set.
pub fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| lookup_field(obj, key))
        .find(|value| !value.is_null())
}

fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    first_field(obj, keys)
        .and_then(scalar_text)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_canonical_fields() {
        let condition = map_condition(&json!({
            "label": "Migraine",
            "score": 0.72,
            "icd": "G43",
            "details": "Recurrent headache",
            "physician": "Neurologist",
            "reasoning": "Unilateral throbbing pain",
            "isEmergency": false
        }))
        .unwrap();
        assert_eq!(condition.label, "Migraine");
        assert!((condition.score - 0.72).abs() < 1e-6);
        assert_eq!(condition.icd, "G43");
        assert_eq!(condition.physician, "Neurologist");
        assert!(!condition.is_emergency);
    }

    #[test]
    fn falls_back_across_key_names_and_case() {
        let condition = map_condition(&json!({
            "Name": "Myocardial infarction",
            "ICD": "I21",
            "Description": "Heart attack",
            "Specialist": "Cardiologist",
            "Emergency": "yes"
        }))
        .unwrap();
        assert_eq!(condition.label, "Myocardial infarction");
        assert_eq!(condition.icd, "I21");
        assert_eq!(condition.details, "Heart attack");
        assert_eq!(condition.physician, "Cardiologist");
        assert!(condition.is_emergency);
    }

    #[test]
    fn null_primary_key_falls_through() {
        let condition = map_condition(&json!({"label": null, "name": "Flu"})).unwrap();
        assert_eq!(condition.label, "Flu");
    }

    #[test]
    fn score_tolerates_strings_and_percentages() {
        assert_eq!(parse_score(&json!("85%")), Some(0.85));
        assert_eq!(parse_score(&json!(" 40 % ")), Some(0.4));
        assert_eq!(parse_score(&json!("0.25")), Some(0.25));
        assert_eq!(parse_score(&json!(60)), Some(0.6));
        assert_eq!(parse_score(&json!(0.5)), Some(0.5));
        assert_eq!(parse_score(&json!(250)), Some(1.0));
        assert_eq!(parse_score(&json!(-0.2)), Some(0.0));
        assert_eq!(parse_score(&json!("high")), None);
        assert_eq!(parse_score(&json!(null)), None);
    }

    #[test]
    fn flag_tolerates_strings_and_numbers() {
        assert!(parse_flag(&json!(true)));
        assert!(parse_flag(&json!("TRUE")));
        assert!(parse_flag(&json!(1)));
        assert!(!parse_flag(&json!("no")));
        assert!(!parse_flag(&json!(0)));
        assert!(!parse_flag(&json!(null)));
    }

    #[test]
    fn empty_records_are_dropped() {
        let items = json!([{}, {"unrelated": "x"}, {"label": "  "}, "text", {"label": "Flu"}]);
        let conditions = map_conditions(items.as_array().unwrap());
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].label, "Flu");
    }

    #[test]
    fn unparseable_score_defaults_to_zero() {
        let condition = map_condition(&json!({"label": "Flu", "score": "likely"})).unwrap();
        assert_eq!(condition.score, 0.0);
    }
}
