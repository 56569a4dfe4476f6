//! JSON decoding and schema validation of the model's answer.
//!
//! Validation is all-or-nothing: the first missing or mistyped field aborts with
//! a [`AnalysisError::Validation`] naming its dotted path. Unknown fields are
//! ignored.

use serde_json::{Map, Value};

use crate::error::AnalysisError;
use crate::models::{ConfidenceScore, Feedback, StarAnalysis};

/// Range the prompt asks the model to score on.
pub const SCORE_RANGE: (f64, f64) = (0.0, 10.0);

/// What to do with scores outside [`SCORE_RANGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorePolicy {
    /// Accept the value and log a warning.
    #[default]
    PassThrough,
    /// Reject the payload.
    Enforce,
}

impl ScorePolicy {
    pub fn from_flag(enforce: bool) -> Self {
        if enforce {
            ScorePolicy::Enforce
        } else {
            ScorePolicy::PassThrough
        }
    }
}

/// Parse sanitized model output into validated [`Feedback`].
pub fn decode_feedback(text: &str, policy: ScorePolicy) -> Result<Feedback, AnalysisError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        tracing::error!(error = %e, raw = %text, "AI did not return valid JSON");
        AnalysisError::Decode {
            message: e.to_string(),
            raw: text.to_string(),
        }
    })?;

    let root = value
        .as_object()
        .ok_or_else(|| AnalysisError::validation("$", format!("expected object, got {}", type_name(&value))))?;

    let star = object(root, "starAnalysis")?;
    let confidence = object(root, "confidenceScore")?;

    let feedback = Feedback {
        transcription: string(root, "transcription", "transcription")?,
        critique: string(root, "critique", "critique")?,
        star_analysis: StarAnalysis {
            situation: string(star, "situation", "starAnalysis.situation")?,
            task: string(star, "task", "starAnalysis.task")?,
            action: string(star, "action", "starAnalysis.action")?,
            result: string(star, "result", "starAnalysis.result")?,
        },
        confidence_score: ConfidenceScore {
            score: number(confidence, "score", "confidenceScore.score")?,
            hesitation_words: count(confidence, "hesitationWords", "confidenceScore.hesitationWords")?,
            hesitation_details: string_list(
                confidence,
                "hesitationDetails",
                "confidenceScore.hesitationDetails",
            )?,
            clarity: number(confidence, "clarity", "confidenceScore.clarity")?,
        },
        strengths: string_list(root, "strengths", "strengths")?,
        improvements: string_list(root, "improvements", "improvements")?,
        overall_rating: number(root, "overallRating", "overallRating")?,
    };

    check_range("confidenceScore.score", feedback.confidence_score.score, policy)?;
    check_range("confidenceScore.clarity", feedback.confidence_score.clarity, policy)?;
    check_range("overallRating", feedback.overall_rating, policy)?;

    Ok(feedback)
}

fn field<'a>(obj: &'a Map<String, Value>, key: &str, path: &str) -> Result<&'a Value, AnalysisError> {
    match obj.get(key) {
        Some(Value::Null) | None => Err(AnalysisError::validation(path, "missing required field")),
        Some(v) => Ok(v),
    }
}

fn object<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a Map<String, Value>, AnalysisError> {
    let v = field(obj, key, key)?;
    v.as_object()
        .ok_or_else(|| AnalysisError::validation(key, format!("expected object, got {}", type_name(v))))
}

fn string(obj: &Map<String, Value>, key: &str, path: &str) -> Result<String, AnalysisError> {
    let v = field(obj, key, path)?;
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| AnalysisError::validation(path, format!("expected string, got {}", type_name(v))))
}

fn number(obj: &Map<String, Value>, key: &str, path: &str) -> Result<f64, AnalysisError> {
    let v = field(obj, key, path)?;
    v.as_f64()
        .ok_or_else(|| AnalysisError::validation(path, format!("expected number, got {}", type_name(v))))
}

/// Non-negative integer. `3.0` is accepted, `2.5` is not.
fn count(obj: &Map<String, Value>, key: &str, path: &str) -> Result<u32, AnalysisError> {
    let v = field(obj, key, path)?;
    if let Some(n) = v.as_u64() {
        return u32::try_from(n).map_err(|_| AnalysisError::validation(path, "count out of range"));
    }
    match v.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        Some(_) => Err(AnalysisError::validation(path, "expected non-negative integer")),
        None => Err(AnalysisError::validation(
            path,
            format!("expected integer, got {}", type_name(v)),
        )),
    }
}

fn string_list(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Vec<String>, AnalysisError> {
    let v = field(obj, key, path)?;
    let items = v
        .as_array()
        .ok_or_else(|| AnalysisError::validation(path, format!("expected array, got {}", type_name(v))))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_str().map(str::to_string).ok_or_else(|| {
                AnalysisError::validation(
                    format!("{path}[{i}]"),
                    format!("expected string, got {}", type_name(item)),
                )
            })
        })
        .collect()
}

fn check_range(path: &str, value: f64, policy: ScorePolicy) -> Result<(), AnalysisError> {
    let (lo, hi) = SCORE_RANGE;
    if (lo..=hi).contains(&value) {
        return Ok(());
    }
    match policy {
        ScorePolicy::PassThrough => {
            tracing::warn!(field = path, value, "Score outside 0-10, keeping as returned");
            Ok(())
        }
        ScorePolicy::Enforce => Err(AnalysisError::validation(
            path,
            format!("{value} is outside {lo}-{hi}"),
        )),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "transcription": "Um, so I had a conflict with a teammate",
            "critique": "Solid answer, trim the filler words.",
            "starAnalysis": {
                "situation": "Teammate disagreed on design",
                "task": "Agree before sprint end",
                "action": "Set up a pairing session",
                "result": "Merged a joint proposal"
            },
            "confidenceScore": {
                "score": 7.5,
                "hesitationWords": 3,
                "hesitationDetails": ["um", "like", "uh"],
                "clarity": 8
            },
            "strengths": ["Concrete example", "Clear result"],
            "improvements": ["Fewer fillers"],
            "overallRating": 7.8,
            "extraField": "ignored"
        })
    }

    fn remove(value: &mut Value, path: &str) {
        let mut parts: Vec<&str> = path.split('.').collect();
        let last = parts.pop().unwrap();
        let mut cursor = value;
        for p in parts {
            cursor = cursor.get_mut(p).unwrap();
        }
        cursor.as_object_mut().unwrap().remove(last);
    }

    #[test]
    fn decodes_a_complete_payload() {
        let feedback = decode_feedback(&valid().to_string(), ScorePolicy::PassThrough).unwrap();
        assert_eq!(feedback.star_analysis.action, "Set up a pairing session");
        assert_eq!(feedback.confidence_score.hesitation_words, 3);
        assert_eq!(feedback.confidence_score.clarity, 8.0);
        assert_eq!(feedback.strengths, ["Concrete example", "Clear result"]);
        assert_eq!(feedback.overall_rating, 7.8);
    }

    #[test]
    fn invalid_json_is_a_decode_error_with_raw_text() {
        let raw = "Sorry, I cannot help with that.";
        match decode_feedback(raw, ScorePolicy::PassThrough) {
            Err(AnalysisError::Decode { raw: got, message }) => {
                assert_eq!(got, raw);
                assert!(!message.is_empty());
            }
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn every_required_field_is_enforced() {
        let required = [
            "transcription",
            "critique",
            "starAnalysis.situation",
            "starAnalysis.task",
            "starAnalysis.action",
            "starAnalysis.result",
            "confidenceScore.score",
            "confidenceScore.hesitationWords",
            "confidenceScore.hesitationDetails",
            "confidenceScore.clarity",
            "strengths",
            "improvements",
            "overallRating",
        ];
        for path in required {
            let mut payload = valid();
            remove(&mut payload, path);
            match decode_feedback(&payload.to_string(), ScorePolicy::PassThrough) {
                Err(AnalysisError::Validation { field, .. }) => assert_eq!(field, path),
                other => panic!("removing {path} should fail validation, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_nested_object_names_the_object() {
        let mut payload = valid();
        remove(&mut payload, "starAnalysis");
        let err = decode_feedback(&payload.to_string(), ScorePolicy::PassThrough).unwrap_err();
        assert!(matches!(err, AnalysisError::Validation { ref field, .. } if field == "starAnalysis"));
    }

    #[test]
    fn null_counts_as_missing() {
        let mut payload = valid();
        payload["critique"] = Value::Null;
        let err = decode_feedback(&payload.to_string(), ScorePolicy::PassThrough).unwrap_err();
        assert_eq!(
            err.to_string(),
            "AI response failed validation at `critique`: missing required field"
        );
    }

    #[test]
    fn mistyped_fields_are_rejected() {
        let cases = [
            ("transcription", json!(42), "transcription"),
            ("strengths", json!("just one"), "strengths"),
            ("improvements", json!(["ok", 3]), "improvements[1]"),
            ("overallRating", json!("8/10"), "overallRating"),
        ];
        for (key, bad, expected_path) in cases {
            let mut payload = valid();
            payload[key] = bad;
            match decode_feedback(&payload.to_string(), ScorePolicy::PassThrough) {
                Err(AnalysisError::Validation { field, .. }) => assert_eq!(field, expected_path),
                other => panic!("{key}: expected Validation, got {other:?}"),
            }
        }
    }

    #[test]
    fn hesitation_words_must_be_a_whole_count() {
        let mut payload = valid();
        payload["confidenceScore"]["hesitationWords"] = json!(4.0);
        let ok = decode_feedback(&payload.to_string(), ScorePolicy::PassThrough).unwrap();
        assert_eq!(ok.confidence_score.hesitation_words, 4);

        payload["confidenceScore"]["hesitationWords"] = json!(2.5);
        assert!(decode_feedback(&payload.to_string(), ScorePolicy::PassThrough).is_err());

        payload["confidenceScore"]["hesitationWords"] = json!(-1);
        assert!(decode_feedback(&payload.to_string(), ScorePolicy::PassThrough).is_err());
    }

    #[test]
    fn top_level_array_is_rejected() {
        let err = decode_feedback("[1, 2]", ScorePolicy::PassThrough).unwrap_err();
        assert!(matches!(err, AnalysisError::Validation { ref field, .. } if field == "$"));
    }

    #[test]
    fn out_of_range_scores_pass_through_by_default() {
        let mut payload = valid();
        payload["confidenceScore"]["score"] = json!(85);
        let feedback = decode_feedback(&payload.to_string(), ScorePolicy::PassThrough).unwrap();
        assert_eq!(feedback.confidence_score.score, 85.0);
    }

    #[test]
    fn out_of_range_scores_rejected_when_enforced() {
        let mut payload = valid();
        payload["confidenceScore"]["clarity"] = json!(11);
        let err = decode_feedback(&payload.to_string(), ScorePolicy::Enforce).unwrap_err();
        assert!(matches!(err, AnalysisError::Validation { ref field, .. } if field == "confidenceScore.clarity"));

        assert!(decode_feedback(&valid().to_string(), ScorePolicy::Enforce).is_ok());
    }
}
