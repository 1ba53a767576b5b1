//! Feedback extraction: raw model output → validated [`Feedback`].
//!
//! Models sometimes wrap JSON in ```` ```json ```` fences despite being told
//! not to. The outer fence is stripped before parsing; nothing else is
//! repaired. Anything that is not a complete, in-range feedback object is a
//! [`AnalysisError::MalformedFeedback`] and nothing partial is returned.

use crate::error::AnalysisError;
use crate::inference::InferenceResponse;
use crate::record::Feedback;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```\s*$").unwrap());

fn strip_json_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

/// Pull the answer string out of a response and parse it.
pub fn extract_feedback(response: &InferenceResponse) -> Result<Feedback, AnalysisError> {
    let text = response
        .content_text()
        .ok_or_else(|| AnalysisError::MalformedFeedback {
            detail: "response content list is empty".into(),
        })?;
    parse_feedback(text)
}

/// Parse model text as a [`Feedback`] object and validate its scores.
pub fn parse_feedback(text: &str) -> Result<Feedback, AnalysisError> {
    let json = strip_json_fences(text);
    let feedback: Feedback =
        serde_json::from_str(json).map_err(|e| AnalysisError::MalformedFeedback {
            detail: e.to_string(),
        })?;
    feedback
        .validate()
        .map_err(|detail| AnalysisError::MalformedFeedback { detail })?;
    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "overallScore": 74,
        "ATS": { "score": 80, "tips": [{ "type": "improve", "tip": "Add keywords" }] },
        "toneAndStyle": { "score": 70, "tips": [{ "type": "good", "tip": "Concise", "explanation": "Short bullets." }] },
        "content": { "score": 65, "tips": [] },
        "structure": { "score": 85, "tips": [] },
        "skills": { "score": 60, "tips": [] }
    }"#;

    #[test]
    fn parses_plain_json() {
        let f = parse_feedback(VALID).unwrap();
        assert_eq!(f.overall_score, 74);
        assert_eq!(f.ats.tips.len(), 1);
        assert_eq!(
            f.tone_and_style.tips[0].explanation.as_deref(),
            Some("Short bullets.")
        );
    }

    #[test]
    fn strips_json_fences() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(parse_feedback(&fenced).unwrap().overall_score, 74);
    }

    #[test]
    fn not_json_is_malformed() {
        assert!(matches!(
            parse_feedback("not json"),
            Err(AnalysisError::MalformedFeedback { .. })
        ));
    }

    #[test]
    fn missing_category_is_malformed() {
        let partial = r#"{"overallScore": 50, "ATS": {"score": 50, "tips": []}}"#;
        assert!(matches!(
            parse_feedback(partial),
            Err(AnalysisError::MalformedFeedback { .. })
        ));
    }

    #[test]
    fn missing_tips_is_malformed() {
        let no_tips = r#"{
            "overallScore": 50,
            "ATS": { "score": 50 },
            "toneAndStyle": { "score": 50 },
            "content": { "score": 50 },
            "structure": { "score": 50 },
            "skills": { "score": 50 }
        }"#;
        match parse_feedback(no_tips) {
            Err(AnalysisError::MalformedFeedback { detail }) => {
                assert!(detail.contains("tips"), "got: {detail}")
            }
            other => panic!("expected MalformedFeedback, got {other:?}"),
        }

        let ats_only = VALID.replace(
            r#""ATS": { "score": 80, "tips": [{ "type": "improve", "tip": "Add keywords" }] }"#,
            r#""ATS": { "score": 80 }"#,
        );
        assert_ne!(ats_only, VALID);
        assert!(matches!(
            parse_feedback(&ats_only),
            Err(AnalysisError::MalformedFeedback { .. })
        ));
    }

    #[test]
    fn out_of_range_score_is_malformed() {
        let bad = VALID.replace("\"overallScore\": 74", "\"overallScore\": 140");
        match parse_feedback(&bad) {
            Err(AnalysisError::MalformedFeedback { detail }) => {
                assert!(detail.contains("overallScore"), "got: {detail}")
            }
            other => panic!("expected MalformedFeedback, got {other:?}"),
        }
    }

    #[test]
    fn negative_score_is_malformed() {
        let bad = VALID.replace("\"score\": 65", "\"score\": -5");
        assert!(parse_feedback(&bad).is_err());
    }

    #[test]
    fn extracts_from_part_list() {
        let r = InferenceResponse::parts([VALID]);
        assert_eq!(extract_feedback(&r).unwrap().skills.score, 60);
    }

    #[test]
    fn empty_part_list_is_malformed() {
        let r = InferenceResponse::parts(Vec::<String>::new());
        assert!(matches!(
            extract_feedback(&r),
            Err(AnalysisError::MalformedFeedback { .. })
        ));
    }
}
