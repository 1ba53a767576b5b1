//! Instructions sent to the model with the résumé.
//!
//! The template is a plain text substitution: `{job_title}` and
//! `{job_description}` are replaced verbatim in a single pass, so braces in
//! the substituted values are never expanded again. Callers can supply their own
//! template through [`crate::config::AnalysisConfig::instructions`]; the
//! response format block is appended to custom templates as well, since the
//! parser depends on it.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(job_title|job_description)\}").unwrap());

/// Default analysis instructions.
pub const DEFAULT_INSTRUCTIONS: &str = r#"You are an expert in ATS (Applicant Tracking Systems) and résumé analysis.
Analyze and rate the attached résumé and suggest how to improve it.

Be thorough and detailed. Don't be afraid to point out mistakes or areas for
improvement. If there is a lot to improve, don't hesitate to give low scores.
If available, use the job description for the job the user is applying to
give more tailored feedback.

The job title is: {job_title}
The job description is: {job_description}"#;

/// Shape the model must answer with. Mirrors [`crate::record::Feedback`].
pub const RESPONSE_FORMAT: &str = r#"Provide the feedback using the following format:
{
  "overallScore": number (0-100),
  "ATS": {
    "score": number (0-100),
    "tips": [{ "type": "good" | "improve", "tip": string }]
  },
  "toneAndStyle": {
    "score": number (0-100),
    "tips": [{ "type": "good" | "improve", "tip": string, "explanation": string }]
  },
  "content": { same shape as toneAndStyle },
  "structure": { same shape as toneAndStyle },
  "skills": { same shape as toneAndStyle }
}
Give 3-4 tips per category.
Return the analysis as a JSON object, without any other text and without backticks.
Do not include any other text or comments."#;

/// Build the prompt for one résumé.
///
/// `template` defaults to [`DEFAULT_INSTRUCTIONS`].
pub fn prepare_instructions(
    template: Option<&str>,
    job_title: &str,
    job_description: &str,
) -> String {
    let template = template.unwrap_or(DEFAULT_INSTRUCTIONS);
    let body = RE_PLACEHOLDER.replace_all(template, |caps: &Captures| match &caps[1] {
        "job_title" => job_title,
        _ => job_description,
    });
    format!("{body}\n\n{RESPONSE_FORMAT}")
}
