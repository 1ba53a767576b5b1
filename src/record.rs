//! Résumé records and the structured feedback they carry.
//!
//! A [`ResumeRecord`] is created as a draft with [`FeedbackState::Pending`]
//! and later replaced, whole, by a copy holding [`FeedbackState::Scored`].
//! On the wire the pending state is the empty string, so records written
//! by older clients decode unchanged (see [`crate::codec`]).

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// One stored résumé analysis, keyed by `resume:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    /// Opaque unique token (UUID v4), generated client-side.
    pub id: String,
    /// Blob-store locator of the original PDF.
    pub resume_path: String,
    /// Blob-store locator of the first-page preview image.
    pub image_path: String,
    pub company_name: String,
    pub job_title: String,
    /// Free text, may be empty.
    pub job_description: String,
    pub feedback: FeedbackState,
}

impl ResumeRecord {
    pub fn is_pending(&self) -> bool {
        matches!(self.feedback, FeedbackState::Pending)
    }

    /// The feedback, once analysis has completed.
    pub fn scored(&self) -> Option<&Feedback> {
        match &self.feedback {
            FeedbackState::Scored(f) => Some(f),
            FeedbackState::Pending => None,
        }
    }

    /// Copy of this record with the analysis result attached.
    pub fn with_feedback(&self, feedback: Feedback) -> Self {
        Self {
            feedback: FeedbackState::Scored(feedback),
            ..self.clone()
        }
    }
}

/// Either "not yet analyzed" or the complete feedback object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FeedbackState {
    #[default]
    Pending,
    Scored(Feedback),
}

impl Serialize for FeedbackState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FeedbackState::Pending => serializer.serialize_str(""),
            FeedbackState::Scored(f) => f.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FeedbackState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Object(Feedback),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Text(s) if s.is_empty() => Ok(FeedbackState::Pending),
            Wire::Text(_) => Err(de::Error::custom(
                "feedback must be \"\" (pending) or a feedback object",
            )),
            Wire::Object(f) => f
                .validate()
                .map(|_| FeedbackState::Scored(f))
                .map_err(de::Error::custom),
        }
    }
}

/// Structured résumé feedback as produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: u8,
    #[serde(rename = "ATS")]
    pub ats: AtsFeedback,
    pub tone_and_style: CategoryFeedback,
    pub content: CategoryFeedback,
    pub structure: CategoryFeedback,
    pub skills: CategoryFeedback,
}

impl Feedback {
    /// Check every score lies within `0..=100`.
    pub fn validate(&self) -> Result<(), String> {
        let scores = [
            ("overallScore", self.overall_score),
            ("ATS.score", self.ats.score),
            ("toneAndStyle.score", self.tone_and_style.score),
            ("content.score", self.content.score),
            ("structure.score", self.structure.score),
            ("skills.score", self.skills.score),
        ];
        for (field, score) in scores {
            if score > 100 {
                return Err(format!("{field} must be within 0..=100, got {score}"));
            }
        }
        Ok(())
    }

    /// The four detail categories with their display titles, in display order.
    pub fn categories(&self) -> [(&'static str, &CategoryFeedback); 4] {
        [
            ("Tone & Style", &self.tone_and_style),
            ("Content", &self.content),
            ("Structure", &self.structure),
            ("Skills", &self.skills),
        ]
    }
}

/// Score and tips for one feedback category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFeedback {
    pub score: u8,
    pub tips: Vec<Tip>,
}

/// Applicant-tracking-system compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtsFeedback {
    pub score: u8,
    pub tips: Vec<Tip>,
}

/// A single improvement (or praise) tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

/// Coarse rating used when presenting a score.
///
/// | Band | Score |
/// |------|-------|
/// | `Strong` | 71–100 |
/// | `Fair` | 50–70 |
/// | `Weak` | 0–49 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Strong,
    Fair,
    Weak,
}

impl ScoreBand {
    pub fn of(score: u8) -> Self {
        if score > 70 {
            ScoreBand::Strong
        } else if score > 49 {
            ScoreBand::Fair
        } else {
            ScoreBand::Weak
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScoreBand::Strong => "Strong",
            ScoreBand::Fair => "Good Start",
            ScoreBand::Weak => "Needs Work",
        }
    }
}
