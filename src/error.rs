//! Error types for the resumind library.
//!
//! Three error types map to three failure scopes:
//!
//! * [`AnalysisError`]: **Fatal** for one analysis run. A stage of the
//!   [`crate::analyze::AnalysisPipeline`] failed and the remaining stages were
//!   skipped. Returned as `Err(AnalysisError)` from `analyze`, `reanalyze`
//!   and the record loaders.
//!
//! * [`DeleteError`]: **Non-fatal**: one artifact could not be deleted
//!   during a wipe. Stored inside [`crate::wipe::WipeReport`] so the wipe
//!   keeps going and the caller sees exactly which items survived.
//!
//! * [`ServiceError`]: raised by the external collaborators (blob store,
//!   key-value store, inference service, rasterizer). The pipeline never
//!   surfaces it directly; each stage wraps it in the matching
//!   [`AnalysisError`] variant so callers learn *which* stage failed.

use crate::status::Phase;
use thiserror::Error;

/// All fatal errors returned by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Stage errors ──────────────────────────────────────────────────────
    /// The blob store returned no handle for an upload.
    #[error("Failed to upload {what}: {detail}")]
    Upload { what: &'static str, detail: String },

    /// Rasterisation produced no preview image (corrupt PDF, zero pages).
    #[error("PDF conversion failed: {detail}")]
    Conversion { detail: String },

    /// The inference service returned no response.
    #[error("AI analysis failed: {detail}")]
    Inference { detail: String },

    /// The inference response did not parse into the feedback shape.
    #[error("Malformed feedback from model: {detail}")]
    MalformedFeedback { detail: String },

    /// A stored record could not be decoded.
    #[error("Stored record '{key}' is corrupt: {detail}")]
    CorruptRecord { key: String, detail: String },

    /// A key-value write failed. `phase` is the stage that issued it:
    /// `SavingDraft` for the draft, `Finalizing` for the scored record.
    #[error("Failed to save '{key}': {detail}")]
    Persist {
        key: String,
        detail: String,
        phase: Phase,
    },

    /// No record is stored under the given id.
    #[error("No résumé record with id '{id}'")]
    RecordNotFound { id: String },

    /// The run was cancelled before `phase` could start or finish.
    #[error("Analysis cancelled during {phase}")]
    Cancelled { phase: Phase },

    // ── Setup errors ──────────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// True for the errors that leave a durable draft behind.
    ///
    /// Only failures after the draft checkpoint qualify: the record is
    /// retrievable and can be handed to
    /// [`crate::analyze::AnalysisPipeline::reanalyze`].
    pub fn leaves_draft(&self) -> bool {
        match self {
            AnalysisError::Inference { .. }
            | AnalysisError::MalformedFeedback { .. } => true,
            AnalysisError::Cancelled { phase } | AnalysisError::Persist { phase, .. } => {
                phase.is_after_checkpoint()
            }
            _ => false,
        }
    }
}

/// A non-fatal error for a single artifact during a wipe.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("Failed to delete '{path}': {detail}")]
pub struct DeleteError {
    pub path: String,
    pub detail: String,
}

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Filesystem or transport I/O failed.
    #[error("I/O error on '{path}': {detail}")]
    Io { path: String, detail: String },

    /// The addressed object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The path would escape the store root.
    #[error("Invalid path '{0}'")]
    InvalidPath(String),

    /// The backend rejected or failed the call.
    #[error("{0}")]
    Backend(String),
}

impl ServiceError {
    pub(crate) fn io(path: impl std::fmt::Display, err: std::io::Error) -> Self {
        ServiceError::Io {
            path: path.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Errors from driving the [`crate::wipe::WipeWorkflow`] state machine.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// The requested transition is not valid from the current state.
    #[error("Cannot {action} while the wipe workflow is {state}")]
    InvalidTransition {
        action: &'static str,
        state: crate::wipe::WipeState,
    },
}
