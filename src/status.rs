//! Pipeline status reporting.
//!
//! Every analysis run reports a [`PipelineStatus`] before each stage starts,
//! once more when it completes, and once with the error text when it fails.
//! Status is observability only: nothing in the pipeline reads it back.
//!
//! Each run gets its own sink (see
//! [`crate::analyze::AnalysisPipeline::analyze_with`]), so two analyses in
//! the same process never write to the same status cell. For the common
//! "show the latest message" case, [`watch_status`] returns a sink paired
//! with a [`tokio::sync::watch::Receiver`] holding the most recent status.
//!
//! # Example
//!
//! ```rust
//! use resumind::status::{watch_status, Phase};
//!
//! let (sink, rx) = watch_status();
//! assert_eq!(rx.borrow().phase, Phase::Idle);
//! # drop(sink);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Stage of an analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing has started yet.
    Idle,
    UploadingResume,
    ConvertingPdf,
    UploadingPreview,
    /// The draft checkpoint: record written with pending feedback.
    SavingDraft,
    Analyzing,
    Finalizing,
    Completed,
    Failed,
}

impl Phase {
    /// Default human-readable description shown while the phase runs.
    pub fn description(self) -> &'static str {
        match self {
            Phase::Idle => "Waiting for a résumé...",
            Phase::UploadingResume => "Uploading résumé...",
            Phase::ConvertingPdf => "Converting PDF...",
            Phase::UploadingPreview => "Uploading preview image...",
            Phase::SavingDraft => "Saving job & résumé details...",
            Phase::Analyzing => "Analyzing résumé...",
            Phase::Finalizing => "Saving feedback...",
            Phase::Completed => "Analysis completed.",
            Phase::Failed => "Analysis failed.",
        }
    }

    /// Whether the draft record already exists once this phase is reached.
    pub fn is_after_checkpoint(self) -> bool {
        matches!(self, Phase::Analyzing | Phase::Finalizing | Phase::Completed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::UploadingResume => "résumé upload",
            Phase::ConvertingPdf => "PDF conversion",
            Phase::UploadingPreview => "preview upload",
            Phase::SavingDraft => "draft save",
            Phase::Analyzing => "analysis",
            Phase::Finalizing => "finalize",
            Phase::Completed => "completion",
            Phase::Failed => "failure",
        };
        f.write_str(name)
    }
}

/// Snapshot of a run's progress: the phase plus the text to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub phase: Phase,
    pub message: String,
}

impl PipelineStatus {
    /// Status for `phase` with its default description.
    pub fn of(phase: Phase) -> Self {
        Self {
            phase,
            message: phase.description().to_string(),
        }
    }

    /// Failure status whose message is the error text.
    pub fn failed(error: &impl fmt::Display) -> Self {
        Self {
            phase: Phase::Failed,
            message: format!("Error: {error}"),
        }
    }
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self::of(Phase::Idle)
    }
}

/// Receives status updates from one analysis run.
///
/// Implementations must be `Send + Sync`: the sink may be shared with the
/// task that drives the pipeline. The default method is a no-op.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called at every stage transition, before the stage executes.
    fn on_status(&self, status: &PipelineStatus) {
        let _ = status;
    }
}

/// A no-op sink for callers that don't display progress.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

/// Sink that publishes the latest status into a `watch` channel.
pub struct WatchProgress {
    tx: watch::Sender<PipelineStatus>,
}

impl AnalysisProgressCallback for WatchProgress {
    fn on_status(&self, status: &PipelineStatus) {
        // No receivers left is fine: nobody is looking any more.
        self.tx.send_replace(status.clone());
    }
}

/// Create a per-run status cell.
///
/// Returns the sink to pass to the pipeline and a receiver that always
/// holds the latest [`PipelineStatus`].
pub fn watch_status() -> (ProgressCallback, watch::Receiver<PipelineStatus>) {
    let (tx, rx) = watch::channel(PipelineStatus::default());
    (Arc::new(WatchProgress { tx }), rx)
}

/// Adapt a status receiver into a `Stream` of updates.
///
/// The stream yields the current value first, then every change. Rapid
/// successive updates may be coalesced; the final status is always seen.
pub fn status_stream(rx: watch::Receiver<PipelineStatus>) -> WatchStream<PipelineStatus> {
    WatchStream::new(rx)
}
