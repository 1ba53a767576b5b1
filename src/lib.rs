//! # resumind
//!
//! Score résumés against a target job with a vision language model.
//!
//! A résumé PDF is stored, its first page rendered to a preview image, a
//! draft record saved, and the page sent to a VLM together with the job
//! title and description. The model's answer is parsed into structured
//! [`Feedback`] (overall score plus ATS, tone & style, content, structure
//! and skills categories) and saved on the record.
//!
//! ## Pipeline Overview
//!
//! ```text
//! résumé.pdf
//!  │
//!  ├─ 1. Upload     original PDF → blob store
//!  ├─ 2. Render     first page via pdfium (spawn_blocking)
//!  ├─ 3. Upload     preview PNG → blob store
//!  ├─ 4. Draft      record with pending feedback → key-value store
//!  ├─ 5. Inference  page image + instructions → VLM
//!  ├─ 6. Parse      JSON → validated Feedback
//!  └─ 7. Finalize   scored record → key-value store
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resumind::{AnalysisConfig, AnalysisPipeline, BlobFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let pipeline = AnalysisPipeline::open_local("./data", AnalysisConfig::default())?;
//!     let pdf = std::fs::read("resume.pdf")?;
//!     let record = pipeline
//!         .analyze(BlobFile::new("resume.pdf", pdf), "Acme", "Backend Engineer", "")
//!         .await?;
//!     if let Some(feedback) = record.scored() {
//!         println!("overall: {}/100", feedback.overall_score);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `resumind` binary (clap + anyhow + tracing-subscriber) |
//!
//! ```toml
//! resumind = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod cancel;
pub mod codec;
pub mod config;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod prompts;
pub mod record;
pub mod status;
pub mod store;
pub mod wipe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{AnalysisPipeline, AnalysisRequest, RecordStore, ResumeReview};
pub use cancel::CancellationToken;
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, DeleteError, ServiceError, WorkflowError};
pub use inference::{InferenceResponse, InferenceService};
pub use pipeline::render::PdfRasterizer;
pub use record::{Feedback, FeedbackState, ResumeRecord, ScoreBand, Tip, TipKind};
pub use status::{
    watch_status, AnalysisProgressCallback, NoopProgressCallback, Phase, PipelineStatus,
    ProgressCallback,
};
pub use store::{BlobFile, BlobStore, FsItem, KeyValueStore};
pub use wipe::{format_size, WipeCoordinator, WipeReport, WipeState, WipeWorkflow};
