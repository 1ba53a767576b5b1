//! Analysis entry points: résumé in, scored [`ResumeRecord`] out.
//!
//! ## Stage order
//!
//! ```text
//! 1 upload résumé ─▶ 2 rasterise ─▶ 3 upload preview ─▶ 4 save draft
//!                                                          │ checkpoint
//!                   7 save final ◀─ 6 parse ◀─ 5 inference ◀┘
//! ```
//!
//! No stage starts until the previous one succeeded. A failure before
//! stage 4 leaves no record; a failure after it leaves a draft whose
//! feedback is pending, which [`AnalysisPipeline::reanalyze`] can finish
//! later under the same id. Nothing is retried automatically here (the
//! inference client retries its own transport errors).

use crate::cancel::CancellationToken;
use crate::codec::{self, record_key, RECORD_PREFIX};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::inference::{resolve_provider, InferenceService, VisionInference};
use crate::pipeline::encode::encode_png;
use crate::pipeline::parse::extract_feedback;
use crate::pipeline::render::{PdfRasterizer, PdfiumRasterizer};
use crate::prompts::prepare_instructions;
use crate::record::{FeedbackState, ResumeRecord};
use crate::status::{
    AnalysisProgressCallback, NoopProgressCallback, Phase, PipelineStatus, ProgressCallback,
};
use crate::store::local::{FileKeyValueStore, LocalBlobStore};
use crate::store::{BlobFile, BlobStore, KeyValueStore};
use crate::wipe::WipeCoordinator;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Concurrent reads while listing records.
const LIST_CONCURRENCY: usize = 8;

/// Input of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// The résumé PDF as uploaded.
    pub file: BlobFile,
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
}

/// A record together with the stored blobs it points at.
#[derive(Debug, Clone)]
pub struct ResumeReview {
    pub record: ResumeRecord,
    /// `None` if the résumé blob is gone.
    pub resume_pdf: Option<Vec<u8>>,
    /// `None` if the preview blob is gone.
    pub preview_png: Option<Vec<u8>>,
}

/// Read/write access to stored résumé records.
///
/// Needs no LLM provider, so listing and showing records works offline.
#[derive(Clone)]
pub struct RecordStore {
    blobs: Arc<dyn BlobStore>,
    kv: Arc<dyn KeyValueStore>,
}

impl RecordStore {
    pub fn new(blobs: Arc<dyn BlobStore>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self { blobs, kv }
    }

    /// Stores under a data directory: `files/` for blobs, `kv.json` for
    /// records.
    pub fn open_local(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self::new(
            Arc::new(LocalBlobStore::new(dir.join("files"))),
            Arc::new(FileKeyValueStore::new(dir.join("kv.json"))),
        )
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    /// Fetch and decode the record stored for `id`.
    pub async fn load(&self, id: &str) -> Result<ResumeRecord, AnalysisError> {
        let key = record_key(id);
        let raw = self
            .kv
            .get(&key)
            .await
            .map_err(|e| AnalysisError::Internal(format!("failed to read '{key}': {e}")))?
            .ok_or_else(|| AnalysisError::RecordNotFound { id: id.to_string() })?;
        codec::decode(&key, &raw)
    }

    /// Load a record plus its résumé and preview blobs.
    pub async fn load_review(&self, id: &str) -> Result<ResumeReview, AnalysisError> {
        let record = self.load(id).await?;
        let resume_pdf = self.read_blob(&record.resume_path).await;
        let preview_png = self.read_blob(&record.image_path).await;
        Ok(ResumeReview {
            record,
            resume_pdf,
            preview_png,
        })
    }

    async fn read_blob(&self, path: &str) -> Option<Vec<u8>> {
        match self.blobs.read(path).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not read blob '{}': {}", path, e);
                None
            }
        }
    }

    /// Every stored record, in key order. Corrupt entries are skipped.
    pub async fn list_records(&self) -> Result<Vec<ResumeRecord>, AnalysisError> {
        let keys = self
            .kv
            .list(RECORD_PREFIX)
            .await
            .map_err(|e| AnalysisError::Internal(format!("failed to list records: {e}")))?;
        debug!("Listing {} record keys", keys.len());

        let records: Vec<ResumeRecord> = stream::iter(keys)
            .map(|key| async move {
                let raw = self.kv.get(&key).await;
                (key, raw)
            })
            .buffered(LIST_CONCURRENCY)
            .filter_map(|(key, raw)| async move {
                match raw {
                    Ok(Some(raw)) => match codec::decode(&key, &raw) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            warn!("Skipping record: {}", e);
                            None
                        }
                    },
                    Ok(None) => None,
                    Err(e) => {
                        warn!("Skipping '{}': {}", key, e);
                        None
                    }
                }
            })
            .collect()
            .await;
        Ok(records)
    }

    /// Write `record` under its key on behalf of `phase`. Never raced
    /// against cancellation.
    async fn save(&self, record: &ResumeRecord, phase: Phase) -> Result<(), AnalysisError> {
        let key = record_key(&record.id);
        let raw = codec::encode(record)?;
        self.kv
            .set(&key, &raw)
            .await
            .map_err(|e| AnalysisError::Persist {
                key: key.clone(),
                detail: e.to_string(),
                phase,
            })?;
        debug!("Saved {} ({} bytes)", key, raw.len());
        Ok(())
    }
}

/// Runs résumés through upload, rasterisation, persistence and scoring.
pub struct AnalysisPipeline {
    records: RecordStore,
    rasterizer: Arc<dyn PdfRasterizer>,
    inference: Arc<dyn InferenceService>,
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        kv: Arc<dyn KeyValueStore>,
        rasterizer: Arc<dyn PdfRasterizer>,
        inference: Arc<dyn InferenceService>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            records: RecordStore::new(blobs, kv),
            rasterizer,
            inference,
            config,
        }
    }

    /// Production wiring on a local data directory: filesystem stores,
    /// pdfium rasteriser and a vision LLM resolved from `config`.
    pub fn open_local(
        data_dir: impl AsRef<Path>,
        config: AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        let records = RecordStore::open_local(data_dir);
        let rasterizer: Arc<dyn PdfRasterizer> =
            Arc::new(PdfiumRasterizer::new(config.max_rendered_pixels));
        let provider = resolve_provider(&config)?;
        debug!("LLM provider resolved");
        let inference = Arc::new(VisionInference::new(
            provider,
            Arc::clone(records.blobs()),
            Arc::clone(&rasterizer),
            &config,
        ));
        Ok(Self {
            records,
            rasterizer,
            inference,
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// A wipe coordinator over the same stores.
    pub fn wipe_coordinator(&self) -> WipeCoordinator {
        WipeCoordinator::new(
            Arc::clone(self.records.blobs()),
            Arc::clone(self.records.kv()),
            self.config.artifact_root.clone(),
        )
    }

    /// Analyse one résumé.
    ///
    /// Progress goes to `config.progress_callback` if set. The run cannot
    /// be cancelled; use [`analyze_with`](Self::analyze_with) for that.
    ///
    /// # Errors
    /// The first failing stage's error; see [`AnalysisError::leaves_draft`]
    /// for which failures leave a pending record behind.
    pub async fn analyze(
        &self,
        file: BlobFile,
        company_name: impl Into<String>,
        job_title: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Result<ResumeRecord, AnalysisError> {
        let request = AnalysisRequest {
            file,
            company_name: company_name.into(),
            job_title: job_title.into(),
            job_description: job_description.into(),
        };
        let progress = self.default_progress();
        self.analyze_with(request, progress.as_ref(), &CancellationToken::new())
            .await
    }

    /// Analyse one résumé, reporting to `progress` and observing `cancel`.
    pub async fn analyze_with(
        &self,
        request: AnalysisRequest,
        progress: &dyn AnalysisProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<ResumeRecord, AnalysisError> {
        let start = Instant::now();
        info!("Analyzing '{}' for '{}'", request.file.name, request.job_title);
        let result = self.run(request, progress, cancel).await;
        report(progress, &result);
        if let Ok(ref record) = result {
            info!("Analysis {} done in {:?}", record.id, start.elapsed());
        }
        result
    }

    /// Finish a pending draft: re-run inference, parsing and the final save
    /// for `id`. An already scored record is returned unchanged.
    pub async fn reanalyze(&self, id: &str) -> Result<ResumeRecord, AnalysisError> {
        let progress = self.default_progress();
        self.reanalyze_with(id, progress.as_ref(), &CancellationToken::new())
            .await
    }

    pub async fn reanalyze_with(
        &self,
        id: &str,
        progress: &dyn AnalysisProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<ResumeRecord, AnalysisError> {
        let result = match self.records.load(id).await {
            Ok(record) if !record.is_pending() => {
                info!("Record {} already scored", id);
                Ok(record)
            }
            Ok(draft) => {
                info!("Re-analyzing draft {}", id);
                self.score(draft, progress, cancel).await
            }
            Err(e) => Err(e),
        };
        report(progress, &result);
        result
    }

    pub async fn load(&self, id: &str) -> Result<ResumeRecord, AnalysisError> {
        self.records.load(id).await
    }

    pub async fn load_review(&self, id: &str) -> Result<ResumeReview, AnalysisError> {
        self.records.load_review(id).await
    }

    pub async fn list_records(&self) -> Result<Vec<ResumeRecord>, AnalysisError> {
        self.records.list_records().await
    }

    fn default_progress(&self) -> ProgressCallback {
        self.config
            .progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback))
    }

    async fn run(
        &self,
        request: AnalysisRequest,
        progress: &dyn AnalysisProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<ResumeRecord, AnalysisError> {
        let blobs = self.records.blobs();

        // ── Stage 1: upload the original ─────────────────────────────────
        enter(Phase::UploadingResume, progress, cancel)?;
        let uploaded = race(
            Phase::UploadingResume,
            cancel,
            blobs.upload(std::slice::from_ref(&request.file)),
        )
        .await?;
        let resume_path = match uploaded {
            Ok(Some(blob)) => blob.path,
            Ok(None) => return Err(no_handle("résumé")),
            Err(e) => {
                return Err(AnalysisError::Upload {
                    what: "résumé",
                    detail: e.to_string(),
                })
            }
        };
        debug!("Résumé stored at {}", resume_path);

        // ── Stage 2: rasterise page one ──────────────────────────────────
        enter(Phase::ConvertingPdf, progress, cancel)?;
        let rendered = race(
            Phase::ConvertingPdf,
            cancel,
            self.rasterizer.first_page(&request.file.data),
        )
        .await?;
        let page = match rendered {
            Ok(Some(page)) => page,
            Ok(None) => {
                return Err(AnalysisError::Conversion {
                    detail: "the PDF has no pages".into(),
                })
            }
            Err(e) => {
                return Err(AnalysisError::Conversion {
                    detail: e.to_string(),
                })
            }
        };
        let png = encode_png(&page).map_err(|e| AnalysisError::Conversion {
            detail: format!("image encoding failed: {e}"),
        })?;

        // ── Stage 3: upload the preview ──────────────────────────────────
        enter(Phase::UploadingPreview, progress, cancel)?;
        let preview = BlobFile::new(format!("{}.png", request.file.stem()), png);
        let uploaded = race(
            Phase::UploadingPreview,
            cancel,
            blobs.upload(std::slice::from_ref(&preview)),
        )
        .await?;
        let image_path = match uploaded {
            Ok(Some(blob)) => blob.path,
            Ok(None) => return Err(no_handle("preview image")),
            Err(e) => {
                return Err(AnalysisError::Upload {
                    what: "preview image",
                    detail: e.to_string(),
                })
            }
        };
        debug!("Preview stored at {}", image_path);

        // ── Stage 4: draft checkpoint ────────────────────────────────────
        enter(Phase::SavingDraft, progress, cancel)?;
        let draft = ResumeRecord {
            id: Uuid::new_v4().to_string(),
            resume_path,
            image_path,
            company_name: request.company_name,
            job_title: request.job_title,
            job_description: request.job_description,
            feedback: FeedbackState::Pending,
        };
        self.records.save(&draft, Phase::SavingDraft).await?;
        info!("Draft {} saved", draft.id);

        self.score(draft, progress, cancel).await
    }

    /// Stages 5–7 on a saved draft.
    async fn score(
        &self,
        draft: ResumeRecord,
        progress: &dyn AnalysisProgressCallback,
        cancel: &CancellationToken,
    ) -> Result<ResumeRecord, AnalysisError> {
        // ── Stage 5: inference ───────────────────────────────────────────
        enter(Phase::Analyzing, progress, cancel)?;
        let prompt = prepare_instructions(
            self.config.instructions.as_deref(),
            &draft.job_title,
            &draft.job_description,
        );
        let response = race(
            Phase::Analyzing,
            cancel,
            self.inference.feedback(&draft.resume_path, &prompt),
        )
        .await?;
        let response = match response {
            Ok(Some(response)) => response,
            Ok(None) => {
                return Err(AnalysisError::Inference {
                    detail: "the service returned no response".into(),
                })
            }
            Err(e) => {
                return Err(AnalysisError::Inference {
                    detail: e.to_string(),
                })
            }
        };

        // ── Stage 6: parse ───────────────────────────────────────────────
        let feedback = extract_feedback(&response)?;
        debug!("Parsed feedback for {}: overall {}", draft.id, feedback.overall_score);

        // ── Stage 7: finalize ────────────────────────────────────────────
        enter(Phase::Finalizing, progress, cancel)?;
        let scored = draft.with_feedback(feedback);
        self.records.save(&scored, Phase::Finalizing).await?;
        Ok(scored)
    }
}

/// Check for cancellation, then announce `phase`.
fn enter(
    phase: Phase,
    progress: &dyn AnalysisProgressCallback,
    cancel: &CancellationToken,
) -> Result<(), AnalysisError> {
    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled { phase });
    }
    info!("{}", phase.description());
    progress.on_status(&PipelineStatus::of(phase));
    Ok(())
}

/// Run `fut` unless `cancel` fires first.
async fn race<F: Future>(
    phase: Phase,
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, AnalysisError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AnalysisError::Cancelled { phase }),
        out = fut => Ok(out),
    }
}

fn no_handle(what: &'static str) -> AnalysisError {
    AnalysisError::Upload {
        what,
        detail: "the blob store returned no handle".into(),
    }
}

/// Final status of a run.
fn report(progress: &dyn AnalysisProgressCallback, result: &Result<ResumeRecord, AnalysisError>) {
    match result {
        Ok(_) => progress.on_status(&PipelineStatus::of(Phase::Completed)),
        Err(e) => {
            warn!("Analysis failed: {}", e);
            progress.on_status(&PipelineStatus::failed(e));
        }
    }
}
