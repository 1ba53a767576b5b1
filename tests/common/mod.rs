//! Scripted collaborators for integration tests. No network, no pdfium.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use resumind::inference::InferenceResponse;
use resumind::store::memory::{MemoryBlobStore, MemoryKeyValueStore};
use resumind::store::UploadedBlob;
use resumind::{
    AnalysisConfig, AnalysisPipeline, AnalysisProgressCallback, BlobFile, BlobStore,
    CancellationToken, FsItem, InferenceService, KeyValueStore, PdfRasterizer, Phase,
    PipelineStatus, ServiceError,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const FEEDBACK_JSON: &str = r#"{
    "overallScore": 72,
    "ATS": { "score": 80, "tips": [
        { "type": "good", "tip": "Standard headings" },
        { "type": "improve", "tip": "Add keywords from the posting" }
    ] },
    "toneAndStyle": { "score": 75, "tips": [
        { "type": "good", "tip": "Active voice", "explanation": "Bullets start with verbs." }
    ] },
    "content": { "score": 68, "tips": [
        { "type": "improve", "tip": "Quantify results", "explanation": "Add numbers." }
    ] },
    "structure": { "score": 85, "tips": [] },
    "skills": { "score": 55, "tips": [] }
}"#;

pub fn pdf_file() -> BlobFile {
    BlobFile::new("resume.pdf", b"%PDF-1.7 fake".to_vec())
}

// ── Rasterizer ───────────────────────────────────────────────────────────────

/// Returns a small white page, or nothing when `empty`.
pub struct FakeRasterizer {
    pub empty: bool,
}

#[async_trait]
impl PdfRasterizer for FakeRasterizer {
    async fn first_page(&self, _pdf: &[u8]) -> Result<Option<DynamicImage>, ServiceError> {
        if self.empty {
            return Ok(None);
        }
        Ok(Some(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            8,
            10,
            Rgba([255, 255, 255, 255]),
        ))))
    }
}

// ── Inference ────────────────────────────────────────────────────────────────

/// Pops one scripted answer per call; `None` entries mean "no response".
pub struct ScriptedInference {
    answers: Mutex<VecDeque<Option<InferenceResponse>>>,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
    /// Cancel this token when called, to simulate a user abort mid-call.
    pub cancel_on_call: Option<CancellationToken>,
}

impl ScriptedInference {
    pub fn new(answers: Vec<Option<InferenceResponse>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            cancel_on_call: None,
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(vec![Some(InferenceResponse::text(text))])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceService for ScriptedInference {
    async fn feedback(
        &self,
        _document_path: &str,
        prompt: &str,
    ) -> Result<Option<InferenceResponse>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(ref token) = self.cancel_on_call {
            token.cancel();
            std::future::pending::<()>().await;
        }
        Ok(self.answers.lock().unwrap().pop_front().flatten())
    }
}

// ── Blob store ───────────────────────────────────────────────────────────────

/// Memory store whose uploads can be made to return no handle, and whose
/// deletes fail for chosen paths.
#[derive(Default)]
pub struct FlakyBlobStore {
    pub inner: MemoryBlobStore,
    pub refuse_uploads: bool,
    pub fail_deletes: HashSet<String>,
    pub delete_attempts: Mutex<Vec<String>>,
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn upload(&self, files: &[BlobFile]) -> Result<Option<UploadedBlob>, ServiceError> {
        if self.refuse_uploads {
            return Ok(None);
        }
        self.inner.upload(files).await
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, ServiceError> {
        self.inner.read(path).await
    }

    async fn delete(&self, path: &str) -> Result<(), ServiceError> {
        self.delete_attempts.lock().unwrap().push(path.to_string());
        if self.fail_deletes.contains(path) {
            return Err(ServiceError::Backend(format!("permission denied: {path}")));
        }
        self.inner.delete(path).await
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FsItem>, ServiceError> {
        self.inner.read_dir(path).await
    }
}

// ── Key-value store ──────────────────────────────────────────────────────────

/// Memory store that counts calls and can fail `flush`.
#[derive(Default)]
pub struct CountingKv {
    pub inner: MemoryKeyValueStore,
    pub sets: AtomicUsize,
    pub flushes: AtomicUsize,
    pub fail_flush: bool,
    /// Refuse the n-th `set` (1-based) and every one after it.
    pub fail_sets_from: Option<usize>,
}

impl CountingKv {
    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for CountingKv {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let n = self.sets.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_sets_from.is_some_and(|from| n >= from) {
            return Err(ServiceError::Backend(format!("write {n} refused")));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        self.inner.list(prefix).await
    }

    async fn flush(&self) -> Result<(), ServiceError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush {
            return Err(ServiceError::Backend("namespace is read-only".into()));
        }
        self.inner.flush().await
    }
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct PhaseRecorder {
    pub seen: Mutex<Vec<PipelineStatus>>,
}

impl PhaseRecorder {
    pub fn phases(&self) -> Vec<Phase> {
        self.seen.lock().unwrap().iter().map(|s| s.phase).collect()
    }

    pub fn last(&self) -> Option<PipelineStatus> {
        self.seen.lock().unwrap().last().cloned()
    }
}

impl AnalysisProgressCallback for PhaseRecorder {
    fn on_status(&self, status: &PipelineStatus) {
        self.seen.lock().unwrap().push(status.clone());
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub blobs: Arc<FlakyBlobStore>,
    pub kv: Arc<CountingKv>,
    pub inference: Arc<ScriptedInference>,
    pub pipeline: AnalysisPipeline,
}

impl Harness {
    pub fn new(inference: ScriptedInference) -> Self {
        Self::with(FlakyBlobStore::default(), FakeRasterizer { empty: false }, inference)
    }

    pub fn with(
        blobs: FlakyBlobStore,
        rasterizer: FakeRasterizer,
        inference: ScriptedInference,
    ) -> Self {
        Self::assemble(blobs, CountingKv::default(), rasterizer, inference)
    }

    pub fn with_kv(kv: CountingKv, inference: ScriptedInference) -> Self {
        Self::assemble(
            FlakyBlobStore::default(),
            kv,
            FakeRasterizer { empty: false },
            inference,
        )
    }

    fn assemble(
        blobs: FlakyBlobStore,
        kv: CountingKv,
        rasterizer: FakeRasterizer,
        inference: ScriptedInference,
    ) -> Self {
        let blobs = Arc::new(blobs);
        let kv = Arc::new(kv);
        let inference = Arc::new(inference);
        let pipeline = AnalysisPipeline::new(
            blobs.clone(),
            kv.clone(),
            Arc::new(rasterizer),
            inference.clone(),
            AnalysisConfig::default(),
        );
        Self {
            blobs,
            kv,
            inference,
            pipeline,
        }
    }
}
