//! Bulk wipe: delete every stored artifact, then flush the key-value
//! namespace.
//!
//! Wiping is best-effort and deliberately not atomic. Each blob is deleted
//! on its own, one at a time; a failure is recorded and the loop moves on.
//! The namespace flush runs exactly once afterwards whatever happened to the
//! blobs, and its failure is reported rather than raised. A partial wipe is
//! a valid end state that the caller sees in the [`WipeReport`].

use crate::error::{DeleteError, ServiceError, WorkflowError};
use crate::store::{BlobStore, FsItem, KeyValueStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Outcome of [`WipeCoordinator::wipe_all`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WipeReport {
    /// Items deleted.
    pub succeeded: usize,
    /// Items whose delete failed, in attempt order.
    pub failed: Vec<FsItem>,
    /// One entry per failed item.
    pub errors: Vec<DeleteError>,
    /// Set when the key-value flush failed.
    pub flush_error: Option<String>,
    /// Set when listing the artifacts failed (workflow only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_error: Option<String>,
}

impl WipeReport {
    /// True when every item and the flush succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.flush_error.is_none() && self.list_error.is_none()
    }
}

/// Deletes stored artifacts and clears the record namespace.
#[derive(Clone)]
pub struct WipeCoordinator {
    blobs: Arc<dyn BlobStore>,
    kv: Arc<dyn KeyValueStore>,
    root: String,
}

impl WipeCoordinator {
    /// `root` is the blob-store directory whose files are wiped.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        kv: Arc<dyn KeyValueStore>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            kv,
            root: root.into(),
        }
    }

    /// Current artifacts under the root. Queried fresh on every call.
    pub async fn list_artifacts(&self) -> Result<Vec<FsItem>, ServiceError> {
        let items = self.blobs.read_dir(&self.root).await?;
        debug!("{} artifacts under '{}'", items.len(), self.root);
        Ok(items)
    }

    /// Delete `items` one by one, then flush the key-value namespace.
    ///
    /// Never fails as a whole: per-item and flush failures are collected in
    /// the report.
    pub async fn wipe_all(&self, items: &[FsItem]) -> WipeReport {
        let mut report = WipeReport::default();

        for item in items {
            match self.blobs.delete(&item.path).await {
                Ok(()) => {
                    debug!("Deleted {}", item.path);
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("Failed to delete {}: {}", item.path, e);
                    report.errors.push(DeleteError {
                        path: item.path.clone(),
                        detail: e.to_string(),
                    });
                    report.failed.push(item.clone());
                }
            }
        }

        if let Err(e) = self.kv.flush().await {
            warn!("Key-value flush failed: {}", e);
            report.flush_error = Some(e.to_string());
        }

        info!(
            "Wipe finished: {} deleted, {} failed{}",
            report.succeeded,
            report.failed.len(),
            if report.flush_error.is_some() {
                ", flush failed"
            } else {
                ""
            }
        );
        report
    }
}

/// States of the interactive wipe flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipeState {
    Idle,
    /// Waiting for the user to confirm or cancel.
    ConfirmPending,
    Wiping,
}

impl fmt::Display for WipeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WipeState::Idle => "idle",
            WipeState::ConfirmPending => "awaiting confirmation",
            WipeState::Wiping => "wiping",
        })
    }
}

/// `Idle → ConfirmPending → Wiping → Idle`, with `ConfirmPending → Idle`
/// on cancel.
///
/// The state sits behind a lock so a UI can poll [`state`](Self::state)
/// while [`confirm`](Self::confirm) runs.
#[derive(Debug)]
pub struct WipeWorkflow {
    state: Mutex<WipeState>,
}

impl Default for WipeWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl WipeWorkflow {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WipeState::Idle),
        }
    }

    pub fn state(&self) -> WipeState {
        *self.lock()
    }

    /// The user asked to wipe; wait for confirmation.
    pub fn request(&self) -> Result<(), WorkflowError> {
        self.transition("request a wipe", WipeState::Idle, WipeState::ConfirmPending)
    }

    /// Back out of a pending wipe. No side effects.
    pub fn cancel(&self) -> Result<(), WorkflowError> {
        self.transition("cancel", WipeState::ConfirmPending, WipeState::Idle)
    }

    /// Confirm the pending wipe: list artifacts, wipe them, flush.
    ///
    /// Returns to `Idle` afterwards whatever the outcome, also when the
    /// future is dropped midway.
    pub async fn confirm(
        &self,
        coordinator: &WipeCoordinator,
    ) -> Result<WipeReport, WorkflowError> {
        self.transition("confirm", WipeState::ConfirmPending, WipeState::Wiping)?;
        let _reset = ResetToIdle(self);

        match coordinator.list_artifacts().await {
            Ok(items) => Ok(coordinator.wipe_all(&items).await),
            Err(e) => {
                warn!("Could not list artifacts: {}", e);
                let mut report = coordinator.wipe_all(&[]).await;
                report.list_error = Some(e.to_string());
                Ok(report)
            }
        }
    }

    fn transition(
        &self,
        action: &'static str,
        from: WipeState,
        to: WipeState,
    ) -> Result<(), WorkflowError> {
        let mut state = self.lock();
        if *state != from {
            return Err(WorkflowError::InvalidTransition {
                action,
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, WipeState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

struct ResetToIdle<'a>(&'a WipeWorkflow);

impl Drop for ResetToIdle<'_> {
    fn drop(&mut self) {
        *self.0.lock() = WipeState::Idle;
    }
}

/// Human-readable size: `0 Bytes`, `512 Bytes`, `1.5 KB`, `2.25 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
