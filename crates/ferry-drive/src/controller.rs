//! Upload orchestration: lazy authentication, idempotent folder resolution,
//! chunked upload with throttled progress.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ferry_events::{Severity, TransferObserver};
use ferry_torrent_core::{TransferError, TransferResult, human_bytes};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::backend::{LocalArtifact, StorageBackend};
use crate::token::AccessToken;

/// Folder used when the caller passes a blank name.
pub const DEFAULT_FOLDER: &str = "Torrent";
/// Default progress granularity in percentage points.
pub const DEFAULT_PROGRESS_STEP: u8 = 5;

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Remote file identifier.
    pub file_id: String,
    /// Shareable link when the service returned one.
    pub link: Option<String>,
    /// Folder the file was placed in.
    pub folder_id: String,
    /// Bytes uploaded.
    pub bytes: u64,
}

/// Suppresses progress updates smaller than `step` percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressGate {
    step: u8,
    last: u8,
}

impl ProgressGate {
    /// Gate that opens every `step` points (at least 1).
    #[must_use]
    pub fn new(step: u8) -> Self {
        Self {
            step: step.clamp(1, 100),
            last: 0,
        }
    }

    /// Feed a raw percentage, returning it when it moved far enough.
    pub fn observe(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        if percent.saturating_sub(self.last) >= self.step {
            self.last = percent;
            Some(percent)
        } else {
            None
        }
    }

    /// The closing 100 %, unless it was already reported.
    pub const fn finish(&mut self) -> Option<u8> {
        if self.last >= 100 {
            None
        } else {
            self.last = 100;
            Some(100)
        }
    }
}

/// Whole percent of `done` over `total`; an empty total counts as complete.
#[must_use]
pub fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = u128::from(done.min(total)) * 100 / u128::from(total);
    u8::try_from(scaled).unwrap_or(100)
}

/// Places local artifacts into named remote folders.
///
/// Credentials are obtained on first use and cached; folder identifiers are
/// cached per name so repeated sends reuse one folder.
pub struct UploadController {
    backend: Arc<dyn StorageBackend>,
    observer: Arc<dyn TransferObserver>,
    progress_step: u8,
    token: Mutex<Option<AccessToken>>,
    folders: Mutex<HashMap<String, String>>,
}

impl UploadController {
    /// Controller reporting to `observer`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, observer: Arc<dyn TransferObserver>) -> Self {
        Self {
            backend,
            observer,
            progress_step: DEFAULT_PROGRESS_STEP,
            token: Mutex::new(None),
            folders: Mutex::new(HashMap::new()),
        }
    }

    /// Override the progress granularity.
    #[must_use]
    pub const fn with_progress_step(mut self, step: u8) -> Self {
        self.progress_step = step;
        self
    }

    /// Upload `path` into the folder named `folder`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::LocalFileUnreadable`],
    /// [`TransferError::AuthenticationFailed`] or
    /// [`TransferError::RemoteApiError`]. Every failure is also reported once
    /// through the observer.
    pub async fn send(&self, path: &Path, folder: &str) -> TransferResult<UploadReceipt> {
        match self.try_send(path, folder).await {
            Ok(receipt) => Ok(receipt),
            Err(err) => {
                if matches!(err, TransferError::AuthenticationFailed { .. }) {
                    self.token.lock().await.take();
                }
                warn!(error = %err, kind = err.kind(), path = %path.display(), "upload failed");
                self.observer.on_status(
                    &format!("Upload failed: {}", err.describe()),
                    Severity::Error,
                );
                Err(err)
            }
        }
    }

    async fn try_send(&self, path: &Path, folder: &str) -> TransferResult<UploadReceipt> {
        let artifact = LocalArtifact::inspect(path).await?;
        let token = self.access_token().await?;
        let folder = match folder.trim() {
            "" => DEFAULT_FOLDER,
            name => name,
        };
        let folder_id = self.resolve_folder(&token, folder).await?;

        self.observer.on_status(
            &format!(
                "Uploading {} ({})",
                artifact.name,
                human_bytes(artifact.size_bytes)
            ),
            Severity::Info,
        );
        let total = artifact.size_bytes;
        let mut gate = ProgressGate::new(self.progress_step);
        let observer = Arc::clone(&self.observer);
        let mut on_bytes = |sent: u64| {
            if let Some(percent) = gate.observe(percent_of(sent, total)) {
                observer.on_upload_progress(percent);
            }
        };
        let remote = self
            .backend
            .upload(&token, &artifact, &folder_id, &mut on_bytes)
            .await?;
        if let Some(percent) = gate.finish() {
            self.observer.on_upload_progress(percent);
        }

        info!(file = %artifact.name, file_id = %remote.id, "upload complete");
        self.observer
            .on_status("Upload complete", Severity::Success);
        self.observer.on_status(
            &format!("Link: {}", remote.link.as_deref().unwrap_or("N/A")),
            Severity::Success,
        );
        Ok(UploadReceipt {
            file_id: remote.id,
            link: remote.link,
            folder_id,
            bytes: total,
        })
    }

    async fn access_token(&self) -> TransferResult<AccessToken> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        self.observer.on_status("Authenticating...", Severity::Info);
        let token = self.backend.authenticate().await?;
        self.observer.on_status("Authenticated", Severity::Success);
        *cached = Some(token.clone());
        Ok(token)
    }

    async fn resolve_folder(&self, token: &AccessToken, name: &str) -> TransferResult<String> {
        let mut folders = self.folders.lock().await;
        self.observer
            .on_status(&format!("Folder: {name}"), Severity::Info);
        if let Some(id) = folders.get(name) {
            return Ok(id.clone());
        }
        let id = match self.backend.find_folder(token, name).await? {
            Some(id) => id,
            None => self.backend.create_folder(token, name).await?,
        };
        folders.insert(name.to_string(), id.clone());
        Ok(id)
    }
}
