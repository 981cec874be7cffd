//! Transfer state machine.
//!
//! One controller drives one transfer: metadata discovery, manifest
//! validation, selection and free-space preflight, the download itself with
//! periodic checkpoints, then optional packaging. `analyze` and `fetch`
//! consume the controller; a retry needs a fresh one.
//!
//! Every wait is a sleep raced against the stop token, so a stop is noticed
//! within one poll interval. Failures are reported once through the observer
//! and returned to the caller; the engine handle is released on every path.

use std::collections::BTreeSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ferry_events::{ProgressSample, Severity, TransferObserver, TransferState};
use ferry_fsops::{
    ArchiveJob, ArchiveReport, ArchiveSelection, SpaceProbe, StatvfsProbe, has_room,
    validate_manifest, with_margin,
};
use ferry_session::{EngineSessionRegistry, ResumeStore};
use ferry_torrent_core::{
    AddTransfer, ContentDescriptor, ContentId, ContentMetadata, EngineHandle, SelectionPlan,
    TransferError, TransferResult, human_bytes,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::policy::{METADATA_CHATTER_TICKS, TransferPolicy};

/// Cooperative stop signal for one controller.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Ask the controller to stop at its next wait.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Packaging options for a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveRequest {
    /// Archive base name; derived from the content name when `None`.
    pub name_override: Option<String>,
}

/// Input to [`TransferController::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Magnet URI.
    pub descriptor: String,
    /// Destination root, created if absent.
    pub destination: PathBuf,
    /// Manifest indices to fetch; `None` fetches everything.
    pub selection: Option<BTreeSet<u32>>,
    /// Union the policy's trackers into the descriptor.
    pub add_trackers: bool,
    /// Package the output once complete.
    pub archive: Option<ArchiveRequest>,
}

impl FetchRequest {
    /// Fetch everything, with tracker augmentation and no packaging.
    #[must_use]
    pub fn new(descriptor: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            descriptor: descriptor.into(),
            destination: destination.into(),
            selection: None,
            add_trackers: true,
            archive: None,
        }
    }

    /// Restrict the fetch to `indices`.
    #[must_use]
    pub fn with_selection(mut self, indices: impl IntoIterator<Item = u32>) -> Self {
        self.selection = Some(indices.into_iter().collect());
        self
    }

    /// Toggle tracker augmentation.
    #[must_use]
    pub const fn with_trackers(mut self, enabled: bool) -> Self {
        self.add_trackers = enabled;
        self
    }

    /// Package the output, optionally under `name_override`.
    #[must_use]
    pub fn with_archive(mut self, name_override: Option<String>) -> Self {
        self.archive = Some(ArchiveRequest { name_override });
        self
    }
}

/// Summary of a completed fetch.
#[derive(Debug)]
pub struct FetchReport {
    /// Content identifier.
    pub content_id: ContentId,
    /// Display name reported by the engine.
    pub name: String,
    /// Bytes selected for download.
    pub selected_bytes: u64,
    /// Number of manifest entries fetched.
    pub selected_files: usize,
    /// Destination root.
    pub destination: PathBuf,
    /// Packaging result when one was requested. A failure here does not
    /// fail the fetch.
    pub archive: Option<Result<ArchiveReport, TransferError>>,
}

/// How a fetch ended without an error.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Every selected byte was acquired.
    Completed(FetchReport),
    /// Stopped by the caller; a checkpoint was attempted when downloading.
    Stopped,
}

/// Drives one transfer through the state machine.
pub struct TransferController {
    registry: Arc<EngineSessionRegistry>,
    store: ResumeStore,
    observer: Arc<dyn TransferObserver>,
    policy: TransferPolicy,
    space: Arc<dyn SpaceProbe>,
    cancel: CancellationToken,
    state_tx: watch::Sender<TransferState>,
}

impl TransferController {
    /// Controller in the `Created` state probing free space with `statvfs`.
    #[must_use]
    pub fn new(
        registry: Arc<EngineSessionRegistry>,
        store: ResumeStore,
        observer: Arc<dyn TransferObserver>,
        policy: TransferPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(TransferState::Created);
        Self {
            registry,
            store,
            observer,
            policy,
            space: Arc::new(StatvfsProbe),
            cancel: CancellationToken::new(),
            state_tx,
        }
    }

    /// Replace the free-space probe.
    #[must_use]
    pub fn with_space_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.space = probe;
        self
    }

    /// Handle that stops this controller from another task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.cancel.clone(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TransferState {
        self.state_tx.borrow().clone()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<TransferState> {
        self.state_tx.subscribe()
    }

    /// Discover the manifest without downloading payload bytes.
    ///
    /// The handle writes into a scratch directory that is removed afterwards.
    /// Returns `Ok(None)` when stopped before metadata arrived.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor`, `MetadataTimeout`, `EngineError` or
    /// `StorageError`.
    pub async fn analyze(self, descriptor: &str) -> TransferResult<Option<ContentMetadata>> {
        let result = self.run_analyze(descriptor).await;
        self.conclude(result)
    }

    /// Download the requested content, resuming from a stored checkpoint.
    ///
    /// # Errors
    ///
    /// Returns any taxonomy variant except the upload ones. Packaging
    /// failures are reported in [`FetchReport::archive`] instead.
    pub async fn fetch(self, request: FetchRequest) -> TransferResult<FetchOutcome> {
        let result = self.run_fetch(&request).await;
        self.conclude(result)
    }

    async fn run_analyze(&self, input: &str) -> TransferResult<Option<ContentMetadata>> {
        let descriptor = self.prepare(input, self.policy.add_trackers)?;
        let fallback = fallback_name(&descriptor);
        let scratch = tempfile::Builder::new()
            .prefix("ferry-analyze-")
            .tempdir()
            .map_err(|err| TransferError::storage("analyze.scratch", std::env::temp_dir(), err))?;

        self.status("Initializing engine...", Severity::Info);
        self.transition(TransferState::DiscoveringMetadata);
        let handle = self
            .registry
            .register(AddTransfer {
                descriptor,
                save_path: scratch.path().to_path_buf(),
                resume: None,
                hold: true,
            })
            .await?;
        self.status("Fetching metadata...", Severity::Info);
        let metadata = self.await_metadata(&handle, &fallback).await;
        self.release(&handle).await;

        let Some(metadata) = metadata? else {
            self.stopped();
            return Ok(None);
        };
        self.transition(TransferState::MetadataReady);
        self.status(&metadata.name, Severity::Success);
        self.status(
            &format!(
                "{}, {} files",
                human_bytes(metadata.total_bytes),
                metadata.files.len()
            ),
            Severity::Info,
        );
        Ok(Some(metadata))
    }

    async fn run_fetch(&self, request: &FetchRequest) -> TransferResult<FetchOutcome> {
        let descriptor = self.prepare(&request.descriptor, request.add_trackers)?;
        tokio::fs::create_dir_all(&request.destination)
            .await
            .map_err(|err| TransferError::storage("destination.create", &request.destination, err))?;

        let content_id = descriptor.content_id().clone();
        let fallback = fallback_name(&descriptor);
        let resume = self.store.load(&content_id).await;
        if resume.is_some() {
            info!(content_id = %content_id, "resuming from checkpoint");
            self.status("Resuming from checkpoint", Severity::Info);
        }

        self.status("Starting download engine...", Severity::Info);
        self.transition(TransferState::DiscoveringMetadata);
        let handle = self
            .registry
            .register(AddTransfer {
                descriptor,
                save_path: request.destination.clone(),
                resume,
                hold: true,
            })
            .await?;
        self.status("Getting metadata...", Severity::Info);
        let outcome = self
            .drive(&handle, &content_id, &fallback, request)
            .await;
        self.release(&handle).await;
        outcome
    }

    async fn drive(
        &self,
        handle: &Arc<dyn EngineHandle>,
        content_id: &ContentId,
        fallback: &str,
        request: &FetchRequest,
    ) -> TransferResult<FetchOutcome> {
        let Some(metadata) = self.await_metadata(handle, fallback).await? else {
            self.stopped();
            return Ok(FetchOutcome::Stopped);
        };
        self.transition(TransferState::MetadataReady);
        self.status(&metadata.name, Severity::Success);

        self.transition(TransferState::Validating);
        validate_manifest(&metadata.files)
            .map_err(|entries| TransferError::UnsafeManifestEntry { entries })?;
        let plan = SelectionPlan::build(&metadata.files, request.selection.as_ref());
        if !plan.ignored.is_empty() {
            let ignored: Vec<String> = plan.ignored.iter().map(ToString::to_string).collect();
            warn!(content_id = %content_id, ignored = ?plan.ignored, "selection names unknown files");
            self.status(
                &format!("Ignoring unknown file indices: {}", ignored.join(", ")),
                Severity::Warning,
            );
        }
        if request.selection.is_some() {
            handle
                .set_file_priorities(&plan.priorities)
                .await
                .map_err(|err| TransferError::engine("handle.set_file_priorities", &err))?;
        }
        self.preflight(&plan, metadata.files.len(), request)?;

        handle
            .resume()
            .await
            .map_err(|err| TransferError::engine("handle.resume", &err))?;
        self.transition(TransferState::Downloading);
        self.status("Downloading...", Severity::Info);
        let finished = self.download(handle, content_id).await?;
        self.checkpoint(handle, content_id).await;
        if !finished {
            self.stopped();
            return Ok(FetchOutcome::Stopped);
        }

        self.transition(TransferState::Completed);
        self.status("Download complete!", Severity::Success);
        info!(content_id = %content_id, bytes = plan.selected_bytes, "transfer complete");
        let archive = match &request.archive {
            Some(archive) => Some(self.package(&metadata, &plan, request, archive).await),
            None => None,
        };
        Ok(FetchOutcome::Completed(FetchReport {
            content_id: content_id.clone(),
            name: metadata.name,
            selected_bytes: plan.selected_bytes,
            selected_files: plan.selected.len(),
            destination: request.destination.clone(),
            archive,
        }))
    }

    fn prepare(&self, input: &str, add_trackers: bool) -> TransferResult<ContentDescriptor> {
        let descriptor = ContentDescriptor::parse(input)?;
        if add_trackers && !self.policy.trackers.is_empty() {
            Ok(descriptor.with_trackers(&self.policy.trackers))
        } else {
            Ok(descriptor)
        }
    }

    async fn await_metadata(
        &self,
        handle: &Arc<dyn EngineHandle>,
        fallback: &str,
    ) -> TransferResult<Option<ContentMetadata>> {
        let deadline = self.policy.metadata_ticks();
        let poll_secs = self.policy.metadata_poll.as_secs().max(1);
        let mut tick = 0_u64;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(None);
            }
            let status = handle
                .status()
                .await
                .map_err(|err| TransferError::engine("handle.status", &err))?;
            if status.has_metadata {
                let files = handle
                    .manifest()
                    .await
                    .map_err(|err| TransferError::engine("handle.manifest", &err))?;
                let name = status
                    .name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| fallback.to_string());
                debug!(name = %name, files = files.len(), ticks = tick, "metadata received");
                return Ok(Some(ContentMetadata::new(name, files)));
            }
            if tick >= deadline {
                return Err(TransferError::MetadataTimeout {
                    timeout: self.policy.metadata_timeout,
                });
            }
            if tick > 0 && tick % METADATA_CHATTER_TICKS == 0 {
                self.status(
                    &format!("Waiting for metadata... {}s", tick * poll_secs),
                    Severity::Info,
                );
            }
            if !self.pause_for(self.policy.metadata_poll).await {
                return Ok(None);
            }
            tick += 1;
        }
    }

    fn preflight(
        &self,
        plan: &SelectionPlan,
        manifest_len: usize,
        request: &FetchRequest,
    ) -> TransferResult<()> {
        let available = self
            .space
            .available_bytes(&request.destination)
            .map_err(|err| {
                TransferError::storage("space.probe", &request.destination, io::Error::other(err))
            })?;
        self.status(
            &format!(
                "{} ({} of {} files) | Free: {}",
                human_bytes(plan.selected_bytes),
                plan.selected.len(),
                manifest_len,
                human_bytes(available)
            ),
            Severity::Info,
        );
        if has_room(plan.selected_bytes, available, self.policy.margin_bp) {
            Ok(())
        } else {
            Err(TransferError::InsufficientSpace {
                required: with_margin(plan.selected_bytes, self.policy.margin_bp),
                available,
            })
        }
    }

    /// Poll until finished (`true`) or stopped (`false`).
    async fn download(
        &self,
        handle: &Arc<dyn EngineHandle>,
        content_id: &ContentId,
    ) -> TransferResult<bool> {
        let mut last_checkpoint = Instant::now();
        loop {
            if self.cancel.is_cancelled() {
                return Ok(false);
            }
            let status = handle
                .status()
                .await
                .map_err(|err| TransferError::engine("handle.status", &err))?;
            let sample = ProgressSample::from_counters(
                status.total_wanted,
                status.total_wanted_done,
                status.download_rate_bps,
                status.upload_rate_bps,
                status.peers,
            );
            self.observer.on_progress(&sample);
            if status.is_finished {
                return Ok(true);
            }
            if last_checkpoint.elapsed() >= self.policy.checkpoint_interval {
                self.checkpoint(handle, content_id).await;
                last_checkpoint = Instant::now();
            }
            if !self.pause_for(self.policy.download_poll).await {
                return Ok(false);
            }
        }
    }

    async fn checkpoint(&self, handle: &Arc<dyn EngineHandle>, content_id: &ContentId) {
        let payload = match handle.save_checkpoint().await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(content_id = %content_id, error = %format!("{err:#}"), "checkpoint not available");
                self.status(
                    &format!("Checkpoint not saved: engine could not serialise state ({err})"),
                    Severity::Warning,
                );
                return;
            }
        };
        match self.store.save(content_id, &payload).await {
            Ok(path) => debug!(content_id = %content_id, path = %path.display(), "checkpoint saved"),
            Err(err) => {
                warn!(content_id = %content_id, error = %err, detail = ?err, "checkpoint write failed");
                let err = TransferError::from(err);
                self.status(
                    &format!("Checkpoint not saved: {}", err.describe()),
                    Severity::Warning,
                );
            }
        }
    }

    async fn package(
        &self,
        metadata: &ContentMetadata,
        plan: &SelectionPlan,
        request: &FetchRequest,
        archive: &ArchiveRequest,
    ) -> Result<ArchiveReport, TransferError> {
        self.status("Creating zip...", Severity::Info);
        let selection = if plan.selects_all() {
            ArchiveSelection::Everything
        } else {
            ArchiveSelection::Entries(
                metadata
                    .files
                    .iter()
                    .filter(|entry| plan.selected.contains(&entry.index))
                    .map(|entry| entry.relative_path.clone())
                    .collect(),
            )
        };
        let job = ArchiveJob {
            destination: request.destination.clone(),
            content_name: metadata.name.clone(),
            name_override: archive.name_override.clone(),
            selection,
        };
        let output = job.output_path();
        match job.run_blocking().await {
            Ok(report) => {
                if !report.skipped.is_empty() {
                    self.status(
                        &format!("Skipped {} missing file(s) while zipping", report.skipped.len()),
                        Severity::Warning,
                    );
                }
                self.status(&format!("Zip: {}", report.path.display()), Severity::Success);
                Ok(report)
            }
            Err(err) => {
                let err = TransferError::ArchiveError {
                    path: output,
                    message: err.detail(),
                };
                warn!(error = %err.describe(), "packaging failed; download kept");
                self.status(&err.describe(), Severity::Warning);
                Err(err)
            }
        }
    }

    /// Sleep for `period` unless stopped first. Returns whether to continue.
    async fn pause_for(&self, period: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(period) => true,
        }
    }

    async fn release(&self, handle: &Arc<dyn EngineHandle>) {
        if let Err(err) = self.registry.release(handle).await {
            warn!(handle = %handle.id(), error = %err.describe(), "handle release failed");
        }
    }

    fn conclude<T>(&self, result: TransferResult<T>) -> TransferResult<T> {
        result.map_err(|err| {
            error!(kind = err.kind(), error = %err.describe(), "transfer failed");
            self.status(&err.describe(), Severity::Error);
            self.transition(TransferState::Failed {
                message: err.describe(),
            });
            err
        })
    }

    fn stopped(&self) {
        self.transition(TransferState::Stopped);
        self.status("Stopped", Severity::Warning);
    }

    fn transition(&self, next: TransferState) {
        debug!(state = next.label(), "transfer state");
        self.observer.on_state(&next);
        self.state_tx.send_modify(|state| *state = next);
    }

    fn status(&self, message: &str, severity: Severity) {
        self.observer.on_status(message, severity);
    }
}

fn fallback_name(descriptor: &ContentDescriptor) -> String {
    descriptor
        .display_name()
        .map_or_else(|| descriptor.content_id().to_string(), str::to_string)
}
