//! In-process engine that simulates a swarm from a static catalog.
//!
//! Every status poll after metadata is known moves a fixed number of bytes
//! into the wanted files, in manifest order, unless the handle is held or
//! paused. Completed files are created as
//! sparse files under the save path. Checkpoints record per-file byte counts,
//! so a handle registered with one picks up where the previous handle stopped.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, bail};
use async_trait::async_trait;
use ferry_torrent_core::{
    AddTransfer, ContentDescriptor, ContentId, EngineFactory, EngineHandle, EngineStatus,
    FileManifestEntry, FilePriority, HandleId, SessionSettings, TransferEngine,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

const SYNTHETIC_SIZE: u64 = 4 * 1024 * 1024;
const SYNTHETIC_STEP: u64 = 512 * 1024;
const SIMULATED_PEERS: u32 = 4;

/// Content served by the loopback engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackContent {
    /// Display name reported once metadata is known.
    pub name: String,
    /// `(relative path, size)` per file, in manifest order.
    pub files: Vec<(String, u64)>,
    /// Status polls before metadata appears; `None` never delivers it.
    pub metadata_after_polls: Option<u32>,
    /// Bytes acquired per status poll.
    pub bytes_per_poll: u64,
    /// Status polls after which every further poll fails.
    pub fail_status_after: Option<u32>,
}

impl LoopbackContent {
    /// Content whose metadata arrives on the first poll and whose bytes
    /// arrive on the next one.
    #[must_use]
    pub fn new(name: impl Into<String>, files: Vec<(String, u64)>) -> Self {
        Self {
            name: name.into(),
            files,
            metadata_after_polls: Some(1),
            bytes_per_poll: u64::MAX,
            fail_status_after: None,
        }
    }

    /// Single-file stand-in for descriptors missing from the catalog.
    #[must_use]
    pub fn synthetic(descriptor: &ContentDescriptor) -> Self {
        let name = descriptor
            .display_name()
            .map_or_else(|| descriptor.content_id().to_string(), str::to_string);
        Self {
            files: vec![(name.clone(), SYNTHETIC_SIZE)],
            name,
            metadata_after_polls: Some(2),
            bytes_per_poll: SYNTHETIC_STEP,
            fail_status_after: None,
        }
    }

    /// Deliver metadata on poll `polls`.
    #[must_use]
    pub const fn metadata_after(mut self, polls: u32) -> Self {
        self.metadata_after_polls = Some(polls);
        self
    }

    /// Never deliver metadata.
    #[must_use]
    pub const fn without_metadata(mut self) -> Self {
        self.metadata_after_polls = None;
        self
    }

    /// Acquire `bytes` per poll.
    #[must_use]
    pub const fn bytes_per_poll(mut self, bytes: u64) -> Self {
        self.bytes_per_poll = bytes;
        self
    }

    /// Fail every status poll after the first `polls`.
    #[must_use]
    pub const fn failing_after(mut self, polls: u32) -> Self {
        self.fail_status_after = Some(polls);
        self
    }

    fn manifest(&self) -> Vec<FileManifestEntry> {
        self.files
            .iter()
            .zip(0_u32..)
            .map(|((path, size), index)| FileManifestEntry {
                index,
                relative_path: path.clone(),
                size_bytes: *size,
            })
            .collect()
    }
}

/// What one registered handle did, kept after the handle is removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackHandleStats {
    /// Content the handle served.
    pub content_id: ContentId,
    /// Bytes restored from the checkpoint at registration.
    pub resumed_bytes: u64,
    /// Bytes this handle acquired itself.
    pub bytes_requested: u64,
    /// Every priority vector applied, oldest first.
    pub priority_history: Vec<Vec<FilePriority>>,
    /// Status polls served.
    pub status_polls: u32,
    /// Checkpoints serialised.
    pub checkpoints: u32,
    /// Pause calls received.
    pub pauses: u32,
    /// Resume calls received.
    pub resumes: u32,
    /// Registered held.
    pub held: bool,
    /// Whether the handle was deregistered.
    pub removed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct LoopbackCheckpoint {
    content_id: ContentId,
    done: Vec<u64>,
}

struct HandleState {
    content_id: ContentId,
    content: LoopbackContent,
    save_path: PathBuf,
    polls: u32,
    metadata_seen: bool,
    paused: bool,
    done: Vec<u64>,
    priorities: Vec<FilePriority>,
    materialised: Vec<bool>,
    stats: usize,
}

impl HandleState {
    fn wanted(&self, index: usize) -> bool {
        self.priorities
            .get(index)
            .is_some_and(|priority| *priority != FilePriority::Skip)
    }

    fn totals(&self) -> (u64, u64) {
        self.content
            .files
            .iter()
            .enumerate()
            .filter(|(index, _)| self.wanted(*index))
            .fold((0, 0), |(wanted, done), (index, (_, size))| {
                (wanted + size, done + self.done[index].min(*size))
            })
    }

    fn advance(&mut self) -> u64 {
        let mut budget = self.content.bytes_per_poll;
        let mut moved = 0;
        for index in 0..self.content.files.len() {
            if budget == 0 {
                break;
            }
            if !self.wanted(index) {
                continue;
            }
            let size = self.content.files[index].1;
            let take = size.saturating_sub(self.done[index]).min(budget);
            self.done[index] += take;
            budget -= take;
            moved += take;
        }
        moved
    }

    fn newly_complete(&mut self) -> Vec<(PathBuf, u64)> {
        let mut ready = Vec::new();
        for (index, (relative, size)) in self.content.files.iter().enumerate() {
            if self.materialised[index] || !self.wanted(index) || self.done[index] < *size {
                continue;
            }
            self.materialised[index] = true;
            if is_plain_relative(relative) {
                ready.push((self.save_path.join(relative), *size));
            }
        }
        ready
    }
}

fn is_plain_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[derive(Default)]
struct LoopbackState {
    catalog: HashMap<ContentId, LoopbackContent>,
    handles: HashMap<HandleId, HandleState>,
    stats: Vec<LoopbackHandleStats>,
}

/// Simulated engine session.
#[derive(Clone, Default)]
pub struct LoopbackEngine {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackEngine {
    /// Empty catalog; every descriptor gets synthetic content.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` for descriptors whose content id is `id`.
    pub fn insert(&self, id: ContentId, content: LoopbackContent) {
        self.lock().catalog.insert(id, content);
    }

    /// Builder form of [`LoopbackEngine::insert`].
    #[must_use]
    pub fn with_content(self, id: ContentId, content: LoopbackContent) -> Self {
        self.insert(id, content);
        self
    }

    /// Stats for every handle ever registered for `id`, oldest first.
    #[must_use]
    pub fn stats_for(&self, id: &ContentId) -> Vec<LoopbackHandleStats> {
        self.lock()
            .stats
            .iter()
            .filter(|stats| &stats.content_id == id)
            .cloned()
            .collect()
    }

    /// Handles currently registered.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.lock().handles.len()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TransferEngine for LoopbackEngine {
    async fn add(&self, request: AddTransfer) -> anyhow::Result<Arc<dyn EngineHandle>> {
        let content_id = request.descriptor.content_id().clone();
        let id = Uuid::new_v4();
        let mut state = self.lock();
        let content = state
            .catalog
            .get(&content_id)
            .cloned()
            .unwrap_or_else(|| LoopbackContent::synthetic(&request.descriptor));
        let file_count = content.files.len();
        let mut done = vec![0; file_count];
        if let Some(bytes) = request.resume.as_deref() {
            match serde_json::from_slice::<LoopbackCheckpoint>(bytes) {
                Ok(checkpoint)
                    if checkpoint.content_id == content_id && checkpoint.done.len() == file_count =>
                {
                    for ((slot, stored), (_, size)) in
                        done.iter_mut().zip(checkpoint.done).zip(&content.files)
                    {
                        *slot = stored.min(*size);
                    }
                }
                Ok(_) => warn!(content_id = %content_id, "resume data does not match content"),
                Err(err) => warn!(content_id = %content_id, error = %err, "resume data unreadable"),
            }
        }
        let resumed_bytes = done.iter().sum();

        let stats = state.stats.len();
        state.stats.push(LoopbackHandleStats {
            content_id: content_id.clone(),
            resumed_bytes,
            bytes_requested: 0,
            priority_history: Vec::new(),
            status_polls: 0,
            checkpoints: 0,
            pauses: 0,
            resumes: 0,
            held: request.hold,
            removed: false,
        });
        state.handles.insert(
            id,
            HandleState {
                content_id: content_id.clone(),
                content,
                save_path: request.save_path,
                polls: 0,
                metadata_seen: false,
                paused: request.hold,
                done,
                priorities: vec![FilePriority::Normal; file_count],
                materialised: vec![false; file_count],
                stats,
            },
        );
        debug!(handle = %id, content_id = %content_id, resumed_bytes, "loopback handle added");
        Ok(Arc::new(LoopbackHandle {
            id,
            engine: self.clone(),
        }))
    }

    async fn remove(&self, id: HandleId) -> anyhow::Result<()> {
        let mut state = self.lock();
        let Some(handle) = state.handles.remove(&id) else {
            bail!("unknown loopback handle {id}");
        };
        state.stats[handle.stats].removed = true;
        Ok(())
    }
}

struct LoopbackHandle {
    id: HandleId,
    engine: LoopbackEngine,
}

impl LoopbackHandle {
    fn with_state<T>(
        &self,
        apply: impl FnOnce(&mut HandleState, &mut LoopbackHandleStats) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut guard = self.engine.lock();
        let LoopbackState { handles, stats, .. } = &mut *guard;
        let Some(handle) = handles.get_mut(&self.id) else {
            bail!("unknown loopback handle {}", self.id);
        };
        let stats = &mut stats[handle.stats];
        apply(handle, stats)
    }
}

#[async_trait]
impl EngineHandle for LoopbackHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    async fn status(&self) -> anyhow::Result<EngineStatus> {
        let (status, ready) = self.with_state(|handle, stats| {
            handle.polls += 1;
            stats.status_polls += 1;
            if handle
                .content
                .fail_status_after
                .is_some_and(|limit| handle.polls > limit)
            {
                bail!("simulated engine failure on poll {}", handle.polls);
            }

            let has_metadata = handle
                .content
                .metadata_after_polls
                .is_some_and(|after| handle.polls >= after);
            let mut moved = 0;
            if has_metadata && handle.metadata_seen && !handle.paused {
                moved = handle.advance();
                stats.bytes_requested += moved;
            }
            handle.metadata_seen |= has_metadata;

            let (total_wanted, total_wanted_done) = handle.totals();
            let status = EngineStatus {
                has_metadata,
                name: has_metadata.then(|| handle.content.name.clone()),
                total_wanted,
                total_wanted_done,
                download_rate_bps: moved,
                upload_rate_bps: 0,
                peers: if has_metadata { SIMULATED_PEERS } else { 0 },
                is_finished: has_metadata && total_wanted_done >= total_wanted,
            };
            let ready = if has_metadata {
                handle.newly_complete()
            } else {
                Vec::new()
            };
            Ok((status, ready))
        })?;

        for (path, size) in ready {
            materialise(&path, size).await?;
        }
        Ok(status)
    }

    async fn manifest(&self) -> anyhow::Result<Vec<FileManifestEntry>> {
        self.with_state(|handle, _| {
            Ok(if handle.metadata_seen {
                handle.content.manifest()
            } else {
                Vec::new()
            })
        })
    }

    async fn set_file_priorities(&self, priorities: &[FilePriority]) -> anyhow::Result<()> {
        self.with_state(|handle, stats| {
            if priorities.len() != handle.content.files.len() {
                bail!(
                    "expected {} priorities, received {}",
                    handle.content.files.len(),
                    priorities.len()
                );
            }
            handle.priorities = priorities.to_vec();
            stats.priority_history.push(priorities.to_vec());
            Ok(())
        })
    }

    async fn save_checkpoint(&self) -> anyhow::Result<Vec<u8>> {
        self.with_state(|handle, stats| {
            stats.checkpoints += 1;
            let checkpoint = LoopbackCheckpoint {
                content_id: handle.content_id.clone(),
                done: handle.done.clone(),
            };
            serde_json::to_vec(&checkpoint).context("encoding loopback checkpoint")
        })
    }

    async fn pause(&self) -> anyhow::Result<()> {
        self.with_state(|handle, stats| {
            handle.paused = true;
            stats.pauses += 1;
            Ok(())
        })
    }

    async fn resume(&self) -> anyhow::Result<()> {
        self.with_state(|handle, stats| {
            handle.paused = false;
            stats.resumes += 1;
            Ok(())
        })
    }
}

async fn materialise(path: &Path, size: u64) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    file.set_len(size)
        .await
        .with_context(|| format!("sizing {}", path.display()))?;
    Ok(())
}

/// Factory handing out one shared [`LoopbackEngine`].
pub struct LoopbackFactory {
    engine: LoopbackEngine,
    failure: Option<String>,
    starts: AtomicUsize,
    settings: Mutex<Option<SessionSettings>>,
}

impl LoopbackFactory {
    /// Factory that always succeeds with `engine`.
    #[must_use]
    pub const fn new(engine: LoopbackEngine) -> Self {
        Self {
            engine,
            failure: None,
            starts: AtomicUsize::new(0),
            settings: Mutex::new(None),
        }
    }

    /// Factory whose every start fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(LoopbackEngine::new())
        }
    }

    /// How many times a session was requested.
    #[must_use]
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Settings passed to the most recent start.
    #[must_use]
    pub fn last_settings(&self) -> Option<SessionSettings> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl EngineFactory for LoopbackFactory {
    async fn start(&self, settings: &SessionSettings) -> anyhow::Result<Arc<dyn TransferEngine>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        tokio::task::yield_now().await;
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        Ok(Arc::new(self.engine.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str) -> ContentDescriptor {
        ContentDescriptor::parse(&format!("magnet:?xt=urn:btih:{id}&dn=Demo")).expect("descriptor")
    }

    fn request(id: &str, save_path: &Path, resume: Option<Vec<u8>>) -> AddTransfer {
        AddTransfer {
            descriptor: descriptor(id),
            save_path: save_path.to_path_buf(),
            resume,
            hold: false,
        }
    }

    #[tokio::test]
    async fn metadata_then_bytes_then_files() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = LoopbackEngine::new().with_content(
            descriptor("abc").content_id().clone(),
            LoopbackContent::new("Demo", vec![("Demo/a.bin".into(), 10), ("Demo/b.bin".into(), 6)])
                .bytes_per_poll(8),
        );
        let handle = engine.add(request("abc", temp.path(), None)).await?;

        let first = handle.status().await?;
        assert!(first.has_metadata);
        assert_eq!(first.total_wanted_done, 0);
        assert_eq!(handle.manifest().await?.len(), 2);

        handle
            .set_file_priorities(&[FilePriority::Normal, FilePriority::Skip])
            .await?;
        let second = handle.status().await?;
        assert_eq!((second.total_wanted, second.total_wanted_done), (10, 8));
        let third = handle.status().await?;
        assert!(third.is_finished);
        assert_eq!(std::fs::metadata(temp.path().join("Demo/a.bin"))?.len(), 10);
        assert!(!temp.path().join("Demo/b.bin").exists());
        Ok(())
    }

    #[tokio::test]
    async fn checkpoint_restores_progress() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let id = descriptor("abc").content_id().clone();
        let engine = LoopbackEngine::new().with_content(
            id.clone(),
            LoopbackContent::new("Demo", vec![("Demo/a.bin".into(), 100)]).bytes_per_poll(30),
        );
        let first = engine.add(request("abc", temp.path(), None)).await?;
        first.status().await?;
        first.status().await?;
        let checkpoint = first.save_checkpoint().await?;
        first.pause().await?;
        engine.remove(first.id()).await?;

        let second = engine.add(request("abc", temp.path(), Some(checkpoint))).await?;
        let status = second.status().await?;
        assert_eq!(status.total_wanted_done, 30);

        let stats = engine.stats_for(&id);
        assert_eq!(stats.len(), 2);
        assert!(stats[0].removed);
        assert_eq!(stats[1].resumed_bytes, 30);
        assert_eq!(engine.live_handles(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn paused_handles_stop_acquiring() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = LoopbackEngine::new().with_content(
            descriptor("abc").content_id().clone(),
            LoopbackContent::new("Demo", vec![("a".into(), 100)]).bytes_per_poll(10),
        );
        let handle = engine.add(request("abc", temp.path(), None)).await?;
        handle.status().await?;
        handle.status().await?;
        handle.pause().await?;
        let status = handle.status().await?;
        assert_eq!(status.total_wanted_done, 10);
        Ok(())
    }

    #[tokio::test]
    async fn held_handles_wait_for_resume() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let id = descriptor("abc").content_id().clone();
        let engine = LoopbackEngine::new().with_content(
            id.clone(),
            LoopbackContent::new("Demo", vec![("a".into(), 100)]).bytes_per_poll(10),
        );
        let held = AddTransfer {
            hold: true,
            ..request("abc", temp.path(), None)
        };
        let handle = engine.add(held).await?;
        for _ in 0..3 {
            let status = handle.status().await?;
            assert!(status.has_metadata);
            assert_eq!(status.total_wanted_done, 0);
        }
        assert_eq!(handle.manifest().await?.len(), 1);

        handle.resume().await?;
        assert_eq!(handle.status().await?.total_wanted_done, 10);
        let stats = engine.stats_for(&id);
        assert!(stats[0].held);
        assert_eq!(stats[0].resumes, 1);
        assert_eq!(stats[0].bytes_requested, 10);
        Ok(())
    }

    #[tokio::test]
    async fn factory_failure_is_reported() {
        let factory = LoopbackFactory::failing("bind failed");
        let result = factory.start(&SessionSettings::default()).await;
        assert!(result.is_err());
        assert_eq!(factory.starts(), 1);
        assert_eq!(factory.last_settings(), Some(SessionSettings::default()));
    }
}
