//! Checkpoint persistence keyed by content id.
//!
//! Each checkpoint lives at `<root>/<content_id>.resume` as a JSON envelope
//! carrying the engine payload (base64) and its SHA-256 digest. Writes go
//! through a temp file in the same directory and a rename, so a reader sees
//! either the previous envelope or the new one. Envelopes that fail
//! verification are reported as absent by [`ResumeStore::load`].

use std::io::Write as _;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use ferry_torrent_core::ContentId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

const EXTENSION: &str = "resume";
const ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointEnvelope {
    version: u32,
    content_id: ContentId,
    saved_at: DateTime<Utc>,
    sha256: String,
    payload: String,
}

/// Summary of one stored checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    /// Content the checkpoint belongs to.
    pub content_id: ContentId,
    /// When it was written.
    pub saved_at: DateTime<Utc>,
    /// Decoded payload size.
    pub payload_bytes: usize,
    /// File holding the envelope.
    pub path: PathBuf,
}

/// Directory of checkpoint envelopes.
#[derive(Debug, Clone)]
pub struct ResumeStore {
    root: PathBuf,
}

impl ResumeStore {
    /// Use `root` as the checkpoint namespace. Created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Namespace directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds the checkpoint for `id`.
    #[must_use]
    pub fn path_for(&self, id: &ContentId) -> PathBuf {
        self.root.join(format!("{id}.{EXTENSION}"))
    }

    /// Atomically replace the checkpoint for `id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the namespace cannot be created or the envelope
    /// cannot be written.
    pub async fn save(&self, id: &ContentId, payload: &[u8]) -> StoreResult<PathBuf> {
        let envelope = CheckpointEnvelope {
            version: ENVELOPE_VERSION,
            content_id: id.clone(),
            saved_at: Utc::now(),
            sha256: digest(payload),
            payload: STANDARD.encode(payload),
        };
        let root = self.root.clone();
        let path = self.path_for(id);
        tokio::task::spawn_blocking(move || write_atomically(&root, &path, &envelope))
            .await
            .map_err(|source| StoreError::Join { source })?
    }

    /// Payload for `id`, or `None` when absent or unusable.
    ///
    /// Unreadable and corrupt envelopes are logged and skipped so the caller
    /// proceeds as a fresh transfer.
    pub async fn load(&self, id: &ContentId) -> Option<Vec<u8>> {
        match self.load_verified(id).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(content_id = %id, error = %err, detail = ?err, "ignoring unusable checkpoint");
                None
            }
        }
    }

    /// Payload for `id`, surfacing verification failures.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read, decoded or
    /// verified.
    pub async fn load_verified(&self, id: &ContentId) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(content_id = %id, "no checkpoint stored");
                return Ok(None);
            }
            Err(err) => return Err(StoreError::io("checkpoint.read", &path, err)),
        };
        let envelope = decode_envelope(&path, &bytes)?;
        if &envelope.content_id != id {
            return Err(StoreError::corrupt(&path, "content id mismatch"));
        }
        verify_payload(&path, &envelope).map(Some)
    }

    /// Delete the checkpoint for `id`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be removed.
    pub async fn remove(&self, id: &ContentId) -> StoreResult<bool> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::io("checkpoint.remove", &path, err)),
        }
    }

    /// Every verifiable checkpoint, sorted by content id.
    ///
    /// Files that fail verification are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an error when the namespace exists but cannot be listed.
    pub async fn list(&self) -> StoreResult<Vec<CheckpointInfo>> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StoreError::io("checkpoint.list", &self.root, err)),
        };
        let mut infos = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|err| StoreError::io("checkpoint.list", &self.root, err))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let summary = match tokio::fs::read(&path).await {
                Ok(bytes) => decode_envelope(&path, &bytes).and_then(|envelope| {
                    let payload = verify_payload(&path, &envelope)?;
                    Ok(CheckpointInfo {
                        content_id: envelope.content_id,
                        saved_at: envelope.saved_at,
                        payload_bytes: payload.len(),
                        path: path.clone(),
                    })
                }),
                Err(err) => Err(StoreError::io("checkpoint.read", &path, err)),
            };
            match summary {
                Ok(info) => infos.push(info),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unusable checkpoint"),
            }
        }
        infos.sort_by(|left, right| left.content_id.cmp(&right.content_id));
        Ok(infos)
    }
}

fn digest(payload: &[u8]) -> String {
    format!("{:x}", Sha256::digest(payload))
}

fn decode_envelope(path: &Path, bytes: &[u8]) -> StoreResult<CheckpointEnvelope> {
    let envelope: CheckpointEnvelope = serde_json::from_slice(bytes)
        .map_err(|err| StoreError::json("checkpoint.decode", path, err))?;
    if envelope.version != ENVELOPE_VERSION {
        return Err(StoreError::corrupt(path, "unsupported envelope version"));
    }
    Ok(envelope)
}

fn verify_payload(path: &Path, envelope: &CheckpointEnvelope) -> StoreResult<Vec<u8>> {
    let payload = STANDARD
        .decode(envelope.payload.as_bytes())
        .map_err(|_| StoreError::corrupt(path, "payload is not base64"))?;
    if digest(&payload) != envelope.sha256 {
        return Err(StoreError::corrupt(path, "digest mismatch"));
    }
    Ok(payload)
}

fn write_atomically(
    root: &Path,
    path: &Path,
    envelope: &CheckpointEnvelope,
) -> StoreResult<PathBuf> {
    std::fs::create_dir_all(root).map_err(|err| StoreError::io("checkpoint.mkdir", root, err))?;
    let body =
        serde_json::to_vec(envelope).map_err(|err| StoreError::json("checkpoint.encode", path, err))?;
    let mut staging =
        NamedTempFile::new_in(root).map_err(|err| StoreError::io("checkpoint.stage", root, err))?;
    staging
        .write_all(&body)
        .and_then(|()| staging.as_file().sync_all())
        .map_err(|err| StoreError::io("checkpoint.write", staging.path(), err))?;
    staging
        .persist(path)
        .map_err(|err| StoreError::io("checkpoint.persist", path, err.error))?;
    debug!(path = %path.display(), "checkpoint saved");
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> ContentId {
        ContentId::from_canonical(value).expect("canonical id")
    }

    #[tokio::test]
    async fn save_then_load_round_trips() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = ResumeStore::new(temp.path().join("resume"));
        let path = store.save(&id("abc123"), b"engine-state").await?;
        assert_eq!(path, temp.path().join("resume/abc123.resume"));
        assert_eq!(store.load(&id("abc123")).await, Some(b"engine-state".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn checkpoints_are_isolated_per_id() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = ResumeStore::new(temp.path());
        store.save(&id("aaa"), b"first").await?;
        store.save(&id("bbb"), b"second").await?;
        store.save(&id("aaa"), b"first-updated").await?;

        assert_eq!(store.load(&id("bbb")).await, Some(b"second".to_vec()));
        assert_eq!(store.load(&id("aaa")).await, Some(b"first-updated".to_vec()));
        assert!(store.remove(&id("aaa")).await?);
        assert_eq!(store.load(&id("bbb")).await, Some(b"second".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn missing_checkpoint_is_none() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = ResumeStore::new(temp.path());
        assert_eq!(store.load_verified(&id("nothing")).await?, None);
        assert!(!store.remove(&id("nothing")).await?);
        assert!(store.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_checkpoints_are_treated_as_absent() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = ResumeStore::new(temp.path());
        let path = store.save(&id("abc"), b"payload").await?;

        let mut envelope: serde_json::Value = serde_json::from_slice(&std::fs::read(&path)?)?;
        envelope["payload"] = serde_json::Value::String(STANDARD.encode(b"tampered"));
        std::fs::write(&path, serde_json::to_vec(&envelope)?)?;

        assert!(matches!(
            store.load_verified(&id("abc")).await,
            Err(StoreError::Corrupt {
                reason: "digest mismatch",
                ..
            })
        ));
        assert_eq!(store.load(&id("abc")).await, None);

        std::fs::write(&path, b"{truncated")?;
        assert_eq!(store.load(&id("abc")).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn misfiled_envelope_is_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = ResumeStore::new(temp.path());
        let source = store.save(&id("one"), b"x").await?;
        std::fs::copy(&source, store.path_for(&id("two")))?;
        assert!(matches!(
            store.load_verified(&id("two")).await,
            Err(StoreError::Corrupt {
                reason: "content id mismatch",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn list_reports_valid_checkpoints_only() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = ResumeStore::new(temp.path());
        store.save(&id("bbb"), b"12").await?;
        store.save(&id("aaa"), b"1234").await?;
        std::fs::write(temp.path().join("junk.resume"), b"nope")?;
        std::fs::write(temp.path().join("notes.txt"), b"ignored")?;

        let listed = store.list().await?;
        let ids: Vec<_> = listed.iter().map(|info| info.content_id.as_str()).collect();
        assert_eq!(ids, vec!["aaa", "bbb"]);
        assert_eq!(listed[0].payload_bytes, 4);
        Ok(())
    }
}
