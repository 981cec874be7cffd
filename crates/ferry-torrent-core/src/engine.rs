//! Capability traits implemented by swarm engine adapters.
//!
//! Adapters report `anyhow` errors; controllers fold them into
//! [`crate::TransferError::EngineError`] at the operation boundary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use uuid::Uuid;

use crate::descriptor::ContentDescriptor;
use crate::model::{EngineStatus, FileManifestEntry, FilePriority, SessionSettings};

/// Identifier of one registered handle.
pub type HandleId = Uuid;

/// Request to register content with a running engine session.
#[derive(Debug, Clone)]
pub struct AddTransfer {
    /// What to fetch.
    pub descriptor: ContentDescriptor,
    /// Where payload bytes are written.
    pub save_path: PathBuf,
    /// Checkpoint bytes from an earlier run.
    pub resume: Option<Vec<u8>>,
    /// Register held: metadata is discovered but no payload is requested
    /// until [`EngineHandle::resume`].
    pub hold: bool,
}

/// Builds the shared engine session.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    /// Bring up a session with the given policy.
    async fn start(&self, settings: &SessionSettings) -> anyhow::Result<Arc<dyn TransferEngine>>;
}

/// Shared engine session.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Register content and return its handle.
    async fn add(&self, request: AddTransfer) -> anyhow::Result<Arc<dyn EngineHandle>>;

    /// Deregister a handle. Payload data stays on disk.
    async fn remove(&self, id: HandleId) -> anyhow::Result<()>;
}

/// One in-progress transfer inside the engine session.
#[async_trait]
pub trait EngineHandle: Send + Sync {
    /// Identifier assigned at registration.
    fn id(&self) -> HandleId;

    /// Poll counters and flags.
    async fn status(&self) -> anyhow::Result<EngineStatus>;

    /// File table. Empty until metadata is known.
    async fn manifest(&self) -> anyhow::Result<Vec<FileManifestEntry>>;

    /// Apply one priority per manifest entry, in manifest order.
    async fn set_file_priorities(&self, priorities: &[FilePriority]) -> anyhow::Result<()>;

    /// Serialise engine state so a later registration can resume.
    async fn save_checkpoint(&self) -> anyhow::Result<Vec<u8>> {
        bail!("checkpoints not supported by this engine");
    }

    /// Stop requesting data for this handle.
    async fn pause(&self) -> anyhow::Result<()>;

    /// Start or restart requesting data for a held or paused handle.
    async fn resume(&self) -> anyhow::Result<()>;
}
