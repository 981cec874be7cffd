//! Engine-agnostic transfer interfaces, content descriptors and the error taxonomy.
//!
//! Layout: `descriptor.rs` (magnet parsing and tracker augmentation),
//! `model.rs` (manifest, status and selection DTOs), `engine.rs` (engine and
//! handle traits), `error.rs` (closed failure set shared by every controller).

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod model;

pub use descriptor::{ContentDescriptor, ContentId};
pub use engine::{AddTransfer, EngineFactory, EngineHandle, HandleId, TransferEngine};
pub use error::{TransferError, TransferResult, human_bytes};
pub use model::{
    ContentMetadata, EngineStatus, FileManifestEntry, FilePriority, ManifestViolation,
    SelectionPlan, SessionSettings,
};
