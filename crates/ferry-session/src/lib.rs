#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared engine session ownership and checkpoint persistence.
//!
//! Layout: `registry.rs` (single shared engine session plus live handle
//! tracking), `resume.rs` (checkpoint files keyed by content id),
//! `loopback.rs` (in-process engine used by tests and offline runs),
//! `error.rs` (checkpoint store failures).

pub mod error;
pub mod loopback;
pub mod registry;
pub mod resume;

pub use error::{StoreError, StoreResult};
pub use loopback::{LoopbackContent, LoopbackEngine, LoopbackFactory, LoopbackHandleStats};
pub use registry::EngineSessionRegistry;
pub use resume::{CheckpointInfo, ResumeStore};
