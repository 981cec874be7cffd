//! Filesystem guards and packaging for fetched content.
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
//!
//! Layout: `validate.rs` (manifest path checks), `space.rs` (free-space probing
//! and the preflight margin), `archive.rs` (zip packaging), `outputs.rs`
//! (upload candidate listing), `error.rs` (structured failures).

pub mod archive;
pub mod error;
pub mod outputs;
pub mod space;
pub mod validate;

pub use archive::{ArchiveJob, ArchiveReport, ArchiveSelection, archive_base_name};
pub use error::{FsOpsError, FsOpsResult};
pub use outputs::{OutputEntry, list_outputs};
pub use space::{DEFAULT_MARGIN_BP, FixedSpace, SpaceProbe, StatvfsProbe, has_room, with_margin};
pub use validate::{sanitize_relative, validate_manifest};
