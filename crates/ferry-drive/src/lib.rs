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

//! Remote storage uploads for Ferry.
//!
//! Layout: `backend.rs` (storage boundary trait), `google.rs` (Drive v3 REST
//! backend), `token.rs` (credential sources), `controller.rs` (upload
//! orchestration with throttled progress), `error.rs` (backend failures).

pub mod backend;
pub mod controller;
pub mod error;
pub mod google;
pub mod token;

pub use backend::{LocalArtifact, RemoteFile, StorageBackend};
pub use controller::{
    DEFAULT_FOLDER, DEFAULT_PROGRESS_STEP, ProgressGate, UploadController, UploadReceipt, percent_of,
};
pub use error::{DriveError, DriveResult};
pub use google::{DriveBackend, FOLDER_MIME_TYPE};
pub use token::{AccessToken, TokenSource};
