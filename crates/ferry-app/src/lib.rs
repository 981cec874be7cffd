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

//! Ferry application wiring.
//!
//! Layout: `policy.rs` (controller timings and guards), `controller.rs`
//! (transfer state machine), `pool.rs` (bounded background jobs),
//! `bootstrap.rs` (shared services built from configuration), `error.rs`
//! (wiring failures).

pub mod bootstrap;
pub mod controller;
pub mod error;
pub mod policy;
pub mod pool;

pub use bootstrap::{FerryApp, init_telemetry};
pub use controller::{
    ArchiveRequest, FetchOutcome, FetchReport, FetchRequest, StopHandle, TransferController,
};
pub use error::{AppError, AppResult};
pub use policy::TransferPolicy;
pub use pool::{JobHandle, WorkerPool};
