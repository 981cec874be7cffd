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

//! Logging setup and span helpers shared across the Ferry workspace.
//!
//! Layout: `init.rs` (subscriber installation), `context.rs` (process and
//! job spans), `error.rs` (failures).

pub mod context;
pub mod error;
pub mod init;

pub use context::{GlobalContextGuard, job_span};
pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};
