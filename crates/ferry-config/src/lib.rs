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

//! Configuration loading for Ferry.
//!
//! Layout: `defaults.rs` (policy constants), `model.rs` (serde model),
//! `loader.rs` (YAML file plus `FERRY_*` environment overrides),
//! `normalize.rs` (guard rails with warnings), `error.rs` (failures).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod normalize;

pub use error::{ConfigError, ConfigResult};
pub use loader::{EffectiveConfig, apply_env_overrides, load, load_from_env};
pub use model::{
    FerryConfig, LoggingSection, SessionSection, StorageSection, TransferSection, UploadSection,
};
pub use normalize::normalize;
