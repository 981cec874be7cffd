//! Progress and status plumbing shared by the Ferry controllers.
//!
//! Controllers never talk to a presentation layer directly. They report through
//! [`TransferObserver`], and the stock observers in [`observer`] forward those
//! callbacks into `tracing`, fan them out, or drop them.

pub mod observer;
pub mod payloads;

pub use observer::{FanoutObserver, NullObserver, TracingObserver, TransferObserver};
pub use payloads::{ProgressSample, Severity, TransferState};
