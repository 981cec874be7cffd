//! Bounded background jobs.
//!
//! Jobs are spawned immediately but wait on a semaphore permit before
//! running, so at most `size` run at once. Each job runs inside its own
//! tracing span carrying a fresh job id.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Concurrency cap used when none is configured.
pub const DEFAULT_WORKERS: usize = 2;

/// Fixed-size pool of background job slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl WorkerPool {
    /// Pool running at most `size` jobs concurrently (minimum one).
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Configured concurrency.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently held by a running job.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queue `job`; it starts once a slot frees up.
    pub fn submit<F, T>(&self, kind: &'static str, job: F) -> JobHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = Uuid::new_v4();
        let permits = Arc::clone(&self.permits);
        let span = ferry_telemetry::job_span(id, kind);
        let join = tokio::spawn(
            async move {
                // The semaphore is never closed, so a permit always arrives.
                let _permit = permits.acquire_owned().await.ok();
                debug!("job started");
                let output = job.await;
                debug!("job finished");
                output
            }
            .instrument(span),
        );
        JobHandle { id, kind, join }
    }
}

/// Handle to a submitted job.
#[derive(Debug)]
pub struct JobHandle<T> {
    id: Uuid,
    kind: &'static str,
    join: JoinHandle<T>,
}

impl<T> JobHandle<T> {
    /// Job identifier recorded on its span.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Job kind label.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    /// Whether the job has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job's output.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Join`] if the job panicked or was aborted.
    pub async fn wait(self) -> AppResult<T> {
        let Self { kind, join, .. } = self;
        join.await.map_err(|err| AppError::join(kind, err))
    }
}
