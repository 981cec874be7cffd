//! Process-wide owner of the shared engine session.
//!
//! The session is built lazily by the first caller and then handed out to
//! every later caller. Construction happens at most once: a failed start is
//! remembered and reported to every subsequent caller instead of being
//! retried against a half-initialised engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use ferry_torrent_core::{
    AddTransfer, EngineFactory, EngineHandle, HandleId, SessionSettings, TransferEngine,
    TransferError, TransferResult,
};
use tracing::{info, warn};

type SessionSlot = Result<Arc<dyn TransferEngine>, String>;

/// Shared engine session plus the handles registered against it.
pub struct EngineSessionRegistry {
    factory: Arc<dyn EngineFactory>,
    settings: SessionSettings,
    session: OnceLock<SessionSlot>,
    init: tokio::sync::Mutex<()>,
    live: Mutex<HashMap<HandleId, Arc<dyn EngineHandle>>>,
}

impl EngineSessionRegistry {
    /// Registry that will start its session with `settings` on first use.
    #[must_use]
    pub fn new(factory: Arc<dyn EngineFactory>, settings: SessionSettings) -> Self {
        Self {
            factory,
            settings,
            session: OnceLock::new(),
            init: tokio::sync::Mutex::new(()),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Policy the session is (or will be) started with.
    #[must_use]
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether a start has been attempted, successful or not.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.session.get().is_some()
    }

    /// Shared session, starting it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::EngineError`] when the session failed to
    /// start, on this call or any earlier one.
    pub async fn get_or_create(&self) -> TransferResult<Arc<dyn TransferEngine>> {
        if let Some(slot) = self.session.get() {
            return read_slot(slot);
        }

        let _guard = self.init.lock().await;
        if let Some(slot) = self.session.get() {
            return read_slot(slot);
        }

        info!(
            connections = self.settings.connections_limit,
            down_bps = self.settings.download_rate_limit,
            up_bps = self.settings.upload_rate_limit,
            dht = self.settings.enable_dht,
            "starting shared engine session"
        );
        let slot = match self.factory.start(&self.settings).await {
            Ok(engine) => Ok(engine),
            Err(err) => {
                let message = format!("{err:#}");
                warn!(error = %message, "engine session failed to start");
                Err(message)
            }
        };
        read_slot(self.session.get_or_init(|| slot))
    }

    /// Register content against the shared session and track its handle.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::EngineError`] when the session is unavailable
    /// or rejects the request.
    pub async fn register(&self, request: AddTransfer) -> TransferResult<Arc<dyn EngineHandle>> {
        let engine = self.get_or_create().await?;
        let handle = engine
            .add(request)
            .await
            .map_err(|err| TransferError::engine("session.add", &err))?;
        self.live().insert(handle.id(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Pause and deregister `handle`. Both steps are attempted even if the
    /// first fails; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::EngineError`] when pausing or removal fails.
    pub async fn release(&self, handle: &Arc<dyn EngineHandle>) -> TransferResult<()> {
        let id = handle.id();
        self.live().remove(&id);
        let paused = handle
            .pause()
            .await
            .map_err(|err| TransferError::engine("handle.pause", &err));
        let removed = match self.session.get() {
            Some(Ok(engine)) => engine
                .remove(id)
                .await
                .map_err(|err| TransferError::engine("session.remove", &err)),
            _ => Ok(()),
        };
        paused.and(removed)
    }

    /// Release every tracked handle. Returns how many were released cleanly.
    pub async fn cleanup(&self) -> usize {
        let handles: Vec<_> = self.live().values().cloned().collect();
        let mut released = 0;
        for handle in handles {
            match self.release(&handle).await {
                Ok(()) => released += 1,
                Err(err) => warn!(handle = %handle.id(), error = %err.describe(), "cleanup failed"),
            }
        }
        released
    }

    /// Handles currently tracked.
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.live().len()
    }

    fn live(&self) -> MutexGuard<'_, HashMap<HandleId, Arc<dyn EngineHandle>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn read_slot(slot: &SessionSlot) -> TransferResult<Arc<dyn TransferEngine>> {
    slot.as_ref()
        .map(Arc::clone)
        .map_err(|message| TransferError::EngineError {
            operation: "session.start",
            message: message.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackEngine, LoopbackFactory};
    use ferry_test_support::fixtures::descriptor;

    fn request(temp: &tempfile::TempDir) -> AddTransfer {
        AddTransfer {
            descriptor: descriptor("abc123"),
            save_path: temp.path().to_path_buf(),
            resume: None,
            hold: false,
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_session() -> anyhow::Result<()> {
        let factory = Arc::new(LoopbackFactory::new(LoopbackEngine::new()));
        let registry = Arc::new(EngineSessionRegistry::new(
            factory.clone(),
            SessionSettings::default(),
        ));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.get_or_create().await }));
        }
        let mut engines = Vec::new();
        for task in tasks {
            engines.push(task.await??);
        }
        assert_eq!(factory.starts(), 1);
        assert!(engines.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert!(registry.is_initialised());
        Ok(())
    }

    #[tokio::test]
    async fn failed_start_is_not_retried() {
        let factory = Arc::new(LoopbackFactory::failing("cannot bind listen port"));
        let registry = EngineSessionRegistry::new(factory.clone(), SessionSettings::default());

        for _ in 0..3 {
            let err = registry.get_or_create().await.err().expect("start should fail");
            match err {
                TransferError::EngineError { operation, message } => {
                    assert_eq!(operation, "session.start");
                    assert!(message.contains("cannot bind listen port"));
                }
                other => panic!("unexpected error {other:?}"),
            }
        }
        assert_eq!(factory.starts(), 1);
    }

    #[tokio::test]
    async fn cleanup_releases_every_live_handle() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = LoopbackEngine::new();
        let registry = EngineSessionRegistry::new(
            Arc::new(LoopbackFactory::new(engine.clone())),
            SessionSettings::default(),
        );
        for _ in 0..3 {
            registry.register(request(&temp)).await?;
        }
        assert_eq!(registry.live_handles(), 3);
        assert_eq!(engine.live_handles(), 3);

        assert_eq!(registry.cleanup().await, 3);
        assert_eq!(registry.live_handles(), 0);
        assert_eq!(engine.live_handles(), 0);
        let stats = engine.stats_for(descriptor("abc123").content_id());
        assert!(stats.iter().all(|s| s.removed && s.pauses == 1));
        Ok(())
    }

    #[tokio::test]
    async fn settings_reach_the_factory() -> anyhow::Result<()> {
        let factory = Arc::new(LoopbackFactory::new(LoopbackEngine::new()));
        let settings = SessionSettings {
            connections_limit: 42,
            ..SessionSettings::default()
        };
        let registry = EngineSessionRegistry::new(factory.clone(), settings.clone());
        registry.get_or_create().await?;
        assert_eq!(factory.last_settings(), Some(settings));
        assert_eq!(registry.settings().connections_limit, 42);
        Ok(())
    }
}
