//! Shared services built once per process from the effective configuration.
//!
//! The engine session registry and the resume store are process-wide; every
//! controller created here shares them.

use std::path::Path;
use std::sync::Arc;

use ferry_config::{FerryConfig, LoggingSection};
use ferry_drive::{DriveBackend, TokenSource, UploadController};
use ferry_events::TransferObserver;
use ferry_fsops::{SpaceProbe, StatvfsProbe};
use ferry_session::{EngineSessionRegistry, ResumeStore};
use ferry_telemetry::{LogFormat, LoggingConfig};
use ferry_torrent_core::EngineFactory;
use tracing::info;

use crate::controller::TransferController;
use crate::error::{AppError, AppResult};
use crate::policy::TransferPolicy;
use crate::pool::WorkerPool;

/// Install the global subscriber described by `logging`.
///
/// # Errors
///
/// Returns [`AppError::Telemetry`] when the level is malformed or a
/// subscriber is already installed.
pub fn init_telemetry(logging: &LoggingSection) -> AppResult<()> {
    let config = LoggingConfig {
        level: &logging.level,
        format: LogFormat::from_name(logging.format.as_deref()),
        build_sha: ferry_telemetry::build_sha(),
    };
    ferry_telemetry::init_logging(&config).map_err(|err| AppError::telemetry("logging.init", err))
}

/// Process-wide services.
pub struct FerryApp {
    config: FerryConfig,
    registry: Arc<EngineSessionRegistry>,
    store: ResumeStore,
    pool: WorkerPool,
    policy: TransferPolicy,
    space: Arc<dyn SpaceProbe>,
    warnings: Vec<String>,
}

impl FerryApp {
    /// Wire services for `config` on top of `factory`. The engine session is
    /// created lazily on first use.
    #[must_use]
    pub fn new(config: FerryConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let registry = Arc::new(EngineSessionRegistry::new(
            factory,
            config.session.to_settings(),
        ));
        let store = ResumeStore::new(config.storage.resume_dir());
        let pool = WorkerPool::new(config.workers);
        let policy = TransferPolicy::from(&config.transfer);
        Self {
            config,
            registry,
            store,
            pool,
            policy,
            space: Arc::new(StatvfsProbe),
            warnings: Vec::new(),
        }
    }

    /// Load configuration from `path` and the process environment, then wire
    /// services on top of `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the configuration cannot be loaded.
    pub fn from_env(path: Option<&Path>, factory: Arc<dyn EngineFactory>) -> AppResult<Self> {
        let effective =
            ferry_config::load_from_env(path).map_err(|err| AppError::config("config.load", err))?;
        let mut app = Self::new(effective.config, factory);
        app.warnings = effective.warnings;
        Ok(app)
    }

    /// Replace the free-space probe handed to new controllers.
    #[must_use]
    pub fn with_space_probe(mut self, probe: Arc<dyn SpaceProbe>) -> Self {
        self.space = probe;
        self
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &FerryConfig {
        &self.config
    }

    /// Guard-rail adjustments made while loading configuration. Empty unless
    /// built with [`FerryApp::from_env`].
    #[must_use]
    pub fn config_warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Shared engine session registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<EngineSessionRegistry> {
        &self.registry
    }

    /// Shared checkpoint store.
    #[must_use]
    pub const fn resume_store(&self) -> &ResumeStore {
        &self.store
    }

    /// Background job pool.
    #[must_use]
    pub const fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Controller policy derived from configuration.
    #[must_use]
    pub const fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    /// Create the download root and checkpoint directory.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] naming the directory that could not be created.
    pub async fn prepare_storage(&self) -> AppResult<()> {
        let root = &self.config.storage.download_root;
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|err| AppError::io("storage.download_root", root, err))?;
        let resume = self.store.root();
        tokio::fs::create_dir_all(resume)
            .await
            .map_err(|err| AppError::io("storage.resume_dir", resume, err))?;
        Ok(())
    }

    /// Fresh controller reporting to `observer`.
    #[must_use]
    pub fn transfer_controller(&self, observer: Arc<dyn TransferObserver>) -> TransferController {
        self.transfer_controller_with_policy(observer, self.policy.clone())
    }

    /// Fresh controller with a caller-adjusted `policy`.
    #[must_use]
    pub fn transfer_controller_with_policy(
        &self,
        observer: Arc<dyn TransferObserver>,
        policy: TransferPolicy,
    ) -> TransferController {
        TransferController::new(
            Arc::clone(&self.registry),
            self.store.clone(),
            observer,
            policy,
        )
        .with_space_probe(Arc::clone(&self.space))
    }

    /// Upload controller against the configured remote, resolving tokens
    /// from `sources` in order. The configured token file is tried after the
    /// non-interactive sources and ahead of any terminal prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Drive`] when the HTTP client cannot be built.
    pub fn upload_controller(
        &self,
        observer: Arc<dyn TransferObserver>,
        mut sources: Vec<TokenSource>,
    ) -> AppResult<UploadController> {
        let upload = &self.config.upload;
        if let Some(path) = &upload.token_file {
            let at = sources
                .iter()
                .position(|source| matches!(source, TokenSource::Prompt))
                .unwrap_or(sources.len());
            sources.insert(at, TokenSource::File(path.clone()));
        }
        let backend = DriveBackend::new(upload.api_base.clone(), upload.chunk_size_bytes, sources)
            .map_err(|err| AppError::drive("drive.build", err))?;
        Ok(UploadController::new(Arc::new(backend), observer)
            .with_progress_step(upload.progress_step))
    }

    /// Tear down every live handle and the engine session.
    pub async fn shutdown(&self) -> usize {
        let released = self.registry.cleanup().await;
        info!(released, "engine session shut down");
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_events::NullObserver;
    use ferry_session::{LoopbackEngine, LoopbackFactory};

    fn app(root: &Path) -> (FerryApp, Arc<LoopbackFactory>) {
        let mut config = FerryConfig::default();
        config.storage.download_root = root.join("downloads");
        config.workers = 3;
        let factory = Arc::new(LoopbackFactory::new(LoopbackEngine::new()));
        (FerryApp::new(config, factory.clone()), factory)
    }

    #[tokio::test]
    async fn services_follow_configuration() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (app, factory) = app(temp.path());
        assert_eq!(app.pool().size(), 3);
        assert_eq!(
            app.resume_store().root(),
            temp.path().join("downloads").join(".resume")
        );
        assert!(!app.registry().is_initialised());

        app.prepare_storage().await?;
        assert!(temp.path().join("downloads/.resume").is_dir());

        app.registry().get_or_create().await?;
        assert_eq!(factory.starts(), 1);
        assert_eq!(factory.last_settings(), Some(app.config().session.to_settings()));
        assert_eq!(app.shutdown().await, 0);
        Ok(())
    }

    #[test]
    fn config_file_adjustments_are_kept() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("ferry.yaml");
        std::fs::write(&path, "workers: 0\nupload:\n  folder: Archive\n")?;
        let app = FerryApp::from_env(
            Some(&path),
            Arc::new(LoopbackFactory::new(LoopbackEngine::new())),
        )?;
        assert_eq!(app.pool().size(), 2);
        assert_eq!(app.config().upload.folder, "Archive");
        assert!(
            app.config_warnings()
                .iter()
                .any(|warning| warning.starts_with("workers was 0"))
        );
        Ok(())
    }

    #[test]
    fn unreadable_config_is_an_app_error() {
        let result = FerryApp::from_env(
            Some(Path::new("/no/such/ferry.yaml")),
            Arc::new(LoopbackFactory::new(LoopbackEngine::new())),
        );
        assert!(matches!(result, Err(AppError::Config { .. })));
    }

    #[tokio::test]
    async fn upload_controller_builds_against_configured_base() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (app, _) = app(temp.path());
        let controller = app.upload_controller(
            Arc::new(NullObserver),
            vec![TokenSource::Static("token".into())],
        );
        assert!(controller.is_ok());
        Ok(())
    }
}
