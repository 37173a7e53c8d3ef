//! Startup and shutdown of the conversion core
//!
//! [`ConversionService`] wires the executor, storage, orchestrator and retention
//! sweeper together so an embedding application only has to hand over a
//! [`Config`].

use crate::config::Config;
use crate::error::Result;
use crate::executor::{CommandExecutor, SystemExecutor};
use crate::orchestrator::ConversionOrchestrator;
use crate::storage::{Clock, FileStorage, RetentionHandle, RetentionSweeper, SystemClock};
use crate::types::{ChatId, ConversionTask, VideoMetadata};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Running conversion core
///
/// # Example
///
/// ```no_run
/// use tubeaudio_dl::{Config, ConversionService};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = ConversionService::new(Config::default()).await?;
///
/// let task = service.process("https://youtu.be/dQw4w9WgXcQ", 42).await;
/// if let Some(mp3) = task.output_path() {
///     println!("ready: {}", mp3.display());
/// }
/// service.cleanup_task(&task).await;
///
/// service.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct ConversionService {
    orchestrator: Arc<ConversionOrchestrator>,
    sweeper: Mutex<Option<RetentionHandle>>,
}

impl ConversionService {
    /// Start the core with real external tools and the system clock
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the storage
    /// directories cannot be created.
    pub async fn new(config: Config) -> Result<Self> {
        let executor = Arc::new(SystemExecutor::new(config.tools.command_timeout));
        Self::with_executor(config, executor, Arc::new(SystemClock)).await
    }

    /// Start the core with an injected executor and clock
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub async fn with_executor(
        config: Config,
        executor: Arc<dyn CommandExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let storage = Arc::new(FileStorage::with_clock(&config.storage, clock));
        storage.init().await?;

        let orchestrator = Arc::new(ConversionOrchestrator::new(
            &config,
            executor,
            storage.clone(),
        ));

        let sweeper = RetentionSweeper::new(storage)
            .start(config.storage.cleanup_initial_delay, config.storage.retention);

        tracing::info!(
            max_file_size = config.limits.max_file_size,
            retention_secs = config.storage.retention.as_secs(),
            "conversion service started"
        );

        Ok(Self {
            orchestrator,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }

    /// The orchestrator, for callers that need to spawn requests themselves
    pub fn orchestrator(&self) -> &Arc<ConversionOrchestrator> {
        &self.orchestrator
    }

    /// See [`ConversionOrchestrator::fetch_metadata`]
    pub async fn fetch_metadata(&self, url: &str) -> Result<VideoMetadata> {
        self.orchestrator.fetch_metadata(url).await
    }

    /// See [`ConversionOrchestrator::process`]
    pub async fn process(&self, url: impl Into<String>, chat_id: ChatId) -> ConversionTask {
        self.orchestrator.process(url, chat_id).await
    }

    /// See [`ConversionOrchestrator::spawn`]
    pub fn spawn(&self, url: impl Into<String>, chat_id: ChatId) -> JoinHandle<ConversionTask> {
        self.orchestrator.spawn(url, chat_id)
    }

    /// See [`ConversionOrchestrator::cleanup_task`]
    pub async fn cleanup_task(&self, task: &ConversionTask) {
        self.orchestrator.cleanup_task(task).await
    }

    /// Stop the retention sweeper
    ///
    /// In-flight requests are not cancelled; their external tools are bounded by
    /// the command timeout. Calling this more than once is a no-op.
    pub async fn shutdown(&self) {
        tracing::info!("shutting down conversion service");
        if let Some(handle) = self.sweeper.lock().await.take() {
            handle.shutdown().await;
        }
        tracing::info!("conversion service stopped");
    }
}
