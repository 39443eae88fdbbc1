//! Start-up and teardown around an injected torrent engine.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webnet_config::{ConfigLoader, OrchestratorConfig};
use webnet_events::EventStream;
use webnet_orchestrator::{SessionRegistry, StatusBoard, StatusSnapshot};
use webnet_telemetry::{LoggingConfig, build_sha, init_logging, log_format_from_str};
use webnet_torrent_core::TorrentEngine;

use crate::error::{AppError, AppResult};

/// Inputs for [`start_with`].
pub struct AppDependencies {
    /// Engine every session is admitted into.
    pub engine: Arc<dyn TorrentEngine>,
    /// Validated configuration.
    pub config: OrchestratorConfig,
    /// Install the global tracing subscriber from `config.logging`.
    pub install_logging: bool,
}

/// Running application: the registry plus the status reporter.
pub struct AppHandle {
    registry: SessionRegistry,
    status: watch::Receiver<StatusSnapshot>,
    stop: CancellationToken,
    reporter: JoinHandle<()>,
}

/// Load configuration from the environment, install logging, and start.
///
/// # Errors
///
/// Returns [`AppError::Config`] when the configuration cannot be loaded.
pub fn load_and_start(
    engine: Arc<dyn TorrentEngine>,
    loader: &ConfigLoader,
) -> AppResult<AppHandle> {
    let config = loader
        .load()
        .map_err(|err| AppError::config("config.load", err))?;
    Ok(start_with(AppDependencies {
        engine,
        config,
        install_logging: true,
    }))
}

/// Start with an already validated configuration, without touching logging.
#[must_use]
pub fn start(engine: Arc<dyn TorrentEngine>, config: OrchestratorConfig) -> AppHandle {
    start_with(AppDependencies {
        engine,
        config,
        install_logging: false,
    })
}

/// Boot sequence that relies entirely on injected dependencies.
///
/// Must be called from within a Tokio runtime. A subscriber that is already
/// installed is kept; the failure is logged.
#[must_use]
pub fn start_with(dependencies: AppDependencies) -> AppHandle {
    let AppDependencies {
        engine,
        config,
        install_logging,
    } = dependencies;

    if install_logging {
        let logging = LoggingConfig {
            level: &config.logging.level,
            format: log_format_from_str(config.logging.format.as_deref()),
            build_sha: build_sha(),
        };
        if let Err(err) = init_logging(&logging) {
            warn!(error = %err, "keeping the existing tracing subscriber");
        }
    }
    info!(
        build_sha = build_sha(),
        trackers = config.trackers.len(),
        stream_policy = ?config.stream_policy,
        "WebNet session orchestrator starting"
    );

    let registry = SessionRegistry::new(engine, config);
    let (publisher, status) = watch::channel(StatusSnapshot::default());
    let stop = CancellationToken::new();
    let reporter = spawn_status_reporter(registry.subscribe(None), publisher, stop.clone());

    AppHandle {
        registry,
        status,
        stop,
        reporter,
    }
}

fn spawn_status_reporter(
    mut events: EventStream,
    publisher: watch::Sender<StatusSnapshot>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut board = StatusBoard::new();
        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                next = events.next() => {
                    let Some(envelope) = next else { break };
                    if board.apply(&envelope.event) {
                        debug!(status = %board.snapshot().status, "status updated");
                        publisher.send_replace(board.snapshot().clone());
                    }
                }
            }
        }
    })
}

impl AppHandle {
    /// Session registry for admissions and file actions.
    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Receiver that observes every status line change.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Remove every live session and stop the status reporter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Session`] when a session could not be removed and
    /// [`AppError::Task`] when the reporter panicked.
    pub async fn shutdown(self) -> AppResult<()> {
        let removed = self
            .registry
            .shutdown()
            .await
            .map_err(|err| AppError::session("registry.shutdown", err));
        self.stop.cancel();
        self.reporter.await.map_err(|source| AppError::Task {
            task: "status_reporter",
            source,
        })?;
        info!("WebNet session orchestrator stopped");
        removed
    }
}
