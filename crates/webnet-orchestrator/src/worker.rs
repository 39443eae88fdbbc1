//! Per-session task translating engine events into bus events.
//!
//! # Design
//! - One task per session, stopped through the session's cancellation token.
//! - Metadata is applied once; nothing is processed after `done` or `error`.
//! - A session whose content hash belongs to a later admission stops at
//!   metadata and is removed by the registry.
//! - Interval sampling folds the latest telemetry on each tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;
use webnet_config::SamplingStrategy;
use webnet_events::{Event, EventBus, SessionState};
use webnet_telemetry::session_span;
use webnet_torrent_core::{
    EngineEvent, EngineTelemetry, FilePriority, PeerSource, TorrentEngine, TorrentFile,
};

use crate::catalog::CatalogEntry;
use crate::progress::{ProgressSample, ProgressTracker};
use crate::registry::{HashClaim, RegistryHandle};
use crate::session::SessionShared;

const IDLE_TICK: Duration = Duration::from_secs(3_600);

pub(crate) struct WorkerContext {
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) engine: Arc<dyn TorrentEngine>,
    pub(crate) bus: EventBus,
    pub(crate) registry: RegistryHandle,
    pub(crate) sampling: SamplingStrategy,
}

/// Spawn the worker; it waits for `start` so `SessionAdded` is always published first.
pub(crate) fn spawn(
    context: WorkerContext,
    events: mpsc::Receiver<EngineEvent>,
    start: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    let span = session_span(context.shared.id, &context.shared.key.to_string());
    tokio::spawn(
        async move {
            if start.await.is_err() {
                return;
            }
            Worker::new(context).run(events).await;
        }
        .instrument(span),
    )
}

struct Worker {
    context: WorkerContext,
    tracker: ProgressTracker,
    latest: Option<EngineTelemetry>,
    metadata_seen: bool,
    terminal: bool,
}

impl Worker {
    fn new(context: WorkerContext) -> Self {
        Self {
            context,
            tracker: ProgressTracker::new(),
            latest: None,
            metadata_seen: false,
            terminal: false,
        }
    }

    fn id(&self) -> Uuid {
        self.context.shared.id
    }

    async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) {
        let period = self.context.sampling.period();
        let mut ticker = tokio::time::interval(period.unwrap_or(IDLE_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let cancel = self.context.shared.cancel.clone();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        debug!("engine closed the session event channel");
                        break;
                    }
                },
                _ = ticker.tick(), if period.is_some() && !self.terminal => {
                    if let Some(telemetry) = self.latest {
                        self.sample(telemetry).await;
                    }
                }
            }
        }
        debug!("session worker stopped");
    }

    async fn handle(&mut self, event: EngineEvent) {
        if self.terminal {
            debug!(event = ?event, "ignoring engine event after terminal state");
            return;
        }
        match event {
            EngineEvent::Metadata {
                info_hash,
                name,
                files,
            } => self.on_metadata(info_hash, name, &files).await,
            EngineEvent::Download(telemetry) => {
                self.latest = Some(telemetry);
                self.context.shared.inner.write().await.telemetry = Some(telemetry);
                if matches!(self.context.sampling, SamplingStrategy::EventDriven) {
                    self.sample(telemetry).await;
                }
            }
            EngineEvent::Done => self.on_done().await,
            EngineEvent::Error { message } => self.on_error(message).await,
            EngineEvent::NoPeers { source } => self.on_no_peers(source),
        }
    }

    async fn on_metadata(&mut self, info_hash: Option<String>, name: String, files: &[TorrentFile]) {
        if self.metadata_seen {
            debug!("duplicate metadata ignored");
            return;
        }
        self.metadata_seen = true;

        if let Some(hash) = info_hash.as_deref()
            && self.claim_content_hash(hash).await == HashClaim::Superseded
        {
            self.terminal = true;
            return;
        }

        let view = {
            let mut inner = self.context.shared.inner.write().await;
            let view = inner.catalog.on_metadata(&name, files);
            inner.name = Some(name.clone());
            if info_hash.is_some() {
                inner.info_hash.clone_from(&info_hash);
            }
            inner.state = SessionState::Downloading;
            view
        };

        self.apply_priorities(&view.files).await;

        info!(name = %view.name, files = view.files.len(), total_bytes = view.total_bytes, "metadata received");
        self.context.bus.publish(Event::MetadataReceived {
            session_id: self.id(),
            name: view.name.clone(),
            total_bytes: view.total_bytes,
            files: view.discovered_files(),
        });
        self.context.bus.publish(Event::StateChanged {
            session_id: self.id(),
            state: SessionState::Downloading,
        });
    }

    async fn claim_content_hash(&self, hash: &str) -> HashClaim {
        // Tokens are only cancelled under the admission lock, so this can
        // only interrupt the wait for that lock.
        let cancel = self.context.shared.cancel.clone();
        tokio::select! {
            biased;
            () = cancel.cancelled() => HashClaim::Superseded,
            claim = self.context.registry.claim_content_hash(self.id(), hash) => claim,
        }
    }

    async fn apply_priorities(&self, files: &[CatalogEntry]) {
        let hinted: Vec<&CatalogEntry> = files
            .iter()
            .filter(|entry| entry.priority != FilePriority::Normal)
            .collect();
        for (position, entry) in hinted.iter().enumerate() {
            let applied = self
                .context
                .engine
                .set_file_priority(self.id(), entry.index, entry.priority)
                .await;
            if let Err(err) = applied {
                warn!(file_index = entry.index, error = %err, "file priorities not applied");
                let mut inner = self.context.shared.inner.write().await;
                for skipped in &hinted[position..] {
                    inner.catalog.set_priority(skipped.index, FilePriority::Normal);
                }
                return;
            }
            debug!(file_index = entry.index, priority = ?entry.priority, "file priority applied");
        }
    }

    async fn sample(&mut self, telemetry: EngineTelemetry) {
        if let Some(sample) = self.tracker.on_telemetry(
            telemetry.downloaded_bytes,
            telemetry.total_bytes,
            telemetry.bytes_per_second,
        ) {
            self.publish_progress(sample).await;
        }
    }

    async fn publish_progress(&self, sample: ProgressSample) {
        self.context.shared.inner.write().await.progress = Some(sample);
        self.context.bus.publish(Event::Progress {
            session_id: self.id(),
            percent: sample.percent,
            bytes_downloaded: sample.downloaded_bytes,
            bytes_total: sample.total_bytes,
            bytes_per_second: sample.bytes_per_second,
            eta_seconds: sample.eta_seconds,
        });
    }

    async fn on_done(&mut self) {
        self.terminal = true;
        if let (Some(telemetry), Some(_)) = (self.latest, self.context.sampling.period()) {
            self.sample(telemetry).await;
        }
        if let Some(sample) = self.tracker.complete() {
            self.publish_progress(sample).await;
        }
        self.context.shared.inner.write().await.state = SessionState::Completed;
        info!("session completed");
        self.context.bus.publish(Event::StateChanged {
            session_id: self.id(),
            state: SessionState::Completed,
        });
        self.context
            .bus
            .publish(Event::Completed { session_id: self.id() });
    }

    async fn on_error(&mut self, message: String) {
        self.terminal = true;
        let state = SessionState::Failed {
            message: message.clone(),
        };
        self.context.shared.inner.write().await.state = state.clone();
        warn!(error = %message, "session failed");
        self.context.bus.publish(Event::SessionFailed {
            session_id: self.id(),
            message,
        });
        self.context.bus.publish(Event::StateChanged {
            session_id: self.id(),
            state,
        });
    }

    fn on_no_peers(&self, source: PeerSource) {
        info!(source = source.as_str(), "no peers found");
        self.context.bus.publish(Event::NoPeers {
            session_id: self.id(),
            source: source.as_str().to_string(),
        });
    }
}
