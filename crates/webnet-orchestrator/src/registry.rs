//! Session registry: the single owner of the identity to session mapping.
//!
//! # Design
//! - The engine handle is injected at construction; there is no global client.
//! - Admissions and removals are serialised through one async lock so a
//!   replacement always awaits the engine's removal before re-adding.
//! - Each session gets a worker task and a cancellation token; removal cancels
//!   the token, which aborts any download or stream attached to the session.
//! - A content hash maps to at most one live session. When a second session
//!   turns out to carry the same content, the later admission replaces the
//!   earlier one, whether the hash arrives with the add or with metadata.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, RwLock, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;
use webnet_config::{OrchestratorConfig, StreamPolicy};
use webnet_events::{Event, EventBus, EventId, EventStream, FileAction, SessionState};
use webnet_telemetry::transfer_span;
use webnet_torrent_core::{
    AddSession, AddSessionOptions, FilePriority, IdentifierInput, PlaybackBuffer, SessionKey,
    TorrentEngine, TorrentIdentifier, validate, validate_upload,
};

use crate::assembler::{Artifact, assemble, display_name};
use crate::catalog::CatalogEntry;
use crate::error::{AssemblyError, SessionError, SessionResult, StreamError};
use crate::feeder::{FeedSummary, StreamFeeder};
use crate::session::{Session, SessionShared, SessionSnapshot};
use crate::worker::{self, WorkerContext};

struct SessionEntry {
    session: Session,
    worker: JoinHandle<()>,
    admitted: u64,
}

#[derive(Debug, Default)]
struct RegistryIndex {
    keys: HashMap<SessionKey, Uuid>,
    aliases: HashMap<Uuid, Vec<SessionKey>>,
}

/// Outcome of a worker claiming the content hash its metadata reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HashClaim {
    /// The session is now tracked under the hash.
    Kept,
    /// A later admission owns the hash; this session is being removed.
    Superseded,
}

/// Weak registry reference held by session workers.
#[derive(Clone)]
pub(crate) struct RegistryHandle {
    inner: Weak<RegistryInner>,
}

impl RegistryHandle {
    /// Track `session_id` under `hash`, replacing an earlier session with the same content.
    pub(crate) async fn claim_content_hash(&self, session_id: Uuid, hash: &str) -> HashClaim {
        let Some(inner) = self.inner.upgrade() else {
            return HashClaim::Kept;
        };
        SessionRegistry { inner }
            .claim_content_hash(session_id, hash)
            .await
    }
}

struct RegistryInner {
    engine: Arc<dyn TorrentEngine>,
    bus: EventBus,
    config: Arc<OrchestratorConfig>,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    index: RwLock<RegistryIndex>,
    admission: Mutex<()>,
    admissions: AtomicU64,
    shut_down: AtomicBool,
}

/// Tracks live sessions and routes file actions to them.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    /// Registry driving `engine`, with an event bus sized from `config`.
    #[must_use]
    pub fn new(engine: Arc<dyn TorrentEngine>, config: OrchestratorConfig) -> Self {
        let bus = EventBus::with_capacity(config.event_capacity);
        Self::with_bus(engine, config, bus)
    }

    /// Registry publishing onto an existing bus.
    #[must_use]
    pub fn with_bus(
        engine: Arc<dyn TorrentEngine>,
        config: OrchestratorConfig,
        bus: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                engine,
                bus,
                config: Arc::new(config),
                sessions: RwLock::new(HashMap::new()),
                index: RwLock::new(RegistryIndex::default()),
                admission: Mutex::new(()),
                admissions: AtomicU64::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Event bus the registry publishes on.
    #[must_use]
    pub fn events(&self) -> EventBus {
        self.inner.bus.clone()
    }

    /// Subscribe to session events, replaying from `since_id` when supplied.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        self.inner.bus.subscribe(since_id)
    }

    /// Validate user input and admit it with the configured trackers.
    ///
    /// # Errors
    ///
    /// [`SessionError::Validation`] before the engine is involved, then the
    /// errors of [`Self::add_or_replace`].
    pub async fn submit(&self, input: Option<IdentifierInput>) -> SessionResult<Session> {
        let identifier = validate(input)?;
        self.add(identifier).await
    }

    /// Validate an uploaded `.torrent` file and admit it with the configured trackers.
    ///
    /// # Errors
    ///
    /// Same as [`Self::submit`].
    pub async fn submit_upload(&self, file_name: &str, bytes: Vec<u8>) -> SessionResult<Session> {
        let identifier = validate_upload(file_name, bytes)?;
        self.add(identifier).await
    }

    /// Admit `identifier` with the configured tracker list.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_or_replace`].
    pub async fn add(&self, identifier: TorrentIdentifier) -> SessionResult<Session> {
        let trackers = self.inner.config.trackers.clone();
        self.add_or_replace(identifier, trackers).await
    }

    /// Admit `identifier`, first removing any session tracked under the same key.
    ///
    /// Completes once the engine reports the session object; metadata arrives
    /// later as events.
    ///
    /// # Errors
    ///
    /// - [`SessionError::ShutDown`] after [`Self::shutdown`].
    /// - [`SessionError::RemovalFailed`] when the previous session could not be
    ///   removed; nothing is added in that case. The previous session is the
    ///   one under the same key, or the one under the content hash the engine
    ///   reports for the new session.
    /// - [`SessionError::EngineRejected`] when the engine refuses the identifier.
    pub async fn add_or_replace(
        &self,
        identifier: TorrentIdentifier,
        trackers: Vec<String>,
    ) -> SessionResult<Session> {
        let _admission = self.inner.admission.lock().await;
        if self.inner.shut_down.load(Ordering::Acquire) {
            return Err(SessionError::ShutDown);
        }

        let key = SessionKey::for_identifier(&identifier);
        let existing = self.inner.index.read().await.keys.get(&key).copied();
        if let Some(previous) = existing {
            info!(session_id = %previous, key = %key, "replacing session with the same key");
            self.remove_admitted(previous).await?;
        }

        let id = Uuid::new_v4();
        let kind = identifier.kind();
        let admitted = self
            .inner
            .engine
            .add_session(AddSession {
                id,
                identifier,
                options: AddSessionOptions { announce: trackers },
            })
            .await
            .map_err(|err| {
                warn!(key = %key, error = %err, "engine rejected session");
                SessionError::EngineRejected { source: err.into() }
            })?;

        let hashed = admitted
            .info_hash
            .as_deref()
            .map(SessionKey::info_hash)
            .filter(|hashed| *hashed != key);
        if let Some(hashed) = &hashed {
            let previous = self.inner.index.read().await.keys.get(hashed).copied();
            if let Some(previous) = previous {
                info!(session_id = %previous, key = %hashed, "replacing session with the same content hash");
                if let Err(err) = self.remove_admitted(previous).await {
                    if let Err(undo) = self.inner.engine.remove_session(id).await {
                        warn!(session_id = %id, error = %undo, "engine failed to drop the new session");
                    }
                    return Err(err);
                }
            }
        }

        let shared = Arc::new(SessionShared::new(
            id,
            key.clone(),
            kind,
            admitted.name.clone(),
            admitted.info_hash.clone(),
            &self.inner.config.media_extensions,
        ));
        let (start, started) = oneshot::channel();
        let worker = worker::spawn(
            WorkerContext {
                shared: Arc::clone(&shared),
                engine: Arc::clone(&self.inner.engine),
                bus: self.inner.bus.clone(),
                registry: RegistryHandle {
                    inner: Arc::downgrade(&self.inner),
                },
                sampling: self.inner.config.sampling,
            },
            admitted.events,
            started,
        );

        self.index_session(id, &key, hashed).await;
        let session = Session { shared };
        self.inner.sessions.write().await.insert(
            id,
            SessionEntry {
                session: session.clone(),
                worker,
                admitted: self.inner.admissions.fetch_add(1, Ordering::Relaxed),
            },
        );

        info!(session_id = %id, key = %key, kind = ?kind, "session added");
        self.inner.bus.publish(Event::SessionAdded {
            session_id: id,
            key: key.to_string(),
            kind,
            name: admitted.name,
        });
        if start.send(()).is_err() {
            warn!(session_id = %id, "session worker exited before start");
        }
        Ok(session)
    }

    async fn index_session(&self, id: Uuid, key: &SessionKey, hashed: Option<SessionKey>) {
        let mut index = self.inner.index.write().await;
        let mut aliases = vec![key.clone()];
        index.keys.insert(key.clone(), id);
        if let Some(hashed) = hashed {
            index.keys.insert(hashed.clone(), id);
            aliases.push(hashed);
        }
        index.aliases.insert(id, aliases);
    }

    async fn claim_content_hash(&self, session_id: Uuid, hash: &str) -> HashClaim {
        let _admission = self.inner.admission.lock().await;
        let key = SessionKey::info_hash(hash);
        let owner = self.inner.index.read().await.keys.get(&key).copied();
        if let Some(owner) = owner.filter(|owner| *owner != session_id) {
            let (theirs, ours) = {
                let sessions = self.inner.sessions.read().await;
                (
                    sessions.get(&owner).map(|entry| entry.admitted),
                    sessions.get(&session_id).map(|entry| entry.admitted),
                )
            };
            match (theirs, ours) {
                (_, None) => return HashClaim::Superseded,
                (Some(theirs), Some(ours)) if theirs > ours => {
                    info!(session_id = %session_id, newer = %owner, key = %key, "later session carries the same content");
                    let registry = self.clone();
                    tokio::spawn(async move {
                        if let Err(err) = registry.remove(session_id).await {
                            warn!(session_id = %session_id, error = %err, "superseded session not removed cleanly");
                        }
                    });
                    return HashClaim::Superseded;
                }
                _ => {
                    info!(session_id = %owner, key = %key, "replacing session with the same content hash");
                    if let Err(err) = self.remove_admitted(owner).await {
                        warn!(session_id = %owner, error = %err, "replaced session not removed cleanly");
                    }
                }
            }
        }

        let mut index = self.inner.index.write().await;
        let Some(aliases) = index.aliases.get_mut(&session_id) else {
            return HashClaim::Superseded;
        };
        if !aliases.contains(&key) {
            aliases.push(key.clone());
        }
        index.keys.insert(key, session_id);
        HashClaim::Kept
    }

    /// Remove a session from the engine and the registry.
    ///
    /// Removing an unknown or already removed session is a no-op.
    ///
    /// # Errors
    ///
    /// [`SessionError::RemovalFailed`] when the engine fails; the registry
    /// forgets the session regardless.
    pub async fn remove(&self, session_id: Uuid) -> SessionResult<()> {
        let _admission = self.inner.admission.lock().await;
        self.remove_admitted(session_id).await
    }

    async fn remove_admitted(&self, session_id: Uuid) -> SessionResult<()> {
        let Some(entry) = self.inner.sessions.write().await.remove(&session_id) else {
            debug!(session_id = %session_id, "remove ignored for unknown session");
            return Ok(());
        };
        {
            let mut index = self.inner.index.write().await;
            for key in index.aliases.remove(&session_id).unwrap_or_default() {
                if index.keys.get(&key) == Some(&session_id) {
                    index.keys.remove(&key);
                }
            }
        }

        entry.session.shared.cancel.cancel();
        let removed = self.inner.engine.remove_session(session_id).await;
        if let Err(err) = entry.worker.await {
            warn!(session_id = %session_id, error = %err, "session worker ended abnormally");
        }

        match removed {
            Ok(()) => {
                info!(session_id = %session_id, "session removed");
                self.inner.bus.publish(Event::SessionRemoved { session_id });
                Ok(())
            }
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "engine failed to remove session");
                Err(SessionError::RemovalFailed {
                    session_id,
                    source: err.into(),
                })
            }
        }
    }

    /// Remove every live session and refuse further admissions.
    ///
    /// # Errors
    ///
    /// The first [`SessionError::RemovalFailed`] encountered; every session is
    /// still attempted.
    pub async fn shutdown(&self) -> SessionResult<()> {
        let _admission = self.inner.admission.lock().await;
        self.inner.shut_down.store(true, Ordering::Release);
        let ids: Vec<Uuid> = self.inner.sessions.read().await.keys().copied().collect();
        let mut first_error = None;
        for id in ids {
            if let Err(err) = self.remove_admitted(id).await {
                first_error.get_or_insert(err);
            }
        }
        info!("session registry shut down");
        first_error.map_or(Ok(()), Err)
    }

    /// Live session by identifier.
    ///
    /// # Errors
    ///
    /// [`SessionError::SessionNotFound`] when no such session is live.
    pub async fn session(&self, session_id: Uuid) -> SessionResult<Session> {
        self.inner
            .sessions
            .read()
            .await
            .get(&session_id)
            .map(|entry| entry.session.clone())
            .ok_or(SessionError::SessionNotFound { session_id })
    }

    /// Live session tracked under `key`, including engine-assigned content hashes.
    pub async fn find(&self, key: &SessionKey) -> Option<Session> {
        let id = self.inner.index.read().await.keys.get(key).copied()?;
        self.session(id).await.ok()
    }

    /// Snapshots of every live session.
    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<Session> = self
            .inner
            .sessions
            .read()
            .await
            .values()
            .map(|entry| entry.session.clone())
            .collect();
        let mut snapshots = Vec::with_capacity(sessions.len());
        for session in sessions {
            snapshots.push(session.snapshot().await);
        }
        snapshots
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    /// Whether no session is live.
    pub async fn is_empty(&self) -> bool {
        self.inner.sessions.read().await.is_empty()
    }

    /// Change one file's download priority in the engine and the catalog.
    ///
    /// # Errors
    ///
    /// Lookup errors, and [`SessionError::Engine`] when the engine refuses
    /// the change; the catalog keeps its previous value in that case.
    pub async fn set_file_priority(
        &self,
        session_id: Uuid,
        file_index: u32,
        priority: FilePriority,
    ) -> SessionResult<()> {
        let session = self.session(session_id).await?;
        session.shared.entry(file_index).await?;
        self.inner
            .engine
            .set_file_priority(session_id, file_index, priority)
            .await
            .map_err(|err| SessionError::engine("set_file_priority", err))?;
        session
            .shared
            .inner
            .write()
            .await
            .catalog
            .set_priority(file_index, priority);
        debug!(session_id = %session_id, file_index, priority = ?priority, "file priority updated");
        Ok(())
    }

    /// Assemble one file into an in-memory artifact.
    ///
    /// Available for any catalogued file; a partially downloaded file yields
    /// whatever the engine streams.
    ///
    /// # Errors
    ///
    /// Lookup errors, [`SessionError::FileBusy`] while another transfer holds
    /// the file, and [`SessionError::Assembly`] when assembly fails or the
    /// session is removed mid-transfer.
    pub async fn download_file(&self, session_id: Uuid, file_index: u32) -> SessionResult<Artifact> {
        let session = self.session(session_id).await?;
        let shared = &session.shared;
        let lease = shared
            .authorize(
                file_index,
                FileAction::Download,
                self.inner.config.stream_policy,
                true,
            )
            .await?;

        let action = FileAction::Download;
        async {
            self.transfer_started(session_id, file_index, action);
            let outcome = self.assemble_file(shared, lease.entry()).await;
            drop(lease);
            self.transfer_finished(
                session_id,
                file_index,
                action,
                outcome
                    .as_ref()
                    .map(|artifact| artifact.len() as u64)
                    .map_err(AssemblyError::user_message),
            );
            outcome.map_err(SessionError::from)
        }
        .instrument(transfer_span(session_id, file_index, action.as_str()))
        .await
    }

    async fn assemble_file(
        &self,
        shared: &SessionShared,
        entry: &CatalogEntry,
    ) -> Result<Artifact, AssemblyError> {
        let stream = self
            .inner
            .engine
            .open_read_stream(shared.id, entry.index)
            .await
            .map_err(|err| AssemblyError::Open { source: err.into() })?;
        assemble(
            stream,
            display_name(&entry.name),
            &entry.mime(),
            &shared.cancel,
        )
        .await
    }

    /// Feed one media file into `buffer` for progressive playback.
    ///
    /// # Errors
    ///
    /// Lookup errors, [`SessionError::NotStreamable`] for non-media files,
    /// [`SessionError::FileNotReady`] under [`StreamPolicy::RejectIncomplete`],
    /// [`SessionError::FileBusy`], and [`SessionError::Stream`] when feeding
    /// fails or the session is removed mid-stream.
    pub async fn stream_file<B>(
        &self,
        session_id: Uuid,
        file_index: u32,
        buffer: &mut B,
    ) -> SessionResult<FeedSummary>
    where
        B: PlaybackBuffer + ?Sized,
    {
        let session = self.session(session_id).await?;
        let shared = &session.shared;
        let policy = self.inner.config.stream_policy;
        let ready = match policy {
            StreamPolicy::Progressive => true,
            StreamPolicy::RejectIncomplete => self.is_file_ready(shared, file_index).await?,
        };
        let lease = shared
            .authorize(file_index, FileAction::Stream, policy, ready)
            .await?;

        let action = FileAction::Stream;
        async {
            self.transfer_started(session_id, file_index, action);
            let outcome = self.feed_file(shared, lease.entry(), buffer).await;
            drop(lease);
            self.transfer_finished(
                session_id,
                file_index,
                action,
                outcome
                    .as_ref()
                    .map(|summary| summary.bytes)
                    .map_err(StreamError::user_message),
            );
            outcome.map_err(SessionError::from)
        }
        .instrument(transfer_span(session_id, file_index, action.as_str()))
        .await
    }

    async fn feed_file<B>(
        &self,
        shared: &SessionShared,
        entry: &CatalogEntry,
        buffer: &mut B,
    ) -> Result<FeedSummary, StreamError>
    where
        B: PlaybackBuffer + ?Sized,
    {
        let stream = self
            .inner
            .engine
            .open_read_stream(shared.id, entry.index)
            .await
            .map_err(|err| StreamError::Open { source: err.into() })?;
        let mut feeder = StreamFeeder::new(buffer);
        feeder.feed(stream, &entry.mime(), &shared.cancel).await
    }

    async fn is_file_ready(&self, shared: &SessionShared, file_index: u32) -> SessionResult<bool> {
        let entry = shared.entry(file_index).await?;
        if shared.inner.read().await.state == SessionState::Completed {
            return Ok(true);
        }
        match self.inner.engine.file_progress(shared.id, file_index).await {
            Ok(downloaded) => Ok(downloaded >= entry.length),
            Err(err) => {
                debug!(file_index, error = %err, "per-file progress unavailable");
                Ok(false)
            }
        }
    }

    fn transfer_started(&self, session_id: Uuid, file_index: u32, action: FileAction) {
        debug!("transfer started");
        self.inner.bus.publish(Event::TransferStarted {
            session_id,
            file_index,
            action,
        });
    }

    fn transfer_finished(
        &self,
        session_id: Uuid,
        file_index: u32,
        action: FileAction,
        outcome: Result<u64, String>,
    ) {
        let event = match outcome {
            Ok(bytes) => {
                info!(bytes, "transfer completed");
                Event::TransferCompleted {
                    session_id,
                    file_index,
                    action,
                    bytes,
                }
            }
            Err(message) => {
                warn!(error = %message, "transfer failed");
                Event::TransferFailed {
                    session_id,
                    file_index,
                    action,
                    message,
                }
            }
        };
        self.inner.bus.publish(event);
    }
}
