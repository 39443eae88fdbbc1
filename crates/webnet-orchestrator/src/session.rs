//! Session handles shared between the registry, its workers, and callers.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use webnet_config::StreamPolicy;
use webnet_events::{FileAction, IdentifierKind, SessionState};
use webnet_torrent_core::{EngineTelemetry, SessionKey};

use crate::catalog::{CatalogEntry, CatalogView, FileCatalog, FileLease};
use crate::error::SessionResult;
use crate::progress::ProgressSample;

#[derive(Debug)]
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) name: Option<String>,
    pub(crate) info_hash: Option<String>,
    pub(crate) telemetry: Option<EngineTelemetry>,
    pub(crate) progress: Option<ProgressSample>,
    pub(crate) catalog: FileCatalog,
}

#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) id: Uuid,
    pub(crate) key: SessionKey,
    pub(crate) kind: IdentifierKind,
    pub(crate) cancel: CancellationToken,
    pub(crate) inner: RwLock<SessionInner>,
}

impl SessionShared {
    pub(crate) fn new(
        id: Uuid,
        key: SessionKey,
        kind: IdentifierKind,
        name: Option<String>,
        info_hash: Option<String>,
        media_extensions: &[String],
    ) -> Self {
        Self {
            id,
            key,
            kind,
            cancel: CancellationToken::new(),
            inner: RwLock::new(SessionInner {
                state: SessionState::AwaitingMetadata,
                name,
                info_hash,
                telemetry: None,
                progress: None,
                catalog: FileCatalog::new(id, media_extensions),
            }),
        }
    }

    pub(crate) async fn entry(&self, file_index: u32) -> SessionResult<CatalogEntry> {
        self.inner.read().await.catalog.entry(file_index).cloned()
    }

    pub(crate) async fn authorize(
        &self,
        file_index: u32,
        action: FileAction,
        policy: StreamPolicy,
        ready: bool,
    ) -> SessionResult<FileLease> {
        self.inner
            .read()
            .await
            .catalog
            .authorize(file_index, action, policy, ready)
    }
}

/// Cloneable handle to one live session.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) shared: Arc<SessionShared>,
}

impl Session {
    /// Registry identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Key the session was admitted under.
    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.shared.key
    }

    /// Identifier kind.
    #[must_use]
    pub fn kind(&self) -> IdentifierKind {
        self.shared.kind
    }

    /// Whether the session has been removed.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Point-in-time view of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.shared.inner.read().await;
        SessionSnapshot {
            id: self.shared.id,
            key: self.shared.key.clone(),
            kind: self.shared.kind,
            state: inner.state.clone(),
            name: inner.name.clone(),
            info_hash: inner.info_hash.clone(),
            telemetry: inner.telemetry,
            progress: inner.progress,
            catalog: inner.catalog.view(),
        }
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Registry identifier.
    pub id: Uuid,
    /// Key the session was admitted under.
    pub key: SessionKey,
    /// Identifier kind.
    pub kind: IdentifierKind,
    /// Lifecycle state.
    pub state: SessionState,
    /// Content name once known.
    pub name: Option<String>,
    /// Engine-assigned content hash once known.
    pub info_hash: Option<String>,
    /// Latest raw telemetry.
    pub telemetry: Option<EngineTelemetry>,
    /// Latest derived progress sample.
    pub progress: Option<ProgressSample>,
    /// File listing once metadata arrived.
    pub catalog: Option<CatalogView>,
}
