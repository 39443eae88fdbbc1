//! Event payload types carried between the registry and its subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each event emitted on the bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed session events surfaced to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A session was admitted by the engine.
    SessionAdded {
        /// Registry identifier of the new session.
        session_id: Uuid,
        /// Display form of the identity key the session is tracked under.
        key: String,
        /// Whether the session came from a magnet link or a `.torrent` file.
        kind: IdentifierKind,
        /// Name reported by the engine at admission time, if any.
        name: Option<String>,
    },
    /// Session metadata arrived and the file catalog was built.
    MetadataReceived {
        /// Session the metadata belongs to.
        session_id: Uuid,
        /// Content name reported by the engine.
        name: String,
        /// Total payload length in bytes.
        total_bytes: u64,
        /// Catalogued files in engine order.
        files: Vec<DiscoveredFile>,
    },
    /// A progress sample was derived from engine telemetry.
    Progress {
        /// Session being tracked.
        session_id: Uuid,
        /// Completion percentage in `0.0..=100.0`.
        percent: f64,
        /// Bytes downloaded so far.
        bytes_downloaded: u64,
        /// Total bytes expected (zero until metadata is known).
        bytes_total: u64,
        /// Current download throughput.
        bytes_per_second: u64,
        /// Estimated seconds remaining; `None` while throughput is zero.
        eta_seconds: Option<f64>,
    },
    /// Session lifecycle state changed.
    StateChanged {
        /// Session whose state changed.
        session_id: Uuid,
        /// Updated state.
        state: SessionState,
    },
    /// Session finished downloading every file.
    Completed {
        /// Completed session.
        session_id: Uuid,
    },
    /// The engine could not find peers through one discovery source.
    NoPeers {
        /// Session still waiting for peers.
        session_id: Uuid,
        /// Discovery source that came up empty (`tracker`, `dht`, ...).
        source: String,
    },
    /// The engine reported a fatal session error.
    SessionFailed {
        /// Failed session.
        session_id: Uuid,
        /// Engine-provided failure description.
        message: String,
    },
    /// Session was removed from the engine and the registry.
    SessionRemoved {
        /// Removed session.
        session_id: Uuid,
    },
    /// A download or stream consumer attached to a file.
    TransferStarted {
        /// Owning session.
        session_id: Uuid,
        /// File index within the session.
        file_index: u32,
        /// Consumer kind.
        action: FileAction,
    },
    /// A download or stream consumer finished successfully.
    TransferCompleted {
        /// Owning session.
        session_id: Uuid,
        /// File index within the session.
        file_index: u32,
        /// Consumer kind.
        action: FileAction,
        /// Bytes delivered to the artifact or playback buffer.
        bytes: u64,
    },
    /// A download or stream consumer failed or was cancelled.
    TransferFailed {
        /// Owning session.
        session_id: Uuid,
        /// File index within the session.
        file_index: u32,
        /// Consumer kind.
        action: FileAction,
        /// User-facing failure description.
        message: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for log fields and filters.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionAdded { .. } => "session_added",
            Self::MetadataReceived { .. } => "metadata_received",
            Self::Progress { .. } => "progress",
            Self::StateChanged { .. } => "state_changed",
            Self::Completed { .. } => "completed",
            Self::NoPeers { .. } => "no_peers",
            Self::SessionFailed { .. } => "session_failed",
            Self::SessionRemoved { .. } => "session_removed",
            Self::TransferStarted { .. } => "transfer_started",
            Self::TransferCompleted { .. } => "transfer_completed",
            Self::TransferFailed { .. } => "transfer_failed",
        }
    }

    /// Session the event refers to.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        match self {
            Self::SessionAdded { session_id, .. }
            | Self::MetadataReceived { session_id, .. }
            | Self::Progress { session_id, .. }
            | Self::StateChanged { session_id, .. }
            | Self::Completed { session_id }
            | Self::NoPeers { session_id, .. }
            | Self::SessionFailed { session_id, .. }
            | Self::SessionRemoved { session_id }
            | Self::TransferStarted { session_id, .. }
            | Self::TransferCompleted { session_id, .. }
            | Self::TransferFailed { session_id, .. } => *session_id,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event.
    pub event: Event,
}

/// Individual file listed in a session's catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Index of the file within the session.
    pub index: u32,
    /// File name (relative path inside the torrent payload).
    pub name: String,
    /// Declared length in bytes.
    pub size_bytes: u64,
    /// Whether the file was classified as streamable media.
    pub media: bool,
}

/// Lifecycle states a session moves through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Admitted by the engine, waiting for metadata or peers.
    AwaitingMetadata,
    /// Metadata known, payload transferring.
    Downloading,
    /// Every byte has been received.
    Completed,
    /// Engine reported a fatal error.
    Failed {
        /// Engine-provided failure description.
        message: String,
    },
}

impl SessionState {
    /// Whether the session will not receive further telemetry.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// Kind of torrent reference a session was created from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Magnet URI text.
    Magnet,
    /// Raw `.torrent` file bytes.
    Metainfo,
}

/// Per-file actions a user can request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    /// Assemble the file into a single artifact for save-as delivery.
    Download,
    /// Feed the file incrementally into a playback buffer.
    Stream,
}

impl FileAction {
    /// Lowercase label used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Stream => "stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_and_session_id_cover_variants() {
        let id = Uuid::from_u128(7);
        let events = [
            (
                Event::Progress {
                    session_id: id,
                    percent: 10.0,
                    bytes_downloaded: 1,
                    bytes_total: 10,
                    bytes_per_second: 0,
                    eta_seconds: None,
                },
                "progress",
            ),
            (Event::Completed { session_id: id }, "completed"),
            (Event::SessionRemoved { session_id: id }, "session_removed"),
            (
                Event::TransferFailed {
                    session_id: id,
                    file_index: 2,
                    action: FileAction::Stream,
                    message: "boom".into(),
                },
                "transfer_failed",
            ),
        ];

        for (event, kind) in events {
            assert_eq!(event.kind(), kind);
            assert_eq!(event.session_id(), id);
        }
    }

    #[test]
    fn events_serialize_with_snake_case_tags() -> Result<(), serde_json::Error> {
        let event = Event::StateChanged {
            session_id: Uuid::nil(),
            state: SessionState::Failed {
                message: "corrupt".into(),
            },
        };
        let json = serde_json::to_value(&event)?;
        assert_eq!(json["type"], "state_changed");
        assert_eq!(json["state"]["failed"]["message"], "corrupt");

        let decoded: Event = serde_json::from_value(json)?;
        assert_eq!(decoded, event);
        assert!(SessionState::Completed.is_terminal());
        assert!(!SessionState::Downloading.is_terminal());
        Ok(())
    }
}
