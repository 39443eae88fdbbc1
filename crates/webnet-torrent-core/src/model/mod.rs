//! Core torrent domain types and DTOs shared across the workspace.

use std::fmt::{self, Display, Formatter};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use webnet_events::IdentifierKind;

/// Validated reference describing how a session should be started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TorrentIdentifier {
    /// Magnet URI; always starts with the magnet scheme prefix.
    Magnet {
        /// Magnet URI exactly as supplied.
        uri: String,
    },
    /// Raw `.torrent` metainfo bytes; never empty.
    #[serde(rename = "file")]
    Metainfo {
        /// Bencoded metainfo payload.
        bytes: Vec<u8>,
    },
}

impl TorrentIdentifier {
    /// Kind discriminator carried on session events.
    #[must_use]
    pub const fn kind(&self) -> IdentifierKind {
        match self {
            Self::Magnet { .. } => IdentifierKind::Magnet,
            Self::Metainfo { .. } => IdentifierKind::Metainfo,
        }
    }
}

/// Identity under which the registry tracks a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SessionKey {
    /// The magnet URI itself.
    Magnet(String),
    /// Interim key for `.torrent` uploads: hex SHA-256 of the raw bytes.
    Metainfo(String),
    /// Engine-assigned content hash, lowercase.
    InfoHash(String),
}

impl SessionKey {
    /// Normalisation key derived from a validated identifier.
    #[must_use]
    pub fn for_identifier(identifier: &TorrentIdentifier) -> Self {
        match identifier {
            TorrentIdentifier::Magnet { uri } => Self::Magnet(uri.clone()),
            TorrentIdentifier::Metainfo { bytes } => {
                Self::Metainfo(format!("{:x}", Sha256::digest(bytes)))
            }
        }
    }

    /// Key for an engine-reported content hash.
    #[must_use]
    pub fn info_hash(hash: &str) -> Self {
        Self::InfoHash(hash.trim().to_ascii_lowercase())
    }
}

impl Display for SessionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Magnet(uri) => formatter.write_str(uri),
            Self::Metainfo(digest) => write!(formatter, "metainfo:{digest}"),
            Self::InfoHash(hash) => write!(formatter, "btih:{hash}"),
        }
    }
}

/// Request payload for admitting a session into the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSession {
    /// Registry identifier assigned by the caller.
    pub id: Uuid,
    /// Validated torrent reference.
    pub identifier: TorrentIdentifier,
    /// Knobs applied alongside admission.
    #[serde(default)]
    pub options: AddSessionOptions,
}

/// Optional knobs that accompany an admission request.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AddSessionOptions {
    /// Tracker announce URLs.
    #[serde(default)]
    pub announce: Vec<String>,
}

/// Priority hint the engine uses when scheduling pieces.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FilePriority {
    /// Do not download the file.
    Skip,
    /// Throttle the download priority.
    Low,
    /// Default priority level assigned by the engine.
    #[default]
    Normal,
    /// Download ahead of everything else.
    High,
}

/// File listed in session metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TorrentFile {
    /// Index of the file within the torrent metainfo.
    pub index: u32,
    /// Relative path of the file within the torrent payload.
    pub name: String,
    /// Declared size of the file in bytes.
    pub length: u64,
}

/// Download telemetry reported by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EngineTelemetry {
    /// Bytes received and verified so far.
    pub downloaded_bytes: u64,
    /// Total payload length; zero until metadata is known.
    pub total_bytes: u64,
    /// Current download throughput.
    pub bytes_per_second: u64,
}

/// Discovery mechanism named in a no-peers warning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PeerSource {
    /// Tracker announces returned no peers.
    Tracker,
    /// DHT lookups returned no peers.
    Dht,
    /// Local service discovery found nobody.
    Lsd,
    /// Peer exchange produced no candidates.
    PeerExchange,
}

impl PeerSource {
    /// Lowercase label used in events and status lines.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tracker => "tracker",
            Self::Dht => "dht",
            Self::Lsd => "lsd",
            Self::PeerExchange => "ut_pex",
        }
    }
}

/// Events emitted by an engine session before the registry translates them
/// into bus events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Metadata became available.
    Metadata {
        /// Content hash, when the engine knows it.
        info_hash: Option<String>,
        /// Content name.
        name: String,
        /// Files in metainfo order.
        files: Vec<TorrentFile>,
    },
    /// Download telemetry changed.
    Download(EngineTelemetry),
    /// Every piece was received.
    Done,
    /// The session failed.
    Error {
        /// Engine-provided failure description.
        message: String,
    },
    /// A discovery source returned no peers.
    NoPeers {
        /// Source that came up empty.
        source: PeerSource,
    },
}

/// In-memory file handed to a torrent creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File name as it should appear inside the torrent.
    pub name: String,
    /// File contents.
    pub bytes: Bytes,
}

/// Options passed to a torrent creator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateOptions {
    /// Torrent name.
    pub name: String,
    /// Tracker announce URLs.
    pub announce: Vec<String>,
    /// Value recorded in the `created by` field.
    pub created_by: String,
}
