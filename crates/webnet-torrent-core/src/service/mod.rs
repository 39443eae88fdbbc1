//! Engine, creator, and playback traits implemented by integrators.

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::PlaybackError;
use crate::model::{AddSession, CreateOptions, EngineEvent, FilePriority, SourceFile};
use crate::stream::ChunkStream;

/// Handle returned by the engine once it has accepted a session.
///
/// Resolves as soon as the engine reports the session object; metadata
/// arrives later on `events`.
#[derive(Debug)]
pub struct EngineSession {
    /// Content hash, when the engine can derive it at admission time.
    pub info_hash: Option<String>,
    /// Display name, when known at admission time.
    pub name: Option<String>,
    /// Session-scoped event subscription.
    pub events: mpsc::Receiver<EngineEvent>,
}

/// Torrent engine the orchestrator drives. Wire-protocol work lives behind it.
#[async_trait]
pub trait TorrentEngine: Send + Sync {
    /// Admit a new session.
    async fn add_session(&self, request: AddSession) -> anyhow::Result<EngineSession>;

    /// Remove a session; removing an unknown session succeeds.
    async fn remove_session(&self, id: Uuid) -> anyhow::Result<()>;

    /// Open a sequential chunk stream over one file of a session.
    async fn open_read_stream(&self, id: Uuid, file_index: u32) -> anyhow::Result<ChunkStream>;

    /// Adjust a file's download priority; default implementation reports lack of support.
    async fn set_file_priority(
        &self,
        id: Uuid,
        file_index: u32,
        priority: FilePriority,
    ) -> anyhow::Result<()> {
        let _ = (id, file_index, priority);
        bail!("file priority updates not supported by this engine");
    }

    /// Bytes downloaded for a single file; default implementation reports lack of support.
    async fn file_progress(&self, id: Uuid, file_index: u32) -> anyhow::Result<u64> {
        let _ = (id, file_index);
        bail!("per-file progress not supported by this engine");
    }
}

/// Produces bencoded torrent descriptors from local files.
#[async_trait]
pub trait TorrentCreator: Send + Sync {
    /// Build a descriptor for `files`.
    async fn create(&self, files: &[SourceFile], options: &CreateOptions)
    -> anyhow::Result<Vec<u8>>;
}

/// Media-player-facing buffer that accepts incrementally appended bytes.
#[async_trait]
pub trait PlaybackBuffer: Send {
    /// Attach to the player and resolve once the buffer is ready for data.
    async fn open(&mut self, mime: &str) -> Result<(), PlaybackError>;

    /// Whether an append is still being processed.
    fn is_updating(&self) -> bool;

    /// Resolve once no update is in progress; returns immediately when idle.
    async fn update_end(&mut self);

    /// Start appending `chunk`. Fails with [`PlaybackError::Busy`] mid-update.
    fn append(&mut self, chunk: Bytes) -> Result<(), PlaybackError>;

    /// Signal that no more data will arrive.
    fn mark_ended(&mut self) -> Result<(), PlaybackError>;
}
