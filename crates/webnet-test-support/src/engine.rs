//! In-memory torrent engine that records every call it receives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;
use webnet_torrent_core::{
    AddSession, ChunkError, ChunkStream, EngineEvent, EngineSession, FilePriority, TorrentEngine,
    TorrentFile, TorrentIdentifier, chunk_stream,
};

const SESSION_EVENT_CAPACITY: usize = 64;
const STREAM_CAPACITY: usize = 4;

/// Call observed by the engine, in order of completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// A session was admitted.
    Add {
        /// Session identifier.
        id: Uuid,
        /// Identifier supplied by the caller.
        identifier: TorrentIdentifier,
        /// Announce list supplied by the caller.
        announce: Vec<String>,
    },
    /// A session removal finished.
    Remove {
        /// Session identifier.
        id: Uuid,
    },
    /// A chunk stream was opened.
    OpenStream {
        /// Session identifier.
        id: Uuid,
        /// File index.
        file_index: u32,
    },
    /// A file priority was applied.
    SetPriority {
        /// Session identifier.
        id: Uuid,
        /// File index.
        file_index: u32,
        /// Applied priority.
        priority: FilePriority,
    },
}

/// Scripted content served for one file index.
#[derive(Debug, Clone)]
pub struct ScriptedFile {
    /// File name reported in metadata.
    pub name: String,
    /// Chunks served by `open_read_stream`.
    pub chunks: Vec<Bytes>,
    /// Emit an error after this many chunks.
    pub fail_after: Option<usize>,
    /// Keep the stream open after the last chunk instead of ending it.
    pub stall: bool,
    /// Bytes reported by `file_progress`; defaults to the full length.
    pub downloaded: Option<u64>,
}

impl ScriptedFile {
    /// File that serves `chunks` and then ends.
    #[must_use]
    pub fn new(name: impl Into<String>, chunks: Vec<Bytes>) -> Self {
        Self {
            name: name.into(),
            chunks,
            fail_after: None,
            stall: false,
            downloaded: None,
        }
    }

    /// Emit an error after `count` chunks.
    #[must_use]
    pub const fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Never signal the end of the stream.
    #[must_use]
    pub const fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    /// Report only `bytes` as downloaded.
    #[must_use]
    pub const fn partially_downloaded(mut self, bytes: u64) -> Self {
        self.downloaded = Some(bytes);
        self
    }

    /// Declared length: the sum of all chunk lengths.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.len() as u64).sum()
    }
}

struct ActiveSession {
    identity: String,
    sender: mpsc::Sender<EngineEvent>,
    priorities: HashMap<u32, FilePriority>,
}

#[derive(Default)]
struct EngineState {
    sessions: HashMap<Uuid, ActiveSession>,
    calls: Vec<EngineCall>,
    files: Vec<ScriptedFile>,
    reject_adds: Option<String>,
    fail_removals: Option<String>,
    removal_delay: Duration,
    info_hash: Option<String>,
    name: Option<String>,
    priorities_unsupported: bool,
    file_progress_unsupported: bool,
}

/// Cloneable in-memory engine; clones share state.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MemoryEngine {
    /// Engine with no scripted files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Serve `file` at the next file index for every session.
    #[must_use]
    pub fn with_file(self, file: ScriptedFile) -> Self {
        self.lock().files.push(file);
        self
    }

    /// Delay removal completion by `delay`.
    #[must_use]
    pub fn with_removal_delay(self, delay: Duration) -> Self {
        self.lock().removal_delay = delay;
        self
    }

    /// Reject every add with `message`.
    #[must_use]
    pub fn rejecting_adds(self, message: impl Into<String>) -> Self {
        self.lock().reject_adds = Some(message.into());
        self
    }

    /// Fail every removal with `message`.
    #[must_use]
    pub fn failing_removals(self, message: impl Into<String>) -> Self {
        self.lock().fail_removals = Some(message.into());
        self
    }

    /// Report `hash` as the info hash at admission time.
    #[must_use]
    pub fn with_info_hash(self, hash: impl Into<String>) -> Self {
        self.lock().info_hash = Some(hash.into());
        self
    }

    /// Report `name` at admission time.
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.lock().name = Some(name.into());
        self
    }

    /// Behave like an engine without priority support.
    #[must_use]
    pub fn without_priorities(self) -> Self {
        self.lock().priorities_unsupported = true;
        self
    }

    /// Behave like an engine without per-file progress.
    #[must_use]
    pub fn without_file_progress(self) -> Self {
        self.lock().file_progress_unsupported = true;
        self
    }

    /// Calls observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Sessions currently admitted.
    #[must_use]
    pub fn active_sessions(&self) -> Vec<Uuid> {
        self.lock().sessions.keys().copied().collect()
    }

    /// Priorities applied to a session's files.
    #[must_use]
    pub fn priorities(&self, id: Uuid) -> HashMap<u32, FilePriority> {
        self.lock()
            .sessions
            .get(&id)
            .map(|session| session.priorities.clone())
            .unwrap_or_default()
    }

    /// Metadata event describing the scripted files.
    #[must_use]
    pub fn metadata_event(&self, name: &str) -> EngineEvent {
        let state = self.lock();
        EngineEvent::Metadata {
            info_hash: state.info_hash.clone(),
            name: name.to_string(),
            files: state
                .files
                .iter()
                .enumerate()
                .map(|(index, file)| TorrentFile {
                    index: u32::try_from(index).unwrap_or(u32::MAX),
                    name: file.name.clone(),
                    length: file.length(),
                })
                .collect(),
        }
    }

    /// Deliver `event` on the session's event channel.
    ///
    /// # Errors
    ///
    /// Returns an error when the session is unknown or its subscriber is gone.
    pub async fn emit(&self, id: Uuid, event: EngineEvent) -> Result<()> {
        let sender = self
            .lock()
            .sessions
            .get(&id)
            .map(|session| session.sender.clone())
            .ok_or_else(|| anyhow!("unknown session {id}"))?;
        sender
            .send(event)
            .await
            .map_err(|_| anyhow!("session {id} no longer listening"))
    }

    /// Drop the engine side of a session's event channel.
    pub fn close_events(&self, id: Uuid) {
        if let Some(session) = self.lock().sessions.get_mut(&id) {
            let (closed, _) = mpsc::channel(1);
            session.sender = closed;
        }
    }
}

fn identity_of(identifier: &TorrentIdentifier) -> String {
    match identifier {
        TorrentIdentifier::Magnet { uri } => uri.clone(),
        TorrentIdentifier::Metainfo { bytes } => format!("{bytes:?}"),
    }
}

#[async_trait]
impl TorrentEngine for MemoryEngine {
    async fn add_session(&self, request: AddSession) -> Result<EngineSession> {
        let mut state = self.lock();
        if let Some(message) = &state.reject_adds {
            bail!("{message}");
        }
        let identity = identity_of(&request.identifier);
        if state
            .sessions
            .values()
            .any(|session| session.identity == identity)
        {
            bail!("torrent already added");
        }

        let (sender, events) = mpsc::channel(SESSION_EVENT_CAPACITY);
        state.sessions.insert(
            request.id,
            ActiveSession {
                identity,
                sender,
                priorities: HashMap::new(),
            },
        );
        state.calls.push(EngineCall::Add {
            id: request.id,
            identifier: request.identifier,
            announce: request.options.announce,
        });
        Ok(EngineSession {
            info_hash: state.info_hash.clone(),
            name: state.name.clone(),
            events,
        })
    }

    async fn remove_session(&self, id: Uuid) -> Result<()> {
        let (delay, failure) = {
            let state = self.lock();
            (state.removal_delay, state.fail_removals.clone())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = failure {
            bail!("{message}");
        }
        let mut state = self.lock();
        if state.sessions.remove(&id).is_some() {
            state.calls.push(EngineCall::Remove { id });
        }
        Ok(())
    }

    async fn open_read_stream(&self, id: Uuid, file_index: u32) -> Result<ChunkStream> {
        let file = {
            let mut state = self.lock();
            if !state.sessions.contains_key(&id) {
                bail!("unknown session {id}");
            }
            let file = usize::try_from(file_index)
                .ok()
                .and_then(|index| state.files.get(index))
                .cloned()
                .ok_or_else(|| anyhow!("unknown file {file_index}"))?;
            state.calls.push(EngineCall::OpenStream { id, file_index });
            file
        };

        let (sender, receiver) = mpsc::channel(STREAM_CAPACITY);
        tokio::spawn(async move {
            let limit = file.fail_after.unwrap_or(file.chunks.len());
            for chunk in file.chunks.into_iter().take(limit) {
                if sender.send(Ok(chunk)).await.is_err() {
                    return;
                }
            }
            if file.fail_after.is_some() {
                let _ = sender
                    .send(Err(ChunkError::interrupted("peer connection lost")))
                    .await;
            } else if file.stall {
                sender.closed().await;
            }
        });
        Ok(chunk_stream(ReceiverStream::new(receiver)))
    }

    async fn set_file_priority(
        &self,
        id: Uuid,
        file_index: u32,
        priority: FilePriority,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.priorities_unsupported {
            bail!("file priority updates not supported by this engine");
        }
        let session = state
            .sessions
            .get_mut(&id)
            .ok_or_else(|| anyhow!("unknown session {id}"))?;
        session.priorities.insert(file_index, priority);
        state.calls.push(EngineCall::SetPriority {
            id,
            file_index,
            priority,
        });
        Ok(())
    }

    async fn file_progress(&self, id: Uuid, file_index: u32) -> Result<u64> {
        let state = self.lock();
        if state.file_progress_unsupported {
            bail!("per-file progress not supported by this engine");
        }
        if !state.sessions.contains_key(&id) {
            bail!("unknown session {id}");
        }
        let file = usize::try_from(file_index)
            .ok()
            .and_then(|index| state.files.get(index))
            .ok_or_else(|| anyhow!("unknown file {file_index}"))?;
        Ok(file.downloaded.unwrap_or_else(|| file.length()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{SAMPLE_MAGNET, chunks};
    use tokio_stream::StreamExt;
    use webnet_torrent_core::AddSessionOptions;

    fn add_request(id: Uuid) -> AddSession {
        AddSession {
            id,
            identifier: TorrentIdentifier::Magnet {
                uri: SAMPLE_MAGNET.into(),
            },
            options: AddSessionOptions::default(),
        }
    }

    #[tokio::test]
    async fn duplicate_identifiers_are_rejected_until_removed() -> Result<()> {
        let engine = MemoryEngine::new();
        let first = Uuid::new_v4();
        engine.add_session(add_request(first)).await?;
        let err = engine
            .add_session(add_request(Uuid::new_v4()))
            .await
            .expect_err("duplicate add");
        assert!(err.to_string().contains("already added"));

        engine.remove_session(first).await?;
        engine.remove_session(first).await?;
        engine.add_session(add_request(Uuid::new_v4())).await?;
        let removals = engine
            .calls()
            .iter()
            .filter(|call| matches!(call, EngineCall::Remove { .. }))
            .count();
        assert_eq!(removals, 1);
        Ok(())
    }

    #[tokio::test]
    async fn scripted_streams_fail_after_configured_chunks() -> Result<()> {
        let engine = MemoryEngine::new()
            .with_file(ScriptedFile::new("a.bin", chunks(&[b"1", b"2", b"3"])).failing_after(2));
        let id = Uuid::new_v4();
        engine.add_session(add_request(id)).await?;

        let mut stream = engine.open_read_stream(id, 0).await?;
        assert!(matches!(stream.next().await, Some(Ok(_))));
        assert!(matches!(stream.next().await, Some(Ok(_))));
        assert!(matches!(stream.next().await, Some(Err(_))));
        assert!(stream.next().await.is_none());
        assert!(engine.open_read_stream(id, 5).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn priorities_and_events_reach_the_session() -> Result<()> {
        let engine = MemoryEngine::new().with_file(ScriptedFile::new("notes.txt", chunks(&[b"x"])));
        let id = Uuid::new_v4();
        let mut session = engine.add_session(add_request(id)).await?;

        engine.set_file_priority(id, 0, FilePriority::High).await?;
        assert_eq!(engine.priorities(id).get(&0), Some(&FilePriority::High));

        engine.emit(id, engine.metadata_event("Notes")).await?;
        match session.events.recv().await {
            Some(EngineEvent::Metadata { name, files, .. }) => {
                assert_eq!(name, "Notes");
                assert_eq!(files[0].length, 1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(engine.file_progress(id, 0).await?, 1);
        Ok(())
    }
}
