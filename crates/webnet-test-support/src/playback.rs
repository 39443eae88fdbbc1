//! Playback buffer double that records appended chunks.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use webnet_torrent_core::{PlaybackBuffer, PlaybackError};

#[derive(Debug, Default)]
struct BufferLog {
    mime: Option<String>,
    appended: Vec<Bytes>,
    busy_rejections: usize,
    ended: bool,
}

/// Buffer that enters an update after every append, like a media source buffer.
///
/// `update_end` completes the pending update after yielding to the scheduler.
#[derive(Debug, Default)]
pub struct RecordingBuffer {
    log: Arc<Mutex<BufferLog>>,
    updating: bool,
    spurious_busy: usize,
    reject_open: bool,
    close_after: Option<usize>,
}

impl RecordingBuffer {
    /// Buffer that accepts every append once idle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report busy on the next `count` appends even when idle.
    #[must_use]
    pub const fn with_spurious_busy(mut self, count: usize) -> Self {
        self.spurious_busy = count;
        self
    }

    /// Fail to open.
    #[must_use]
    pub const fn rejecting_open(mut self) -> Self {
        self.reject_open = true;
        self
    }

    /// Close the buffer after `count` successful appends.
    #[must_use]
    pub const fn closing_after(mut self, count: usize) -> Self {
        self.close_after = Some(count);
        self
    }

    /// Handle for inspecting the buffer after it has been handed off.
    #[must_use]
    pub fn probe(&self) -> BufferProbe {
        BufferProbe {
            log: Arc::clone(&self.log),
        }
    }

    fn log(&self) -> MutexGuard<'_, BufferLog> {
        lock(&self.log)
    }
}

fn lock(log: &Mutex<BufferLog>) -> MutexGuard<'_, BufferLog> {
    log.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl PlaybackBuffer for RecordingBuffer {
    async fn open(&mut self, mime: &str) -> Result<(), PlaybackError> {
        if self.reject_open {
            return Err(PlaybackError::Rejected {
                reason: format!("unsupported mime type {mime}"),
            });
        }
        self.log().mime = Some(mime.to_string());
        Ok(())
    }

    fn is_updating(&self) -> bool {
        self.updating
    }

    async fn update_end(&mut self) {
        if self.updating {
            tokio::task::yield_now().await;
            self.updating = false;
        }
    }

    fn append(&mut self, chunk: Bytes) -> Result<(), PlaybackError> {
        if self.updating {
            self.log().busy_rejections += 1;
            return Err(PlaybackError::Busy { chunk });
        }
        if self.spurious_busy > 0 {
            self.spurious_busy -= 1;
            self.log().busy_rejections += 1;
            return Err(PlaybackError::Busy { chunk });
        }
        let mut log = self.log();
        if self.close_after.is_some_and(|limit| log.appended.len() >= limit) {
            return Err(PlaybackError::Closed);
        }
        log.appended.push(chunk);
        drop(log);
        self.updating = true;
        Ok(())
    }

    fn mark_ended(&mut self) -> Result<(), PlaybackError> {
        self.log().ended = true;
        Ok(())
    }
}

/// Read-only view over a [`RecordingBuffer`].
#[derive(Debug, Clone)]
pub struct BufferProbe {
    log: Arc<Mutex<BufferLog>>,
}

impl BufferProbe {
    /// Chunks appended so far, in order.
    #[must_use]
    pub fn appended(&self) -> Vec<Bytes> {
        lock(&self.log).appended.clone()
    }

    /// All appended bytes concatenated.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        lock(&self.log)
            .appended
            .iter()
            .flat_map(|chunk| chunk.iter().copied())
            .collect()
    }

    /// Whether end-of-stream was signalled.
    #[must_use]
    pub fn ended(&self) -> bool {
        lock(&self.log).ended
    }

    /// MIME type the buffer was opened with.
    #[must_use]
    pub fn mime(&self) -> Option<String> {
        lock(&self.log).mime.clone()
    }

    /// Appends refused with a busy error.
    #[must_use]
    pub fn busy_rejections(&self) -> usize {
        lock(&self.log).busy_rejections
    }
}
