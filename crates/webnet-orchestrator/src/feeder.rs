//! Feeds a chunk stream into a playback buffer for progressive playback.
//!
//! # Design
//! - `Idle → Feeding → (Draining | Errored) → Ended`. [`StreamFeeder::feed`]
//!   always finishes in `Ended`; the returned result tells the two paths apart.
//! - Chunks that arrive while the buffer is mid-update are queued and
//!   flushed in order on the next ready signal; none are dropped.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use webnet_torrent_core::{ChunkError, ChunkStream, PlaybackBuffer, PlaybackError};

use crate::error::StreamError;

/// Feeder lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederState {
    /// Waiting for the buffer to open.
    Idle,
    /// Appending chunks as they arrive.
    Feeding,
    /// Stream ended; flushing queued chunks.
    Draining,
    /// Feeding stopped after a failure; fed data stays in the buffer.
    Errored,
    /// Terminal. After a clean end the buffer was told no more data follows;
    /// after an error it was not.
    Ended,
}

/// Totals reported after a completed feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedSummary {
    /// Chunks appended.
    pub chunks: usize,
    /// Bytes appended.
    pub bytes: u64,
    /// Largest number of chunks queued at once.
    pub queued_peak: usize,
}

/// Drives one playback buffer from one chunk stream.
pub struct StreamFeeder<'a, B: PlaybackBuffer + ?Sized> {
    buffer: &'a mut B,
    state: FeederState,
    pending: VecDeque<Bytes>,
    summary: FeedSummary,
}

impl<'a, B: PlaybackBuffer + ?Sized> StreamFeeder<'a, B> {
    /// Feeder in the `Idle` state.
    pub fn new(buffer: &'a mut B) -> Self {
        Self {
            buffer,
            state: FeederState::Idle,
            pending: VecDeque::new(),
            summary: FeedSummary::default(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> FeederState {
        self.state
    }

    /// Chunks waiting for the buffer.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    /// Open the buffer with `mime` and feed `stream` until it ends, fails, or
    /// `cancel` fires. The feeder is `Ended` on return either way.
    ///
    /// # Errors
    ///
    /// [`StreamError::Playback`] when the buffer fails, [`StreamError::Stream`]
    /// on the stream's error signal, and [`StreamError::Cancelled`] on cancellation.
    pub async fn feed(
        &mut self,
        stream: ChunkStream,
        mime: &str,
        cancel: &CancellationToken,
    ) -> Result<FeedSummary, StreamError> {
        let outcome = self.run(stream, mime, cancel).await;
        if let Err(err) = &outcome {
            debug!(error = %err, previous = ?self.state, "feeding stopped");
            self.state = FeederState::Ended;
        }
        outcome
    }

    async fn run(
        &mut self,
        mut stream: ChunkStream,
        mime: &str,
        cancel: &CancellationToken,
    ) -> Result<FeedSummary, StreamError> {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(StreamError::Cancelled),
            opened = self.buffer.open(mime) => opened.map_err(|source| StreamError::Playback { source }),
        };
        if let Err(err) = opened {
            self.state = FeederState::Errored;
            return Err(err);
        }
        self.state = FeederState::Feeding;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.state = FeederState::Errored;
                    return Err(StreamError::Cancelled);
                }
                () = self.buffer.update_end(), if !self.pending.is_empty() => {
                    self.flush_ready()?;
                }
                next = stream.next() => match next {
                    Some(Ok(chunk)) => self.on_chunk(chunk)?,
                    Some(Err(cause)) => return Err(self.on_stream_error(cause)),
                    None => break,
                },
            }
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                self.state = FeederState::Errored;
                Err(StreamError::Cancelled)
            }
            ended = self.on_stream_end() => ended.map(|()| self.summary),
        }
    }

    /// Append `chunk` now if the buffer is idle, otherwise queue it.
    ///
    /// # Errors
    ///
    /// [`StreamError::Playback`] when the buffer rejects data for a reason
    /// other than being busy.
    pub fn on_chunk(&mut self, chunk: Bytes) -> Result<(), StreamError> {
        self.pending.push_back(chunk);
        self.summary.queued_peak = self.summary.queued_peak.max(self.pending.len());
        self.flush_ready()
    }

    /// Flush the queue, wait for the final update, and signal end-of-stream.
    ///
    /// # Errors
    ///
    /// [`StreamError::Playback`] when the buffer fails while draining.
    pub async fn on_stream_end(&mut self) -> Result<(), StreamError> {
        self.state = FeederState::Draining;
        while !self.pending.is_empty() {
            self.buffer.update_end().await;
            self.flush_ready()?;
        }
        self.buffer.update_end().await;
        if let Err(source) = self.buffer.mark_ended() {
            self.state = FeederState::Errored;
            return Err(StreamError::Playback { source });
        }
        self.state = FeederState::Ended;
        debug!(
            chunks = self.summary.chunks,
            bytes = self.summary.bytes,
            "playback buffer fed to the end"
        );
        Ok(())
    }

    /// Stop feeding after the stream's error signal.
    pub fn on_stream_error(&mut self, cause: ChunkError) -> StreamError {
        warn!(error = %cause, queued = self.pending.len(), "chunk stream failed during playback");
        self.state = FeederState::Errored;
        self.pending.clear();
        StreamError::Stream { source: cause }
    }

    fn flush_ready(&mut self) -> Result<(), StreamError> {
        while !self.buffer.is_updating() {
            let Some(chunk) = self.pending.pop_front() else {
                break;
            };
            let len = chunk.len() as u64;
            match self.buffer.append(chunk) {
                Ok(()) => {
                    self.summary.chunks += 1;
                    self.summary.bytes += len;
                }
                Err(PlaybackError::Busy { chunk }) => {
                    self.pending.push_front(chunk);
                    break;
                }
                Err(source) => {
                    self.state = FeederState::Errored;
                    self.pending.clear();
                    return Err(StreamError::Playback { source });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webnet_test_support::RecordingBuffer;
    use webnet_test_support::fixtures::{concat, patterned_chunks};
    use webnet_torrent_core::chunk_stream;

    fn ok_stream(chunks: Vec<Bytes>) -> ChunkStream {
        chunk_stream(tokio_stream::iter(chunks.into_iter().map(Ok)))
    }

    #[tokio::test]
    async fn every_chunk_reaches_the_buffer_in_order() {
        let chunks = patterned_chunks(16, 8);
        let mut buffer = RecordingBuffer::new();
        let probe = buffer.probe();

        let summary = StreamFeeder::new(&mut buffer)
            .feed(ok_stream(chunks.clone()), "video/mp4", &CancellationToken::new())
            .await
            .expect("feed");

        assert_eq!(summary.chunks, 16);
        assert_eq!(summary.bytes, 128);
        assert_eq!(probe.bytes(), concat(&chunks));
        assert!(probe.ended());
        assert_eq!(probe.mime().as_deref(), Some("video/mp4"));
    }

    #[tokio::test]
    async fn chunks_arriving_mid_update_are_queued_not_dropped() {
        let chunks = patterned_chunks(3, 2);
        let mut buffer = RecordingBuffer::new();
        let probe = buffer.probe();
        buffer.open("video/webm").await.expect("open");

        let mut feeder = StreamFeeder::new(&mut buffer);
        feeder.state = FeederState::Feeding;
        for chunk in chunks.clone() {
            feeder.on_chunk(chunk).expect("chunk accepted");
        }
        assert_eq!(feeder.queued(), 2);
        feeder.on_stream_end().await.expect("drain");
        assert_eq!(feeder.state(), FeederState::Ended);
        assert_eq!(feeder.queued(), 0);
        drop(feeder);

        assert_eq!(probe.appended(), chunks);
        assert!(probe.ended());
    }

    #[tokio::test]
    async fn stream_error_moves_a_manual_feeder_to_errored() {
        let mut buffer = RecordingBuffer::new();
        buffer.open("video/mp4").await.expect("open");
        let mut feeder = StreamFeeder::new(&mut buffer);
        feeder.state = FeederState::Feeding;
        feeder.on_chunk(Bytes::from_static(b"one")).expect("chunk accepted");

        let err = feeder.on_stream_error(ChunkError::interrupted("gone"));
        assert!(matches!(err, StreamError::Stream { .. }));
        assert_eq!(feeder.state(), FeederState::Errored);
    }

    #[tokio::test]
    async fn spurious_busy_requeues_at_the_front() {
        let chunks = patterned_chunks(4, 1);
        let mut buffer = RecordingBuffer::new().with_spurious_busy(3);
        let probe = buffer.probe();

        StreamFeeder::new(&mut buffer)
            .feed(ok_stream(chunks.clone()), "audio/mpeg", &CancellationToken::new())
            .await
            .expect("feed");

        assert_eq!(probe.appended(), chunks);
        assert!(probe.busy_rejections() >= 3);
    }

    #[tokio::test]
    async fn stream_error_stops_feeding_and_keeps_fed_data() {
        let stream = chunk_stream(tokio_stream::iter(vec![
            Ok(Bytes::from_static(b"one")),
            Err(ChunkError::interrupted("peer connection lost")),
            Ok(Bytes::from_static(b"late")),
        ]));
        let mut buffer = RecordingBuffer::new();
        let probe = buffer.probe();

        let mut feeder = StreamFeeder::new(&mut buffer);
        let err = feeder
            .feed(stream, "video/mp4", &CancellationToken::new())
            .await
            .expect_err("stream error");
        assert!(matches!(err, StreamError::Stream { .. }));
        assert_eq!(feeder.state(), FeederState::Ended);
        assert_eq!(feeder.queued(), 0);
        drop(feeder);
        assert_eq!(probe.bytes(), b"one");
        assert!(!probe.ended());
    }

    #[tokio::test]
    async fn open_failure_is_reported() {
        let mut buffer = RecordingBuffer::new().rejecting_open();
        let err = StreamFeeder::new(&mut buffer)
            .feed(ok_stream(Vec::new()), "video/x-matroska", &CancellationToken::new())
            .await
            .expect_err("open rejected");
        assert!(matches!(
            err,
            StreamError::Playback {
                source: PlaybackError::Rejected { .. }
            }
        ));
    }

    #[tokio::test]
    async fn closed_buffer_stops_the_feed() {
        let mut buffer = RecordingBuffer::new().closing_after(1);
        let err = StreamFeeder::new(&mut buffer)
            .feed(ok_stream(patterned_chunks(3, 1)), "video/mp4", &CancellationToken::new())
            .await
            .expect_err("closed");
        assert!(matches!(
            err,
            StreamError::Playback {
                source: PlaybackError::Closed
            }
        ));
    }

    #[tokio::test]
    async fn cancellation_aborts_a_stalled_stream() {
        let cancel = CancellationToken::new();
        let mut buffer = RecordingBuffer::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });
        let mut feeder = StreamFeeder::new(&mut buffer);
        let err = feeder
            .feed(chunk_stream(tokio_stream::pending()), "video/mp4", &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, StreamError::Cancelled));
        assert_eq!(feeder.state(), FeederState::Ended);
    }
}
