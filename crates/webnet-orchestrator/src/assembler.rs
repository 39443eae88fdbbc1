//! Collects a chunk stream into one in-memory artifact for save-as delivery.

use bytes::{Bytes, BytesMut};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use webnet_torrent_core::ChunkStream;

use crate::error::AssemblyError;

/// Complete file contents ready to hand to a save-as mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Suggested file name.
    pub name: String,
    /// MIME type of the contents.
    pub content_type: String,
    /// File contents.
    pub bytes: Bytes,
}

impl Artifact {
    /// Size of the contents in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the artifact carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Last path component of a torrent-relative file name.
#[must_use]
pub fn display_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Consume `stream` in arrival order and concatenate every chunk.
///
/// On an error signal, or when `cancel` fires, the chunks received so far are
/// dropped and no artifact is produced.
///
/// # Errors
///
/// [`AssemblyError::Stream`] when the stream fails and
/// [`AssemblyError::Cancelled`] when `cancel` fires first.
pub async fn assemble(
    mut stream: ChunkStream,
    name: &str,
    content_type: &str,
    cancel: &CancellationToken,
) -> Result<Artifact, AssemblyError> {
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut total = 0_usize;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AssemblyError::Cancelled),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                total += chunk.len();
                chunks.push(chunk);
            }
            Some(Err(source)) => {
                debug!(received = chunks.len(), error = %source, "discarding partial artifact");
                return Err(AssemblyError::Stream {
                    received_chunks: chunks.len(),
                    source,
                });
            }
            None => break,
        }
    }

    let bytes = if chunks.len() == 1 {
        chunks.pop().unwrap_or_default()
    } else {
        let mut buffer = BytesMut::with_capacity(total);
        for chunk in &chunks {
            buffer.extend_from_slice(chunk);
        }
        buffer.freeze()
    };

    Ok(Artifact {
        name: display_name(name).to_string(),
        content_type: content_type.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use webnet_torrent_core::{ChunkError, chunk_stream};

    fn stream_of(items: Vec<Result<Bytes, ChunkError>>) -> ChunkStream {
        chunk_stream(tokio_stream::iter(items))
    }

    #[tokio::test]
    async fn chunks_are_concatenated_in_order() {
        let stream = stream_of(vec![
            Ok(Bytes::from_static(b"c1")),
            Ok(Bytes::from_static(b"c2")),
            Ok(Bytes::from_static(b"c3")),
        ]);
        let artifact = assemble(stream, "Sintel/Sintel.mp4", "video/mp4", &CancellationToken::new())
            .await
            .expect("artifact");
        assert_eq!(artifact.bytes.as_ref(), b"c1c2c3");
        assert_eq!(artifact.name, "Sintel.mp4");
        assert_eq!(artifact.content_type, "video/mp4");
        assert_eq!(artifact.len(), 6);
    }

    #[tokio::test]
    async fn empty_stream_yields_empty_artifact() {
        let artifact = assemble(stream_of(Vec::new()), "empty.txt", "text/plain", &CancellationToken::new())
            .await
            .expect("artifact");
        assert!(artifact.is_empty());
    }

    #[tokio::test]
    async fn error_after_two_of_five_chunks_discards_partial_data() {
        let stream = stream_of(vec![
            Ok(Bytes::from_static(b"1")),
            Ok(Bytes::from_static(b"2")),
            Err(ChunkError::interrupted("peer connection lost")),
            Ok(Bytes::from_static(b"4")),
            Ok(Bytes::from_static(b"5")),
        ]);
        let err = assemble(stream, "a.bin", "application/octet-stream", &CancellationToken::new())
            .await
            .expect_err("assembly must fail");
        match err {
            AssemblyError::Stream { received_chunks, .. } => assert_eq!(received_chunks, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_returns_no_artifact() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stream = chunk_stream(tokio_stream::pending());
        let err = assemble(stream, "a.bin", "application/octet-stream", &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, AssemblyError::Cancelled));
    }

    #[test]
    fn display_name_strips_directories() {
        assert_eq!(display_name("a/b/c.mkv"), "c.mkv");
        assert_eq!(display_name("c.mkv"), "c.mkv");
    }
}
