//! Chunked byte sources exposed by engine files.

use std::pin::Pin;

use bytes::Bytes;
use tokio_stream::Stream;

use crate::error::ChunkError;

/// Finite, ordered, non-restartable sequence of chunks for one file.
///
/// The stream ends (`None`) on the end signal; an `Err` item is the error
/// signal and nothing follows it.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChunkError>> + Send>>;

/// Box any compatible stream into a [`ChunkStream`].
pub fn chunk_stream<S>(stream: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, ChunkError>> + Send + 'static,
{
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn boxed_streams_preserve_order_and_errors() {
        let mut stream = chunk_stream(tokio_stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
            Err(ChunkError::interrupted("stop")),
        ]));

        assert_eq!(stream.next().await.and_then(Result::ok), Some(Bytes::from_static(b"a")));
        assert_eq!(stream.next().await.and_then(Result::ok), Some(Bytes::from_static(b"b")));
        assert!(matches!(stream.next().await, Some(Err(ChunkError::Interrupted { .. }))));
        assert!(stream.next().await.is_none());
    }
}
