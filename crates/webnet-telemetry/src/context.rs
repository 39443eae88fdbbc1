//! Spans carrying session and transfer identifiers.

use tracing::Span;
use uuid::Uuid;

/// Span wrapping every log line emitted on behalf of one session.
#[must_use]
pub fn session_span(session_id: Uuid, key: &str) -> Span {
    tracing::info_span!("session", session_id = %session_id, key = %key)
}

/// Span wrapping one download or stream of a single file.
#[must_use]
pub fn transfer_span(session_id: Uuid, file_index: u32, action: &str) -> Span {
    tracing::info_span!(
        "transfer",
        session_id = %session_id,
        file_index,
        action = %action
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Instrument;

    #[tokio::test]
    async fn spans_wrap_futures() {
        let id = Uuid::new_v4();
        let output = async { 7 }
            .instrument(session_span(id, "magnet:?xt=urn:btih:abc"))
            .await;
        assert_eq!(output, 7);

        let span = transfer_span(id, 2, "stream");
        let _entered = span.enter();
    }
}
