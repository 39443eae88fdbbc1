//! Bounded waits over event streams.

use std::time::Duration;

use anyhow::{Result, anyhow};
use webnet_events::{Event, EventEnvelope, EventStream};

/// Upper bound used by tests waiting for asynchronous events.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Wait for the next envelope whose event satisfies `predicate`.
///
/// # Errors
///
/// Returns an error when the stream closes or `timeout` elapses first.
pub async fn next_event_matching<F>(
    stream: &mut EventStream,
    timeout: Duration,
    mut predicate: F,
) -> Result<EventEnvelope>
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        while let Some(envelope) = stream.next().await {
            if predicate(&envelope.event) {
                return Ok(envelope);
            }
        }
        Err(anyhow!("event stream closed"))
    })
    .await
    .map_err(|_| anyhow!("timed out waiting for event"))?
}
