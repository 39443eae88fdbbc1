#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;
use webnet_config::OrchestratorConfig;
use webnet_events::{Event, EventStream};
use webnet_orchestrator::SessionRegistry;
use webnet_test_support::fixtures::SAMPLE_MAGNET;
use webnet_test_support::{DEFAULT_WAIT, MemoryEngine, next_event_matching};
use webnet_torrent_core::{EngineEvent, EngineTelemetry};

pub fn registry(engine: &MemoryEngine) -> SessionRegistry {
    registry_with(engine, OrchestratorConfig::default())
}

pub fn registry_with(engine: &MemoryEngine, config: OrchestratorConfig) -> SessionRegistry {
    SessionRegistry::new(Arc::new(engine.clone()), config)
}

pub fn telemetry(downloaded_bytes: u64, total_bytes: u64, bytes_per_second: u64) -> EngineEvent {
    EngineEvent::Download(EngineTelemetry {
        downloaded_bytes,
        total_bytes,
        bytes_per_second,
    })
}

/// Admit the sample magnet and deliver metadata for the engine's scripted files.
pub async fn admit_with_metadata(
    registry: &SessionRegistry,
    engine: &MemoryEngine,
    events: &mut EventStream,
) -> Result<Uuid> {
    let session = registry.submit(Some(SAMPLE_MAGNET.into())).await?;
    let id = session.id();
    engine.emit(id, engine.metadata_event("Sintel")).await?;
    next_event_matching(events, DEFAULT_WAIT, |event| {
        matches!(event, Event::MetadataReceived { session_id, .. } if *session_id == id)
    })
    .await?;
    Ok(id)
}

/// Collect events until `stop` matches, inclusive.
pub async fn collect_until<F>(events: &mut EventStream, mut stop: F) -> Result<Vec<Event>>
where
    F: FnMut(&Event) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let envelope = next_event_matching(events, DEFAULT_WAIT, |_| true).await?;
        let done = stop(&envelope.event);
        seen.push(envelope.event);
        if done {
            return Ok(seen);
        }
    }
}
