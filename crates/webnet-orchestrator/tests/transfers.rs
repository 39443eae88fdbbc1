mod common;

use anyhow::{Result, anyhow};
use common::{admit_with_metadata, registry, registry_with};
use webnet_config::{OrchestratorConfig, StreamPolicy};
use webnet_events::{Event, FileAction};
use webnet_orchestrator::{AssemblyError, SessionError, StreamError};
use webnet_test_support::fixtures::{SAMPLE_MAGNET, chunks, concat, patterned_chunks};
use webnet_test_support::{
    DEFAULT_WAIT, MemoryEngine, RecordingBuffer, ScriptedFile, next_event_matching,
};
use webnet_torrent_core::EngineEvent;

fn reject_incomplete() -> OrchestratorConfig {
    OrchestratorConfig {
        stream_policy: StreamPolicy::RejectIncomplete,
        ..OrchestratorConfig::default()
    }
}

#[tokio::test]
async fn downloads_assemble_chunks_in_order() -> Result<()> {
    let parts = chunks(&[b"c1", b"c2", b"c3"]);
    let engine = MemoryEngine::new().with_file(ScriptedFile::new("Sintel/notes.txt", parts.clone()));
    let registry = registry(&engine);
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    let artifact = registry.download_file(id, 0).await?;
    assert_eq!(artifact.bytes.as_ref(), concat(&parts).as_slice());
    assert_eq!(artifact.name, "notes.txt");
    assert_eq!(artifact.content_type, "text/plain");

    next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::TransferStarted { action: FileAction::Download, .. })
    })
    .await?;
    let completed = next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::TransferCompleted { .. })
    })
    .await?;
    assert_eq!(
        completed.event,
        Event::TransferCompleted {
            session_id: id,
            file_index: 0,
            action: FileAction::Download,
            bytes: 6,
        }
    );
    Ok(())
}

#[tokio::test]
async fn non_media_files_only_download() -> Result<()> {
    let engine = MemoryEngine::new().with_file(ScriptedFile::new("report.pdf", chunks(&[b"%PDF"])));
    let registry = registry(&engine);
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    let catalog = registry
        .session(id)
        .await?
        .snapshot()
        .await
        .catalog
        .ok_or_else(|| anyhow!("catalog missing"))?;
    assert_eq!(catalog.files[0].actions(), vec![FileAction::Download]);

    let mut buffer = RecordingBuffer::new();
    let err = registry
        .stream_file(id, 0, &mut buffer)
        .await
        .expect_err("pdf cannot stream");
    assert!(matches!(err, SessionError::NotStreamable { file_index: 0, .. }));
    assert!(buffer.probe().mime().is_none());

    let artifact = registry.download_file(id, 0).await?;
    assert_eq!(artifact.content_type, "application/pdf");
    Ok(())
}

#[tokio::test]
async fn stream_errors_discard_partial_downloads() -> Result<()> {
    let engine = MemoryEngine::new()
        .with_file(ScriptedFile::new("movie.mkv", patterned_chunks(5, 32)).failing_after(2));
    let registry = registry(&engine);
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    for _ in 0..2 {
        let err = registry
            .download_file(id, 0)
            .await
            .expect_err("stream fails mid-way");
        assert!(matches!(
            err,
            SessionError::Assembly {
                source: AssemblyError::Stream {
                    received_chunks: 2,
                    ..
                }
            }
        ));
        assert_eq!(err.user_message(), "Error downloading file: peer connection lost");
    }

    let failed = next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::TransferFailed { .. })
    })
    .await?;
    assert!(matches!(
        failed.event,
        Event::TransferFailed { ref message, .. } if message == "Error downloading file: peer connection lost"
    ));
    Ok(())
}

#[tokio::test]
async fn media_streams_feed_the_playback_buffer() -> Result<()> {
    let parts = patterned_chunks(6, 128);
    let engine = MemoryEngine::new().with_file(ScriptedFile::new("Sintel/Sintel.mp4", parts.clone()));
    let registry = registry(&engine);
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    let mut buffer = RecordingBuffer::new().with_spurious_busy(2);
    let probe = buffer.probe();
    let summary = registry.stream_file(id, 0, &mut buffer).await?;

    assert_eq!(summary.chunks, 6);
    assert_eq!(summary.bytes, 768);
    assert_eq!(probe.bytes(), concat(&parts));
    assert_eq!(probe.mime().as_deref(), Some("video/mp4"));
    assert!(probe.ended());
    Ok(())
}

#[tokio::test]
async fn playback_failures_surface_as_stream_errors() -> Result<()> {
    let engine = MemoryEngine::new().with_file(ScriptedFile::new("clip.webm", patterned_chunks(4, 16)));
    let registry = registry(&engine);
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    let mut closing = RecordingBuffer::new().closing_after(1);
    let probe = closing.probe();
    let err = registry
        .stream_file(id, 0, &mut closing)
        .await
        .expect_err("buffer closes");
    assert!(matches!(
        err,
        SessionError::Stream {
            source: StreamError::Playback { .. }
        }
    ));
    assert_eq!(probe.appended().len(), 1);
    assert!(!probe.ended());
    Ok(())
}

#[tokio::test]
async fn incomplete_media_is_rejected_when_configured() -> Result<()> {
    let engine = MemoryEngine::new()
        .with_file(ScriptedFile::new("episode.mp4", patterned_chunks(2, 50)).partially_downloaded(10));
    let registry = registry_with(&engine, reject_incomplete());
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    let mut buffer = RecordingBuffer::new();
    let err = registry
        .stream_file(id, 0, &mut buffer)
        .await
        .expect_err("file incomplete");
    assert!(matches!(err, SessionError::FileNotReady { file_index: 0, .. }));

    registry.download_file(id, 0).await?;

    engine.emit(id, EngineEvent::Done).await?;
    next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::Completed { .. })
    })
    .await?;
    registry.stream_file(id, 0, &mut buffer).await?;
    Ok(())
}

#[tokio::test]
async fn missing_file_progress_counts_as_not_ready() -> Result<()> {
    let engine = MemoryEngine::new()
        .with_file(ScriptedFile::new("song.mp3", patterned_chunks(1, 8)))
        .without_file_progress();
    let registry = registry_with(&engine, reject_incomplete());
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    let mut buffer = RecordingBuffer::new();
    assert!(matches!(
        registry.stream_file(id, 0, &mut buffer).await,
        Err(SessionError::FileNotReady { .. })
    ));

    let ready = MemoryEngine::new().with_file(ScriptedFile::new("song.mp3", patterned_chunks(1, 8)));
    let registry = registry_with(&ready, reject_incomplete());
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &ready, &mut events).await?;
    registry.stream_file(id, 0, &mut buffer).await?;
    Ok(())
}

#[tokio::test]
async fn file_actions_need_metadata_and_known_files() -> Result<()> {
    let engine = MemoryEngine::new().with_file(ScriptedFile::new("a.mp4", patterned_chunks(1, 4)));
    let registry = registry(&engine);
    let session = registry.submit(Some(SAMPLE_MAGNET.into())).await?;

    assert!(matches!(
        registry.download_file(session.id(), 0).await,
        Err(SessionError::MetadataPending { .. })
    ));
    assert!(matches!(
        registry.download_file(uuid::Uuid::new_v4(), 0).await,
        Err(SessionError::SessionNotFound { .. })
    ));

    let mut events = registry.subscribe(None);
    engine.emit(session.id(), engine.metadata_event("a")).await?;
    next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::MetadataReceived { .. })
    })
    .await?;
    assert!(matches!(
        registry.download_file(session.id(), 7).await,
        Err(SessionError::FileNotFound { file_index: 7, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn removal_cancels_active_transfers() -> Result<()> {
    let engine = MemoryEngine::new()
        .with_file(ScriptedFile::new("live.mp4", patterned_chunks(2, 16)).stalled());
    let registry = registry(&engine);
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    let downloader = registry.clone();
    let download = tokio::spawn(async move { downloader.download_file(id, 0).await });
    next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::TransferStarted { .. })
    })
    .await?;

    let mut buffer = RecordingBuffer::new();
    let busy = registry
        .stream_file(id, 0, &mut buffer)
        .await
        .expect_err("file already attached");
    assert!(matches!(busy, SessionError::FileBusy { file_index: 0, .. }));

    registry.remove(id).await?;
    let outcome = tokio::time::timeout(DEFAULT_WAIT, download).await??;
    assert!(matches!(
        outcome,
        Err(SessionError::Assembly {
            source: AssemblyError::Cancelled
        })
    ));

    let failed = next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::TransferFailed { .. })
    })
    .await?;
    assert!(matches!(
        failed.event,
        Event::TransferFailed { ref message, .. } if message == "Download cancelled."
    ));
    Ok(())
}

#[tokio::test]
async fn removal_cancels_active_streams() -> Result<()> {
    let parts = patterned_chunks(2, 16);
    let engine = MemoryEngine::new()
        .with_file(ScriptedFile::new("live.webm", parts.clone()).stalled());
    let registry = registry(&engine);
    let mut events = registry.subscribe(None);
    let id = admit_with_metadata(&registry, &engine, &mut events).await?;

    let mut buffer = RecordingBuffer::new();
    let probe = buffer.probe();
    let streamer = registry.clone();
    let stream = tokio::spawn(async move { streamer.stream_file(id, 0, &mut buffer).await });
    next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::TransferStarted { action: FileAction::Stream, .. })
    })
    .await?;

    registry.remove(id).await?;
    let outcome = tokio::time::timeout(DEFAULT_WAIT, stream).await??;
    assert!(matches!(
        outcome,
        Err(SessionError::Stream {
            source: StreamError::Cancelled
        })
    ));
    assert!(!probe.ended());
    assert!(concat(&parts).starts_with(&probe.bytes()));

    let failed = next_event_matching(&mut events, DEFAULT_WAIT, |event| {
        matches!(event, Event::TransferFailed { .. })
    })
    .await?;
    assert!(matches!(
        failed.event,
        Event::TransferFailed { action: FileAction::Stream, .. }
    ));
    Ok(())
}
