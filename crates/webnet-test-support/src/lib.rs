#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared test helpers used across unit and integration suites.
//! Layout: fixtures.rs (sample identifiers and chunk data), engine.rs (in-memory
//! torrent engine), playback.rs (recording playback buffer), creator.rs (fake
//! torrent creator), wait.rs (bounded event waits).

pub mod creator;
pub mod engine;
pub mod fixtures;
pub mod playback;
pub mod wait;

pub use creator::MemoryCreator;
pub use engine::{EngineCall, MemoryEngine, ScriptedFile};
pub use playback::{BufferProbe, RecordingBuffer};
pub use wait::{DEFAULT_WAIT, next_event_matching};
