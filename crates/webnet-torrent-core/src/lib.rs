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

//! Engine-agnostic torrent interfaces and DTOs.
//!
//! Layout: `model/` (identifiers, files, engine events), `validate.rs`
//! (identifier validation), `service/` (engine, creator, and playback traits),
//! `stream.rs` (chunk streams), `error.rs` (error types).

pub mod error;
pub mod model;
pub mod service;
pub mod stream;
pub mod validate;

pub use error::{ChunkError, PlaybackError, ValidationError};
pub use model::{
    AddSession, AddSessionOptions, CreateOptions, EngineEvent, EngineTelemetry, FilePriority,
    PeerSource, SessionKey, SourceFile, TorrentFile, TorrentIdentifier,
};
pub use service::{EngineSession, PlaybackBuffer, TorrentCreator, TorrentEngine};
pub use stream::{ChunkStream, chunk_stream};
pub use validate::{IdentifierInput, MAGNET_PREFIX, validate, validate_upload};
