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

//! Session orchestration on top of an injected torrent engine.
//!
//! The [`SessionRegistry`] admits and removes sessions, spawning one worker
//! per session that turns engine events into progress samples, a file catalog,
//! and bus events. File actions route through the catalog to either the byte
//! assembler (save-as downloads) or the stream feeder (progressive playback).
//!
//! Layout: `registry.rs` (admission, removal, file actions), `worker.rs`
//! (per-session event loop), `session.rs` (handles and snapshots),
//! `progress.rs`, `catalog.rs`, `assembler.rs`, `feeder.rs`, `status.rs`
//! (status lines), `creation.rs` (descriptor creation), `error.rs`.

pub mod assembler;
pub mod catalog;
pub mod creation;
pub mod error;
pub mod feeder;
pub mod progress;
pub mod registry;
pub mod session;
pub mod status;
mod worker;

pub use assembler::{Artifact, assemble, display_name};
pub use catalog::{CatalogEntry, CatalogView, FileCatalog, FileLease, mime_for};
pub use creation::{CreateRequest, create_descriptor};
pub use error::{
    AssemblyError, CreationError, EngineFailure, SessionError, SessionResult, StreamError,
};
pub use feeder::{FeedSummary, FeederState, StreamFeeder};
pub use progress::{ProgressSample, ProgressTracker};
pub use registry::SessionRegistry;
pub use session::{Session, SessionSnapshot};
pub use status::{StatusBoard, StatusSnapshot};
