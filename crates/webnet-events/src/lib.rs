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

//! Session event bus shared by the orchestrator and its subscribers.
//!
//! The bus provides a typed event enum, sequential identifiers, and support for
//! replaying recent events when a subscriber attaches late (for example a status
//! panel that is rebuilt after the first session was added). Internally it uses
//! `tokio::broadcast` with a bounded buffer; when the channel overflows, the
//! oldest events are dropped.
//!
//! Layout: `payloads.rs` (event types), `routing.rs` (bus + subscriber stream).

pub mod payloads;
pub mod routing;

pub use payloads::{
    DEFAULT_REPLAY_CAPACITY, DiscoveredFile, Event, EventEnvelope, EventId, FileAction,
    IdentifierKind, SessionState,
};
pub use routing::{EventBus, EventStream};
