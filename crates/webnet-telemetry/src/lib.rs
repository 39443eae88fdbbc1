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

//! Logging primitives shared across the WebNet workspace.
//!
//! Layout: `init.rs` (subscriber installation and log format selection),
//! `context.rs` (session-scoped spans).

pub mod context;
pub mod init;

pub use context::{session_span, transfer_span};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, log_format_from_str,
};
