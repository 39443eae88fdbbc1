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

//! File- and environment-backed configuration for the session orchestrator.
//!
//! Layout: `model.rs` (typed config documents), `defaults.rs` (built-in
//! values), `validate.rs` (validation and parsing helpers), `loader.rs`
//! (`ConfigLoader` layering a JSON file and environment overrides).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONFIG_PATH_ENV, ConfigLoader, LOG_FORMAT_ENV, LOG_LEVEL_ENV, SAMPLING_ENV,
    STREAM_POLICY_ENV, TRACKERS_ENV,
};
pub use model::{LoggingSettings, OrchestratorConfig, SamplingStrategy, StreamPolicy};
pub use validate::{
    parse_sampling, parse_stream_policy, parse_tracker_list, validate_config,
};
