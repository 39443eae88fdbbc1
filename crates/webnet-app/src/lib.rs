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

//! WebNet application lifecycle wiring.
//!
//! Layout: `bootstrap.rs` (start-up, status reporter, teardown), `error.rs`.

/// Application start-up and teardown.
pub mod bootstrap;
/// Application-level errors.
pub mod error;

pub use bootstrap::{AppDependencies, AppHandle, load_and_start, start, start_with};
pub use error::{AppError, AppResult};
