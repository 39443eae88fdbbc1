//! # Design
//!
//! - Centralize application-level errors for start-up and teardown.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: webnet_config::ConfigError,
    },
    /// Session registry operations failed.
    #[error("session operation failed")]
    Session {
        /// Operation identifier.
        operation: &'static str,
        /// Source session error.
        source: webnet_orchestrator::SessionError,
    },
    /// A background task could not be joined.
    #[error("background task failed")]
    Task {
        /// Task name.
        task: &'static str,
        /// Join failure.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: webnet_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn session(
        operation: &'static str,
        source: webnet_orchestrator::SessionError,
    ) -> Self {
        Self::Session { operation, source }
    }
}
