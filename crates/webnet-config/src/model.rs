//! Typed configuration documents.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_LOG_LEVEL, DEFAULT_MEDIA_EXTENSIONS, DEFAULT_TRACKERS,
};

/// Complete orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Announce URLs passed to the engine when a session is added.
    pub trackers: Vec<String>,
    /// How progress samples are produced.
    pub sampling: SamplingStrategy,
    /// Whether media files may be streamed before they finish downloading.
    pub stream_policy: StreamPolicy,
    /// Lowercase file extensions (with leading dot) treated as media.
    pub media_extensions: Vec<String>,
    /// Replay capacity of the session event bus.
    pub event_capacity: usize,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            trackers: DEFAULT_TRACKERS.iter().map(ToString::to_string).collect(),
            sampling: SamplingStrategy::default(),
            stream_policy: StreamPolicy::default(),
            media_extensions: DEFAULT_MEDIA_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            logging: LoggingSettings::default(),
        }
    }
}

/// Progress sampling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// One sample per engine progress event.
    #[default]
    EventDriven,
    /// Poll the latest telemetry at a fixed period.
    Interval {
        /// Polling period in milliseconds.
        period_ms: u64,
    },
}

impl SamplingStrategy {
    /// Polling period for interval sampling.
    #[must_use]
    pub const fn period(self) -> Option<Duration> {
        match self {
            Self::EventDriven => None,
            Self::Interval { period_ms } => Some(Duration::from_millis(period_ms)),
        }
    }
}

/// Policy for streaming media files that are not fully downloaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPolicy {
    /// Refuse with a not-ready error until the file is complete.
    RejectIncomplete,
    /// Serve partial data as it arrives.
    #[default]
    Progressive,
}

/// Logging settings consumed by the telemetry crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive.
    pub level: String,
    /// Output format (`json` or `pretty`); inferred from the build when absent.
    pub format: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
