//! Validation helpers and parsing utilities for configuration values.

use crate::defaults::{DEFAULT_SAMPLING_PERIOD_MS, TRACKER_SCHEMES};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{OrchestratorConfig, SamplingStrategy, StreamPolicy};

/// Validate a fully merged configuration.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] naming the first offending field.
pub fn validate_config(config: &OrchestratorConfig) -> ConfigResult<()> {
    for (index, tracker) in config.trackers.iter().enumerate() {
        validate_tracker(index, tracker)?;
    }

    if let SamplingStrategy::Interval { period_ms } = config.sampling
        && period_ms == 0
    {
        return Err(ConfigError::invalid(
            "sampling",
            "period_ms",
            Some("0"),
            "must be greater than zero",
        ));
    }

    for (index, extension) in config.media_extensions.iter().enumerate() {
        if extension.len() < 2 || !extension.starts_with('.') {
            return Err(ConfigError::invalid(
                "media_extensions",
                &index.to_string(),
                Some(extension),
                "must start with '.' followed by a suffix",
            ));
        }
    }

    if config.event_capacity == 0 {
        return Err(ConfigError::invalid(
            "event_capacity",
            "event_capacity",
            Some("0"),
            "must be greater than zero",
        ));
    }

    if config.logging.level.trim().is_empty() {
        return Err(ConfigError::invalid(
            "logging",
            "level",
            None,
            "must not be empty",
        ));
    }
    if let Some(format) = config.logging.format.as_deref()
        && !matches!(format, "json" | "pretty")
    {
        return Err(ConfigError::invalid(
            "logging",
            "format",
            Some(format),
            "must be 'json' or 'pretty'",
        ));
    }

    Ok(())
}

fn validate_tracker(index: usize, tracker: &str) -> ConfigResult<()> {
    let field = index.to_string();
    if tracker.trim().is_empty() {
        return Err(ConfigError::invalid(
            "trackers",
            &field,
            None,
            "must not be empty",
        ));
    }
    if !TRACKER_SCHEMES
        .iter()
        .any(|scheme| tracker.starts_with(scheme))
    {
        return Err(ConfigError::invalid(
            "trackers",
            &field,
            Some(tracker),
            "must use a wss, ws, udp, http or https URL",
        ));
    }
    Ok(())
}

/// Split a comma-separated tracker list, trimming entries and dropping blanks.
#[must_use]
pub fn parse_tracker_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a sampling override: `event` or `interval:<ms>` (bare `interval` uses the default period).
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for any other shape.
pub fn parse_sampling(raw: &str) -> ConfigResult<SamplingStrategy> {
    let value = raw.trim();
    match value {
        "event" | "event_driven" => Ok(SamplingStrategy::EventDriven),
        "interval" => Ok(SamplingStrategy::Interval {
            period_ms: DEFAULT_SAMPLING_PERIOD_MS,
        }),
        other => {
            let period = other.strip_prefix("interval:").ok_or_else(|| {
                ConfigError::invalid(
                    "sampling",
                    "mode",
                    Some(other),
                    "must be 'event' or 'interval:<ms>'",
                )
            })?;
            let period_ms = period.trim().parse::<u64>().map_err(|_| {
                ConfigError::invalid(
                    "sampling",
                    "period_ms",
                    Some(period),
                    "must be an unsigned integer",
                )
            })?;
            Ok(SamplingStrategy::Interval { period_ms })
        }
    }
}

/// Parse a stream policy override: `progressive` or `reject`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for unknown values.
pub fn parse_stream_policy(raw: &str) -> ConfigResult<StreamPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "progressive" => Ok(StreamPolicy::Progressive),
        "reject" | "reject_incomplete" => Ok(StreamPolicy::RejectIncomplete),
        _ => Err(ConfigError::invalid(
            "stream_policy",
            "stream_policy",
            Some(raw),
            "must be 'progressive' or 'reject'",
        )),
    }
}
