//! Layered configuration loading: defaults, then an optional JSON file, then
//! environment overrides.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::OrchestratorConfig;
use crate::validate::{parse_sampling, parse_stream_policy, parse_tracker_list, validate_config};

/// Path of the JSON configuration document.
pub const CONFIG_PATH_ENV: &str = "WEBNET_CONFIG";
/// Comma-separated tracker override.
pub const TRACKERS_ENV: &str = "WEBNET_TRACKERS";
/// Sampling override (`event` or `interval:<ms>`).
pub const SAMPLING_ENV: &str = "WEBNET_SAMPLING";
/// Stream policy override (`progressive` or `reject`).
pub const STREAM_POLICY_ENV: &str = "WEBNET_STREAM_POLICY";
/// Log level override.
pub const LOG_LEVEL_ENV: &str = "WEBNET_LOG_LEVEL";
/// Log format override (`json` or `pretty`).
pub const LOG_FORMAT_ENV: &str = "WEBNET_LOG_FORMAT";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builds an [`OrchestratorConfig`] from a file and the environment.
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: EnvLookup,
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader reading the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: None,
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Use an explicit document path instead of `WEBNET_CONFIG`.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Replace the environment lookup.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Load, merge, and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`] when the document
    /// cannot be used, and [`ConfigError::InvalidField`] when an override or the
    /// merged result is invalid.
    pub fn load(&self) -> ConfigResult<OrchestratorConfig> {
        let path = self
            .path
            .clone()
            .or_else(|| self.var(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => read_document(&path)?,
            None => OrchestratorConfig::default(),
        };
        self.apply_overrides(&mut config)?;
        validate_config(&config)?;
        Ok(config)
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.env)(key).filter(|value| !value.trim().is_empty())
    }

    fn apply_overrides(&self, config: &mut OrchestratorConfig) -> ConfigResult<()> {
        if let Some(raw) = self.var(TRACKERS_ENV) {
            config.trackers = parse_tracker_list(&raw);
            debug!(count = config.trackers.len(), "tracker list overridden from environment");
        }
        if let Some(raw) = self.var(SAMPLING_ENV) {
            config.sampling = parse_sampling(&raw)?;
        }
        if let Some(raw) = self.var(STREAM_POLICY_ENV) {
            config.stream_policy = parse_stream_policy(&raw)?;
        }
        if let Some(level) = self.var(LOG_LEVEL_ENV) {
            config.logging.level = level.trim().to_string();
        }
        if let Some(format) = self.var(LOG_FORMAT_ENV) {
            config.logging.format = Some(format.trim().to_ascii_lowercase());
        }
        Ok(())
    }
}

fn read_document(path: &Path) -> ConfigResult<OrchestratorConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "configuration document loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SamplingStrategy, StreamPolicy};
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn no_sources_yield_defaults() {
        let config = ConfigLoader::new()
            .with_env(env(&[]))
            .load()
            .expect("defaults");
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn environment_overrides_apply() {
        let config = ConfigLoader::new()
            .with_env(env(&[
                (TRACKERS_ENV, "wss://one.example, udp://two.example:6969"),
                (SAMPLING_ENV, "interval:500"),
                (STREAM_POLICY_ENV, "reject"),
                (LOG_LEVEL_ENV, "debug"),
                (LOG_FORMAT_ENV, "JSON"),
            ]))
            .load()
            .expect("overrides");
        assert_eq!(config.trackers, vec!["wss://one.example", "udp://two.example:6969"]);
        assert_eq!(config.sampling, SamplingStrategy::Interval { period_ms: 500 });
        assert_eq!(config.stream_policy, StreamPolicy::RejectIncomplete);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format.as_deref(), Some("json"));
    }

    #[test]
    fn invalid_override_is_reported() {
        let err = ConfigLoader::new()
            .with_env(env(&[(SAMPLING_ENV, "interval:0")]))
            .load()
            .expect_err("zero period");
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }

    #[test]
    fn missing_document_is_an_io_error() {
        let err = ConfigLoader::new()
            .with_env(env(&[(CONFIG_PATH_ENV, "/nonexistent/webnet.json")]))
            .load()
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { operation: "config.read", .. }));
    }
}
