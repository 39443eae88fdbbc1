//! Torrent creator double.

use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use webnet_torrent_core::{CreateOptions, SourceFile, TorrentCreator};

/// Creator returning a deterministic descriptor and recording its inputs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCreator {
    requests: Arc<Mutex<Vec<(Vec<String>, CreateOptions)>>>,
    failure: Option<String>,
}

impl MemoryCreator {
    /// Creator that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creator that always fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// File names and options of every request, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(Vec<String>, CreateOptions)> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TorrentCreator for MemoryCreator {
    async fn create(&self, files: &[SourceFile], options: &CreateOptions) -> Result<Vec<u8>> {
        let names: Vec<String> = files.iter().map(|file| file.name.clone()).collect();
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((names.clone(), options.clone()));
        if let Some(message) = &self.failure {
            bail!("{message}");
        }
        Ok(format!(
            "d10:created by{}:{}4:name{}:{}5:files{}e",
            options.created_by.len(),
            options.created_by,
            options.name.len(),
            options.name,
            names.join(",")
        )
        .into_bytes())
    }
}
