//! Builds `.torrent` descriptors from local files.

use bytes::Bytes;
use tracing::info;
use webnet_config::parse_tracker_list;
use webnet_torrent_core::{CreateOptions, SourceFile, TorrentCreator};

use crate::assembler::Artifact;
use crate::error::CreationError;

/// Name used when the request leaves it blank.
pub const DEFAULT_TORRENT_NAME: &str = "MyTorrent";
/// Announce URL used when the request lists no trackers.
pub const DEFAULT_CREATION_TRACKER: &str = "wss://tracker.openwebtorrent.com";
/// Value recorded in the descriptor's `created by` field.
pub const CREATED_BY: &str = "WebNetTorrent";
/// Content type of descriptor artifacts.
pub const TORRENT_CONTENT_TYPE: &str = "application/x-bittorrent";

/// User input for the creation form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRequest {
    /// Torrent name; blank falls back to [`DEFAULT_TORRENT_NAME`].
    pub name: Option<String>,
    /// Comma-separated announce URLs; blank falls back to [`DEFAULT_CREATION_TRACKER`].
    pub trackers: Option<String>,
}

impl CreateRequest {
    /// Options handed to the creator.
    #[must_use]
    pub fn options(&self) -> CreateOptions {
        let name = self
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_TORRENT_NAME)
            .to_string();
        let mut announce = self
            .trackers
            .as_deref()
            .map(parse_tracker_list)
            .unwrap_or_default();
        if announce.is_empty() {
            announce.push(DEFAULT_CREATION_TRACKER.to_string());
        }
        CreateOptions {
            name,
            announce,
            created_by: CREATED_BY.to_string(),
        }
    }
}

/// Create a descriptor for `files` and package it as `<name>.torrent`.
///
/// # Errors
///
/// [`CreationError::NoFiles`] when `files` is empty and
/// [`CreationError::Creator`] when the creator fails.
pub async fn create_descriptor(
    creator: &dyn TorrentCreator,
    files: &[SourceFile],
    request: &CreateRequest,
) -> Result<Artifact, CreationError> {
    if files.is_empty() {
        return Err(CreationError::NoFiles);
    }
    let options = request.options();
    let descriptor = creator
        .create(files, &options)
        .await
        .map_err(|err| CreationError::Creator { source: err.into() })?;
    info!(name = %options.name, files = files.len(), "torrent descriptor created");
    Ok(Artifact {
        name: format!("{}.torrent", options.name),
        content_type: TORRENT_CONTENT_TYPE.to_string(),
        bytes: Bytes::from(descriptor),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use webnet_test_support::MemoryCreator;

    fn source(name: &str) -> SourceFile {
        SourceFile {
            name: name.to_string(),
            bytes: Bytes::from_static(b"payload"),
        }
    }

    #[test]
    fn blank_inputs_use_defaults() {
        let options = CreateRequest {
            name: Some("  ".into()),
            trackers: Some(" , ".into()),
        }
        .options();
        assert_eq!(options.name, DEFAULT_TORRENT_NAME);
        assert_eq!(options.announce, vec![DEFAULT_CREATION_TRACKER]);
        assert_eq!(options.created_by, CREATED_BY);
    }

    #[test]
    fn trackers_are_split_and_trimmed() {
        let options = CreateRequest {
            name: Some("Holiday".into()),
            trackers: Some("wss://a.example , udp://b.example:6969".into()),
        }
        .options();
        assert_eq!(options.name, "Holiday");
        assert_eq!(options.announce, vec!["wss://a.example", "udp://b.example:6969"]);
    }

    #[tokio::test]
    async fn descriptor_artifact_is_named_after_the_torrent() {
        let creator = MemoryCreator::new();
        let artifact = create_descriptor(
            &creator,
            &[source("a.mp4"), source("b.txt")],
            &CreateRequest::default(),
        )
        .await
        .expect("artifact");
        assert_eq!(artifact.name, "MyTorrent.torrent");
        assert_eq!(artifact.content_type, TORRENT_CONTENT_TYPE);
        assert!(!artifact.is_empty());

        let requests = creator.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, vec!["a.mp4", "b.txt"]);
    }

    #[tokio::test]
    async fn empty_selection_and_creator_failures_are_reported() {
        let creator = MemoryCreator::new();
        let err = create_descriptor(&creator, &[], &CreateRequest::default())
            .await
            .expect_err("no files");
        assert!(matches!(err, CreationError::NoFiles));
        assert!(creator.requests().is_empty());

        let failing = MemoryCreator::failing("hashing failed");
        let err = create_descriptor(&failing, &[source("a.mp4")], &CreateRequest::default())
            .await
            .expect_err("creator failure");
        assert_eq!(err.user_message(), "Error creating torrent: hashing failed");
    }
}
