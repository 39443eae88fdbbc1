//! Per-session file listing, media classification, and action routing.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use uuid::Uuid;
use webnet_config::StreamPolicy;
use webnet_events::{DiscoveredFile, FileAction};
use webnet_torrent_core::{FilePriority, TorrentFile};

use crate::error::{SessionError, SessionResult};

/// One catalogued file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Index within the torrent.
    pub index: u32,
    /// Relative path inside the torrent.
    pub name: String,
    /// Declared length in bytes.
    pub length: u64,
    /// Whether the extension marks the file as streamable media.
    pub media: bool,
    /// Priority hint applied to the engine.
    pub priority: FilePriority,
}

impl CatalogEntry {
    /// Actions offered for this file; `Stream` only for media.
    #[must_use]
    pub fn actions(&self) -> Vec<FileAction> {
        if self.media {
            vec![FileAction::Download, FileAction::Stream]
        } else {
            vec![FileAction::Download]
        }
    }

    /// MIME type derived from the file name.
    #[must_use]
    pub fn mime(&self) -> String {
        mime_for(&self.name)
    }
}

/// MIME type guessed from a file name, falling back to `application/octet-stream`.
#[must_use]
pub fn mime_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Snapshot of a built catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogView {
    /// Content name.
    pub name: String,
    /// Sum of file lengths.
    pub total_bytes: u64,
    /// Files in index order.
    pub files: Vec<CatalogEntry>,
}

impl CatalogView {
    /// Event payload form of the listing.
    #[must_use]
    pub fn discovered_files(&self) -> Vec<DiscoveredFile> {
        self.files
            .iter()
            .map(|entry| DiscoveredFile {
                index: entry.index,
                name: entry.name.clone(),
                size_bytes: entry.length,
                media: entry.media,
            })
            .collect()
    }
}

/// File catalog for one session.
#[derive(Debug)]
pub struct FileCatalog {
    session_id: Uuid,
    media_extensions: Vec<String>,
    name: Option<String>,
    entries: BTreeMap<u32, CatalogEntry>,
    active: Arc<Mutex<HashSet<u32>>>,
}

impl FileCatalog {
    /// Empty catalog; `media_extensions` are compared case-insensitively.
    #[must_use]
    pub fn new(session_id: Uuid, media_extensions: &[String]) -> Self {
        Self {
            session_id,
            media_extensions: media_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            name: None,
            entries: BTreeMap::new(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether metadata has been catalogued.
    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.name.is_some()
    }

    /// Whether `name` carries a recognised media extension.
    #[must_use]
    pub fn is_media(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.media_extensions.iter().any(|ext| lower.ends_with(ext))
    }

    /// Build (or rebuild) the catalog from metadata.
    ///
    /// Rebuilding clears and repopulates, so repeated metadata yields the same
    /// view. Non-media files are marked for high priority.
    pub fn on_metadata(&mut self, name: &str, files: &[TorrentFile]) -> CatalogView {
        self.entries.clear();
        for file in files {
            let media = self.is_media(&file.name);
            let priority = if media {
                FilePriority::Normal
            } else {
                FilePriority::High
            };
            self.entries.insert(
                file.index,
                CatalogEntry {
                    index: file.index,
                    name: file.name.clone(),
                    length: file.length,
                    media,
                    priority,
                },
            );
        }
        self.name = Some(name.to_string());
        self.build_view(name)
    }

    /// Current view, once built.
    #[must_use]
    pub fn view(&self) -> Option<CatalogView> {
        self.name.as_deref().map(|name| self.build_view(name))
    }

    fn build_view(&self, name: &str) -> CatalogView {
        let files: Vec<CatalogEntry> = self.entries.values().cloned().collect();
        CatalogView {
            name: name.to_string(),
            total_bytes: files.iter().map(|entry| entry.length).sum(),
            files,
        }
    }

    /// Look up one file.
    ///
    /// # Errors
    ///
    /// [`SessionError::MetadataPending`] before the catalog is built, and
    /// [`SessionError::FileNotFound`] for unknown indices.
    pub fn entry(&self, index: u32) -> SessionResult<&CatalogEntry> {
        if !self.is_built() {
            return Err(SessionError::MetadataPending {
                session_id: self.session_id,
            });
        }
        self.entries
            .get(&index)
            .ok_or(SessionError::FileNotFound {
                session_id: self.session_id,
                file_index: index,
            })
    }

    /// Record a priority the engine accepted.
    pub fn set_priority(&mut self, index: u32, priority: FilePriority) {
        if let Some(entry) = self.entries.get_mut(&index) {
            entry.priority = priority;
        }
    }

    /// Route a file action, returning a lease that holds the file until dropped.
    ///
    /// `ready` states whether the file is fully downloaded; it only matters
    /// for streams under [`StreamPolicy::RejectIncomplete`].
    ///
    /// # Errors
    ///
    /// Lookup errors from [`Self::entry`], then [`SessionError::NotStreamable`],
    /// [`SessionError::FileNotReady`], or [`SessionError::FileBusy`].
    pub fn authorize(
        &self,
        index: u32,
        action: FileAction,
        policy: StreamPolicy,
        ready: bool,
    ) -> SessionResult<FileLease> {
        let entry = self.entry(index)?;
        if action == FileAction::Stream {
            if !entry.media {
                return Err(SessionError::NotStreamable {
                    file_index: index,
                    name: entry.name.clone(),
                });
            }
            if policy == StreamPolicy::RejectIncomplete && !ready {
                return Err(SessionError::FileNotReady {
                    file_index: index,
                    name: entry.name.clone(),
                });
            }
        }

        if !lock(&self.active).insert(index) {
            return Err(SessionError::FileBusy {
                file_index: index,
                name: entry.name.clone(),
            });
        }
        Ok(FileLease {
            index,
            action,
            entry: entry.clone(),
            active: Arc::clone(&self.active),
        })
    }

    /// Number of files with an attached consumer.
    #[must_use]
    pub fn active_transfers(&self) -> usize {
        lock(&self.active).len()
    }
}

fn lock(active: &Mutex<HashSet<u32>>) -> MutexGuard<'_, HashSet<u32>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive claim on one file for one consumer.
#[derive(Debug)]
pub struct FileLease {
    index: u32,
    action: FileAction,
    entry: CatalogEntry,
    active: Arc<Mutex<HashSet<u32>>>,
}

impl FileLease {
    /// Leased file.
    #[must_use]
    pub const fn entry(&self) -> &CatalogEntry {
        &self.entry
    }

    /// Action the lease was granted for.
    #[must_use]
    pub const fn action(&self) -> FileAction {
        self.action
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extensions() -> Vec<String> {
        [".mp4", ".mkv", ".mp3", ".webm"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn files() -> Vec<TorrentFile> {
        vec![
            TorrentFile {
                index: 0,
                name: "Sintel/Sintel.MP4".into(),
                length: 1_000,
            },
            TorrentFile {
                index: 1,
                name: "Sintel/report.pdf".into(),
                length: 20,
            },
            TorrentFile {
                index: 2,
                name: "Sintel/score.mp3".into(),
                length: 300,
            },
        ]
    }

    #[test]
    fn classification_and_priorities_follow_extensions() {
        let mut catalog = FileCatalog::new(Uuid::new_v4(), &extensions());
        let view = catalog.on_metadata("Sintel", &files());
        assert_eq!(view.total_bytes, 1_320);
        assert!(view.files[0].media);
        assert!(!view.files[1].media);
        assert_eq!(view.files[1].priority, FilePriority::High);
        assert_eq!(view.files[0].priority, FilePriority::Normal);
        assert_eq!(view.files[0].mime(), "video/mp4");
        assert_eq!(view.files[2].mime(), "audio/mpeg");
    }

    #[test]
    fn non_media_files_offer_only_download() {
        let mut catalog = FileCatalog::new(Uuid::new_v4(), &extensions());
        let view = catalog.on_metadata("Sintel", &files());
        assert_eq!(view.files[1].actions(), vec![FileAction::Download]);
        assert_eq!(
            view.files[0].actions(),
            vec![FileAction::Download, FileAction::Stream]
        );

        let err = catalog
            .authorize(1, FileAction::Stream, StreamPolicy::Progressive, true)
            .expect_err("pdf is not streamable");
        assert!(matches!(err, SessionError::NotStreamable { file_index: 1, .. }));
    }

    #[test]
    fn rebuilding_is_idempotent() {
        let mut catalog = FileCatalog::new(Uuid::new_v4(), &extensions());
        let first = catalog.on_metadata("Sintel", &files());
        let second = catalog.on_metadata("Sintel", &files());
        assert_eq!(first, second);
        assert_eq!(catalog.view(), Some(second));
    }

    #[test]
    fn lookups_before_metadata_are_pending() {
        let catalog = FileCatalog::new(Uuid::new_v4(), &extensions());
        assert!(matches!(
            catalog.entry(0),
            Err(SessionError::MetadataPending { .. })
        ));
        assert!(catalog.view().is_none());
    }

    #[test]
    fn stream_policy_gates_incomplete_files() {
        let mut catalog = FileCatalog::new(Uuid::new_v4(), &extensions());
        catalog.on_metadata("Sintel", &files());
        assert!(matches!(
            catalog.authorize(0, FileAction::Stream, StreamPolicy::RejectIncomplete, false),
            Err(SessionError::FileNotReady { .. })
        ));
        assert!(
            catalog
                .authorize(0, FileAction::Stream, StreamPolicy::Progressive, false)
                .is_ok()
        );
        assert!(
            catalog
                .authorize(1, FileAction::Download, StreamPolicy::RejectIncomplete, false)
                .is_ok()
        );
        assert!(matches!(
            catalog.authorize(9, FileAction::Download, StreamPolicy::Progressive, true),
            Err(SessionError::FileNotFound { file_index: 9, .. })
        ));
    }

    #[test]
    fn leases_are_exclusive_until_dropped() {
        let mut catalog = FileCatalog::new(Uuid::new_v4(), &extensions());
        catalog.on_metadata("Sintel", &files());
        let lease = catalog
            .authorize(0, FileAction::Download, StreamPolicy::Progressive, true)
            .expect("first lease");
        assert_eq!(lease.action(), FileAction::Download);
        assert!(matches!(
            catalog.authorize(0, FileAction::Stream, StreamPolicy::Progressive, true),
            Err(SessionError::FileBusy { .. })
        ));
        assert_eq!(catalog.active_transfers(), 1);
        drop(lease);
        assert_eq!(catalog.active_transfers(), 0);
        assert!(
            catalog
                .authorize(0, FileAction::Stream, StreamPolicy::Progressive, true)
                .is_ok()
        );
    }
}
