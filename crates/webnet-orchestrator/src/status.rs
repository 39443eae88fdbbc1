//! Turns session events into the status lines shown to the user.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;
use webnet_events::{Event, FileAction, IdentifierKind};

const BYTES_PER_KIB: f64 = 1_024.0;
const BYTES_PER_MIB: f64 = 1_024.0 * 1_024.0;

/// Bytes as megabytes with two decimals, e.g. `2.50 MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MIB)
}

/// Throughput as kilobytes per second with two decimals, e.g. `512.00 KB/s`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_rate(bytes_per_second: u64) -> String {
    format!("{:.2} KB/s", bytes_per_second as f64 / BYTES_PER_KIB)
}

/// Remaining time in seconds with two decimals, or `N/A` while unknown.
#[must_use]
pub fn format_eta(eta_seconds: Option<f64>) -> String {
    eta_seconds.map_or_else(|| "N/A".to_string(), |eta| format!("{eta:.2} seconds remaining"))
}

/// Rendered status panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Main status line.
    pub status: String,
    /// Rounded completion percentage, e.g. `25%`.
    pub percent: Option<String>,
    /// Current throughput.
    pub speed: Option<String>,
    /// Transfer detail, e.g. `2.50 MB of 10.00 MB, 7.50 seconds remaining`.
    pub detail: Option<String>,
}

/// Folds events into a [`StatusSnapshot`].
#[derive(Debug, Default)]
pub struct StatusBoard {
    names: HashMap<Uuid, String>,
    snapshot: StatusSnapshot,
}

impl StatusBoard {
    /// Empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current panel contents.
    #[must_use]
    pub const fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    fn name_of(&self, session_id: Uuid) -> String {
        self.names
            .get(&session_id)
            .cloned()
            .unwrap_or_else(|| "torrent".to_string())
    }

    /// Apply one event; returns whether the panel changed.
    pub fn apply(&mut self, event: &Event) -> bool {
        let before = self.snapshot.clone();
        match event {
            Event::SessionAdded {
                session_id,
                kind,
                name,
                ..
            } => {
                if let Some(name) = name {
                    self.names.insert(*session_id, name.clone());
                }
                self.snapshot = StatusSnapshot {
                    status: match kind {
                        IdentifierKind::Magnet => "Processing magnet link...".to_string(),
                        IdentifierKind::Metainfo => "Processing .torrent file...".to_string(),
                    },
                    ..StatusSnapshot::default()
                };
            }
            Event::MetadataReceived {
                session_id,
                name,
                total_bytes,
                ..
            } => {
                self.names.insert(*session_id, name.clone());
                self.snapshot.status = format!("Metadata received for: {name}");
                self.snapshot.detail = Some(format!("Size: {}", format_megabytes(*total_bytes)));
            }
            Event::Progress {
                session_id,
                percent,
                bytes_downloaded,
                bytes_total,
                bytes_per_second,
                eta_seconds,
            } => {
                self.snapshot.status = format!("Downloading: {}", self.name_of(*session_id));
                self.snapshot.percent = Some(format!("{percent:.0}%"));
                self.snapshot.speed = Some(format_rate(*bytes_per_second));
                self.snapshot.detail = Some(format!(
                    "{} of {}, {}",
                    format_megabytes(*bytes_downloaded),
                    format_megabytes(*bytes_total),
                    format_eta(*eta_seconds)
                ));
            }
            Event::Completed { session_id } => {
                self.snapshot.status =
                    format!("Finished downloading: {}", self.name_of(*session_id));
                self.snapshot.percent = Some("100%".to_string());
            }
            Event::NoPeers { source, .. } => {
                self.snapshot.status = format!("No peers found via {source}. Still waiting...");
            }
            Event::SessionFailed { message, .. } => {
                self.snapshot.status = format!("Torrent error: {message}");
            }
            Event::SessionRemoved { session_id } => {
                self.names.remove(session_id);
            }
            Event::TransferCompleted {
                action: FileAction::Download,
                ..
            } => {
                self.snapshot.status = "Download ready".to_string();
            }
            Event::TransferFailed { message, .. } => {
                self.snapshot.status.clone_from(message);
            }
            Event::TransferStarted {
                session_id,
                action: FileAction::Stream,
                ..
            } => {
                self.snapshot.status = format!("Streaming: {}", self.name_of(*session_id));
            }
            Event::StateChanged { .. }
            | Event::TransferStarted { .. }
            | Event::TransferCompleted { .. } => {}
        }
        self.snapshot != before
    }
}
