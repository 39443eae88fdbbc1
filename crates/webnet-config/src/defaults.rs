//! Built-in configuration values.

/// Announce URLs used when no trackers are configured.
pub const DEFAULT_TRACKERS: &[&str] = &[
    "wss://tracker.btorrent.xyz",
    "wss://tracker.openwebtorrent.com",
    "wss://tracker.webtorrent.io",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://open.demonii.com:1337/announce",
    "udp://tracker.coppersurfer.tk:6969/announce",
    "udp://tracker.leechers-paradise.org:6969/announce",
];

/// File extensions the catalog treats as streamable media.
pub const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".mp3", ".webm"];

/// Replay capacity of the session event bus.
pub const DEFAULT_EVENT_CAPACITY: usize = 1_024;

/// Polling period used by interval sampling when none is supplied.
pub const DEFAULT_SAMPLING_PERIOD_MS: u64 = 1_000;

/// Log level applied when neither configuration nor `RUST_LOG` provides one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Tracker URL schemes accepted in announce lists.
pub(crate) const TRACKER_SCHEMES: &[&str] = &["wss://", "ws://", "udp://", "http://", "https://"];
