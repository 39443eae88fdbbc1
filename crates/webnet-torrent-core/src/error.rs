//! Error types for identifier validation and byte transport.

use std::io;

use bytes::Bytes;
use thiserror::Error;

/// Reasons a user-supplied torrent reference is rejected before reaching the engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Nothing was supplied, or the supplied text was blank.
    #[error("empty torrent identifier")]
    EmptyIdentifier,
    /// Text input did not carry the magnet scheme prefix.
    #[error("malformed magnet link")]
    MalformedMagnetLink,
    /// A `.torrent` upload contained no bytes.
    #[error("empty torrent file")]
    EmptyTorrentFile,
    /// An uploaded file did not carry the `.torrent` extension.
    #[error("unsupported upload")]
    UnsupportedUpload {
        /// Name of the rejected upload.
        file_name: String,
    },
}

impl ValidationError {
    /// Status text shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyIdentifier => {
                "Please enter a magnet link or upload a .torrent file".to_string()
            }
            Self::MalformedMagnetLink => {
                "Invalid magnet link: Must start with \"magnet:\"".to_string()
            }
            Self::EmptyTorrentFile => {
                "Invalid .torrent file. Please upload a valid .torrent file.".to_string()
            }
            Self::UnsupportedUpload { file_name } => {
                format!("{file_name} is not a .torrent file. Please upload a valid .torrent file.")
            }
        }
    }
}

/// Error signal terminating a chunk stream.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// The engine aborted the read (peer loss, piece verification, session removal).
    #[error("chunk stream interrupted")]
    Interrupted {
        /// Engine-provided detail.
        message: String,
    },
    /// Reading from the engine's storage failed.
    #[error("chunk stream IO failure")]
    Io {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ChunkError {
    /// Convenience constructor for engine interruptions.
    #[must_use]
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::Interrupted {
            message: message.into(),
        }
    }

    /// Human-readable detail for status lines and logs.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Interrupted { message } => message.clone(),
            Self::Io { source } => source.to_string(),
        }
    }
}

/// Failures reported by a playback buffer.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The buffer is mid-update; the rejected chunk is handed back to the caller.
    #[error("playback buffer busy")]
    Busy {
        /// Chunk that was not appended.
        chunk: Bytes,
    },
    /// The buffer was closed or detached from its player.
    #[error("playback buffer closed")]
    Closed,
    /// The buffer refused the data (unsupported codec, quota exceeded).
    #[error("playback buffer rejected data")]
    Rejected {
        /// Player-provided reason.
        reason: String,
    },
}
