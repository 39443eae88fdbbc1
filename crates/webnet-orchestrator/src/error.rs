//! # Design
//!
//! - Constant display messages with context carried in fields.
//! - Engine failures are kept as boxed sources so nothing is re-logged at call sites.
//! - Every error renders a user-facing status line through `user_message`.

use thiserror::Error;
use uuid::Uuid;
use webnet_torrent_core::{ChunkError, PlaybackError, ValidationError};

/// Boxed failure reported across the engine, creator, or playback seams.
pub type EngineFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for registry operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by the session registry and its file actions.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The identifier failed validation.
    #[error("torrent identifier rejected")]
    Validation {
        /// Validation failure.
        #[from]
        source: ValidationError,
    },
    /// The engine refused a well-formed identifier.
    #[error("engine rejected session")]
    EngineRejected {
        /// Engine failure.
        source: EngineFailure,
    },
    /// The engine failed to remove a session.
    #[error("session removal failed")]
    RemovalFailed {
        /// Session being removed.
        session_id: Uuid,
        /// Engine failure.
        source: EngineFailure,
    },
    /// No live session has this identifier.
    #[error("session not found")]
    SessionNotFound {
        /// Requested session.
        session_id: Uuid,
    },
    /// File actions require metadata, which has not arrived yet.
    #[error("session metadata not yet available")]
    MetadataPending {
        /// Session still awaiting metadata.
        session_id: Uuid,
    },
    /// The file index is not part of the session's catalog.
    #[error("file not found")]
    FileNotFound {
        /// Owning session.
        session_id: Uuid,
        /// Requested file index.
        file_index: u32,
    },
    /// Stream was requested for a non-media file.
    #[error("file is not streamable")]
    NotStreamable {
        /// Requested file index.
        file_index: u32,
        /// File name.
        name: String,
    },
    /// Stream was requested before the file finished downloading.
    #[error("file not fully downloaded")]
    FileNotReady {
        /// Requested file index.
        file_index: u32,
        /// File name.
        name: String,
    },
    /// Another download or stream is already attached to the file.
    #[error("file already has an active transfer")]
    FileBusy {
        /// Requested file index.
        file_index: u32,
        /// File name.
        name: String,
    },
    /// A secondary engine call failed.
    #[error("engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Engine failure.
        source: EngineFailure,
    },
    /// Assembling a download failed.
    #[error("file assembly failed")]
    Assembly {
        /// Assembly failure.
        #[from]
        source: AssemblyError,
    },
    /// Feeding a playback buffer failed.
    #[error("file streaming failed")]
    Stream {
        /// Streaming failure.
        #[from]
        source: StreamError,
    },
    /// The registry has been shut down.
    #[error("session registry shut down")]
    ShutDown,
}

impl SessionError {
    pub(crate) fn engine(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Engine {
            operation,
            source: source.into(),
        }
    }

    /// Status text shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { source } => source.user_message(),
            Self::EngineRejected { source } => format!("Torrent error: {source}"),
            Self::RemovalFailed { source, .. } => {
                format!("Could not remove the previous torrent: {source}")
            }
            Self::SessionNotFound { .. } => "This torrent is no longer active.".to_string(),
            Self::MetadataPending { .. } => {
                "Still waiting for torrent metadata. Please try again shortly.".to_string()
            }
            Self::FileNotFound { file_index, .. } => {
                format!("File #{file_index} is not part of this torrent.")
            }
            Self::NotStreamable { name, .. } => {
                format!("{name} cannot be streamed. Use Download instead.")
            }
            Self::FileNotReady { name, .. } => {
                format!("{name} is not fully downloaded yet. Please wait and try again.")
            }
            Self::FileBusy { name, .. } => {
                format!("{name} is already being downloaded or streamed.")
            }
            Self::Engine { source, .. } => format!("Torrent error: {source}"),
            Self::Assembly { source } => source.user_message(),
            Self::Stream { source } => source.user_message(),
            Self::ShutDown => "The torrent client has been shut down.".to_string(),
        }
    }
}

/// Failures while assembling a file into a downloadable artifact.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The engine could not open the file's chunk stream.
    #[error("chunk stream could not be opened")]
    Open {
        /// Engine failure.
        source: EngineFailure,
    },
    /// The chunk stream signalled an error; partial data was discarded.
    #[error("chunk stream failed during assembly")]
    Stream {
        /// Chunks received before the failure.
        received_chunks: usize,
        /// Stream error.
        source: ChunkError,
    },
    /// The session was removed while assembling.
    #[error("assembly cancelled")]
    Cancelled,
}

impl AssemblyError {
    /// Status text shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Open { source } => format!("Error downloading file: {source}"),
            Self::Stream { source, .. } => format!("Error downloading file: {}", source.detail()),
            Self::Cancelled => "Download cancelled.".to_string(),
        }
    }
}

/// Failures while feeding a playback buffer.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The engine could not open the file's chunk stream.
    #[error("chunk stream could not be opened")]
    Open {
        /// Engine failure.
        source: EngineFailure,
    },
    /// The chunk stream signalled an error; the buffer keeps what was fed.
    #[error("chunk stream failed during playback")]
    Stream {
        /// Stream error.
        source: ChunkError,
    },
    /// The playback buffer refused an operation.
    #[error("playback buffer failed")]
    Playback {
        /// Buffer error.
        source: PlaybackError,
    },
    /// The session was removed while streaming.
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    /// Status text shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Open { source } => format!("Error streaming file: {source}"),
            Self::Stream { source } => format!("Error streaming file: {}", source.detail()),
            Self::Playback { source } => format!("Playback error: {source}"),
            Self::Cancelled => "Streaming stopped.".to_string(),
        }
    }
}

/// Failures in the torrent creation flow.
#[derive(Debug, Error)]
pub enum CreationError {
    /// No files were selected.
    #[error("no files selected")]
    NoFiles,
    /// The creator failed to build the descriptor.
    #[error("torrent creation failed")]
    Creator {
        /// Creator failure.
        source: EngineFailure,
    },
}

impl CreationError {
    /// Status text shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoFiles => "Please select at least one file.".to_string(),
            Self::Creator { source } => format!("Error creating torrent: {source}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn validation_errors_pass_through_user_message() {
        let err = SessionError::from(ValidationError::EmptyTorrentFile);
        assert_eq!(
            err.user_message(),
            "Invalid .torrent file. Please upload a valid .torrent file."
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn engine_failures_keep_their_source() {
        let err = SessionError::engine("open_read_stream", anyhow::anyhow!("disk offline"));
        assert_eq!(err.to_string(), "engine operation failed");
        assert_eq!(err.user_message(), "Torrent error: disk offline");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("disk offline")
        );
    }

    #[test]
    fn transfer_errors_describe_the_failure() {
        let assembly = AssemblyError::Stream {
            received_chunks: 2,
            source: ChunkError::interrupted("peer connection lost"),
        };
        assert_eq!(
            SessionError::from(assembly).user_message(),
            "Error downloading file: peer connection lost"
        );
        assert_eq!(
            CreationError::NoFiles.user_message(),
            "Please select at least one file."
        );
        let busy = SessionError::FileBusy {
            file_index: 0,
            name: "movie.mp4".into(),
        };
        assert!(busy.user_message().starts_with("movie.mp4"));
    }
}
