//! Identifier validation applied before anything reaches the engine.

use crate::error::ValidationError;
use crate::model::TorrentIdentifier;

/// Scheme prefix every magnet URI must start with.
pub const MAGNET_PREFIX: &str = "magnet:";

const TORRENT_EXTENSION: &str = ".torrent";

/// Raw user input: pasted text or the bytes of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierInput {
    /// Text typed or pasted by the user.
    Text(String),
    /// Bytes read from an uploaded file.
    Bytes(Vec<u8>),
}

impl From<&str> for IdentifierInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for IdentifierInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for IdentifierInput {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for IdentifierInput {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

/// Classify and validate a torrent reference.
///
/// Text must start with [`MAGNET_PREFIX`] and is kept verbatim; bytes must be
/// non-empty and are kept unchanged.
///
/// # Errors
///
/// - [`ValidationError::EmptyIdentifier`] when nothing (or blank text) was supplied.
/// - [`ValidationError::MalformedMagnetLink`] when text lacks the magnet prefix.
/// - [`ValidationError::EmptyTorrentFile`] when the byte payload is empty.
pub fn validate(input: Option<IdentifierInput>) -> Result<TorrentIdentifier, ValidationError> {
    match input {
        None => Err(ValidationError::EmptyIdentifier),
        Some(IdentifierInput::Text(uri)) => {
            if uri.trim().is_empty() {
                Err(ValidationError::EmptyIdentifier)
            } else if uri.starts_with(MAGNET_PREFIX) {
                Ok(TorrentIdentifier::Magnet { uri })
            } else {
                Err(ValidationError::MalformedMagnetLink)
            }
        }
        Some(IdentifierInput::Bytes(bytes)) => {
            if bytes.is_empty() {
                Err(ValidationError::EmptyTorrentFile)
            } else {
                Ok(TorrentIdentifier::Metainfo { bytes })
            }
        }
    }
}

/// Validate an uploaded `.torrent` file by name and content.
///
/// # Errors
///
/// Returns [`ValidationError::UnsupportedUpload`] when the name does not end in
/// `.torrent` (case-insensitive), otherwise the same errors as [`validate`].
pub fn validate_upload(
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<TorrentIdentifier, ValidationError> {
    if !file_name.to_ascii_lowercase().ends_with(TORRENT_EXTENSION) {
        return Err(ValidationError::UnsupportedUpload {
            file_name: file_name.to_string(),
        });
    }
    validate(Some(IdentifierInput::Bytes(bytes)))
}
