//! Error taxonomy for the library core.
//!
//! Per-item parse and not-found failures during bulk imports are *not*
//! represented here: they are collected as itemized strings and surfaced
//! once at the end of the batch. This enum covers the conditions that are
//! reported immediately.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LibraryError>;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// A second import was requested while one is still running.
    #[error("an import task is already running")]
    AlreadyImporting,

    /// Tracks were added to or removed from a folder playlist.
    #[error("playlist \"{0}\" is a folder and cannot hold tracks directly")]
    FolderPlaylist(String),

    /// A child playlist was attached to a non-folder playlist.
    #[error("playlist \"{0}\" is not a folder")]
    NotAFolder(String),

    #[error("a playlist named \"{0}\" already exists")]
    DuplicatePlaylist(String),

    #[error("no playlist named \"{0}\"")]
    UnknownPlaylist(String),

    #[error("no track with id {0}")]
    UnknownTrack(u32),

    /// The selected file is not an iTunes library (missing plist signature).
    #[error("not an iTunes library: {0}")]
    InvalidItunesLibrary(String),

    #[error("failed to read metadata from {path:?}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("failed to write metadata to {path:?}: {message}")]
    TagWrite { path: PathBuf, message: String },

    #[error("could not extract a waveform from {path:?}: {message}")]
    Waveform { path: PathBuf, message: String },

    #[error("failed to persist {file}: {message}")]
    Persistence { file: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    pub(crate) fn persistence(file: &str, err: impl std::fmt::Display) -> Self {
        LibraryError::Persistence {
            file: file.to_string(),
            message: err.to_string(),
        }
    }
}
