//! Melodist, the model core of a desktop music-library manager.
//!
//! Owns the in-memory collections (tracks, playlists, artists, albums,
//! waveforms), the fork/join import pipeline for folders and iTunes
//! libraries, and the background workers that persist the collections
//! and compute waveform thumbnails. The presentation layer is a
//! subscriber: it receives change events and never reaches in.

pub mod config;
pub mod error;
pub mod events;
pub mod library;
pub mod metadata;
pub mod model;
pub mod parse;
pub mod persist;
pub mod tasks;

pub use config::{ItunesPolicy, Preferences};
pub use error::{LibraryError, Result};
pub use library::MusicLibrary;
pub use tasks::TaskDemon;
