//! Core data model: tracks and playlists.
//!
//! These types are independent of any import source (folders, iTunes)
//! and of the presentation layer.

mod playlist;
mod track;

pub use playlist::Playlist;
pub use track::Track;
