//! Album index: album name → track ids.

use crate::model::Track;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Sentinel album name for tracks with an empty album field.
pub const UNKNOWN_ALBUM: &str = "Unknown album";

/// Canonical album name for a track.
pub fn canonical_album(album: &str) -> &str {
    let trimmed = album.trim();
    if trimmed.is_empty() {
        UNKNOWN_ALBUM
    } else {
        trimmed
    }
}

/// Thread-safe album name → track ids index.
pub struct AlbumsLibrary {
    index: Mutex<HashMap<String, HashSet<u32>>>,
}

impl Default for AlbumsLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl AlbumsLibrary {
    pub fn new() -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_track(&self, track: &Track) {
        let album = canonical_album(&track.album).to_string();
        self.index.lock().entry(album).or_default().insert(track.id);
    }

    pub fn remove_track(&self, track: &Track) {
        let album = canonical_album(&track.album);
        let mut index = self.index.lock();
        if let Some(ids) = index.get_mut(album) {
            ids.remove(&track.id);
            if ids.is_empty() {
                index.remove(album);
            }
        }
    }

    pub fn album_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tracks_of(&self, album: &str) -> HashSet<u32> {
        self.index
            .lock()
            .get(canonical_album(album))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, album: &str) -> bool {
        self.index.lock().contains_key(canonical_album(album))
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }

    pub fn clear(&self) {
        self.index.lock().clear();
    }
}
