use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};

/// A playlist: either a leaf holding an ordered list of track ids, or a
/// folder holding child playlists and no tracks of its own.
///
/// Identity is name-based: two playlists with the same name compare equal
/// regardless of content. The playlists library enforces name uniqueness
/// on insertion, which keeps that identity sound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub is_folder: bool,

    /// Ordered track ids. Always empty for folders.
    #[serde(default)]
    tracks: Vec<u32>,

    /// Child playlists. Always empty for leaves.
    #[serde(default)]
    children: Vec<Playlist>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: false,
            tracks: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn new_folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: true,
            tracks: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Track ids held directly by this playlist. Empty for folders.
    pub fn track_ids(&self) -> &[u32] {
        &self.tracks
    }

    pub fn children(&self) -> &[Playlist] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Playlist> {
        &mut self.children
    }

    /// Append track ids, skipping ids already present.
    ///
    /// Fails on folder playlists: they never hold tracks directly.
    pub fn add_tracks(&mut self, ids: &[u32]) -> Result<()> {
        if self.is_folder {
            return Err(LibraryError::FolderPlaylist(self.name.clone()));
        }
        for &id in ids {
            if !self.tracks.contains(&id) {
                self.tracks.push(id);
            }
        }
        Ok(())
    }

    /// Remove track ids. Fails on folder playlists.
    pub fn remove_tracks(&mut self, ids: &[u32]) -> Result<()> {
        if self.is_folder {
            return Err(LibraryError::FolderPlaylist(self.name.clone()));
        }
        self.tracks.retain(|id| !ids.contains(id));
        Ok(())
    }

    /// Drop a track id without the folder check, for cascading removals
    /// driven by track deletion.
    pub(crate) fn purge_track(&mut self, id: u32) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| *t != id);
        let changed = self.tracks.len() != before;
        changed
            | self
                .children
                .iter_mut()
                .fold(false, |acc, child| child.purge_track(id) || acc)
    }

    pub fn add_child(&mut self, child: Playlist) -> Result<()> {
        if !self.is_folder {
            return Err(LibraryError::NotAFolder(self.name.clone()));
        }
        self.children.push(child);
        Ok(())
    }

    /// The effective track set: a leaf's own ids, or the union of the
    /// descendants' tracks for a folder. Order of first occurrence, no
    /// duplicates.
    pub fn effective_tracks(&self) -> Vec<u32> {
        let mut seen = Vec::new();
        self.collect_tracks(&mut seen);
        seen
    }

    fn collect_tracks(&self, out: &mut Vec<u32>) {
        if self.is_folder {
            for child in &self.children {
                child.collect_tracks(out);
            }
        } else {
            for &id in &self.tracks {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        if self.is_folder {
            self.children.iter().all(|c| c.is_empty())
        } else {
            self.tracks.is_empty()
        }
    }

    pub(crate) fn clear_tracks(&mut self) {
        self.tracks.clear();
        for child in &mut self.children {
            child.clear_tracks();
        }
    }
}

impl PartialEq for Playlist {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Playlist {}

impl std::hash::Hash for Playlist {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
