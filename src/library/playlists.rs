//! Playlist collection: a forest of playlists and folders.
//!
//! Top-level playlists hang off a synthetic root (the vector itself);
//! folders nest arbitrarily. All structural operations go through one
//! mutex on the forest.

use crate::error::{LibraryError, Result};
use crate::events::{EventBus, LibraryEvent};
use crate::library::tracks::TracksLibrary;
use crate::model::Playlist;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::sync::Arc;

pub struct PlaylistsLibrary {
    forest: Mutex<Vec<Playlist>>,
    events: Arc<EventBus>,
}

impl PlaylistsLibrary {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            forest: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Add a top-level playlist. Names are unique across the whole
    /// forest; a duplicate is rejected.
    pub fn add_playlist(&self, playlist: Playlist) -> Result<()> {
        {
            let mut forest = self.forest.lock();
            if contains_name(&forest, &playlist.name) {
                return Err(LibraryError::DuplicatePlaylist(playlist.name));
            }
            forest.push(playlist);
        }
        self.events.publish(LibraryEvent::PlaylistsChanged);
        Ok(())
    }

    /// Add a playlist inside an existing folder.
    pub fn add_child_playlist(&self, folder: &str, playlist: Playlist) -> Result<()> {
        {
            let mut forest = self.forest.lock();
            if contains_name(&forest, &playlist.name) {
                return Err(LibraryError::DuplicatePlaylist(playlist.name));
            }
            let parent = find_mut(&mut forest, folder)
                .ok_or_else(|| LibraryError::UnknownPlaylist(folder.to_string()))?;
            parent.add_child(playlist)?;
        }
        self.events.publish(LibraryEvent::PlaylistsChanged);
        Ok(())
    }

    /// Delete a playlist by name: the top-level list is searched first,
    /// then every folder's children recursively. Exactly one removal.
    pub fn delete_playlist(&self, name: &str) -> Result<()> {
        {
            let mut forest = self.forest.lock();
            if let Some(pos) = forest.iter().position(|p| p.name == name) {
                forest.remove(pos);
            } else if !remove_nested(&mut forest, name) {
                return Err(LibraryError::UnknownPlaylist(name.to_string()));
            }
        }
        self.events.publish(LibraryEvent::PlaylistsChanged);
        Ok(())
    }

    pub fn add_to_playlist(&self, name: &str, track_ids: &[u32]) -> Result<()> {
        {
            let mut forest = self.forest.lock();
            let playlist = find_mut(&mut forest, name)
                .ok_or_else(|| LibraryError::UnknownPlaylist(name.to_string()))?;
            playlist.add_tracks(track_ids)?;
        }
        self.events.publish(LibraryEvent::PlaylistsChanged);
        Ok(())
    }

    pub fn remove_from_playlist(&self, name: &str, track_ids: &[u32]) -> Result<()> {
        {
            let mut forest = self.forest.lock();
            let playlist = find_mut(&mut forest, name)
                .ok_or_else(|| LibraryError::UnknownPlaylist(name.to_string()))?;
            playlist.remove_tracks(track_ids)?;
        }
        self.events.publish(LibraryEvent::PlaylistsChanged);
        Ok(())
    }

    /// Drop a deleted track from every leaf playlist. Covers referencing
    /// it are invalidated through the published event.
    pub fn remove_from_playlists(&self, track_id: u32) {
        let changed = {
            let mut forest = self.forest.lock();
            forest
                .iter_mut()
                .fold(false, |acc, p| p.purge_track(track_id) || acc)
        };
        if changed {
            self.events.publish(LibraryEvent::PlaylistsChanged);
        }
    }

    pub fn find(&self, name: &str) -> Option<Playlist> {
        find_in(&self.forest.lock(), name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        contains_name(&self.forest.lock(), name)
    }

    /// Resolved track ids of a playlist (recursive union for folders).
    pub fn effective_tracks(&self, name: &str) -> Result<Vec<u32>> {
        self.find(name)
            .map(|p| p.effective_tracks())
            .ok_or_else(|| LibraryError::UnknownPlaylist(name.to_string()))
    }

    /// Shuffled copy of a playlist's resolved track ids.
    pub fn random_sorted_list(&self, name: &str) -> Result<Vec<u32>> {
        let mut ids = self.effective_tracks(name)?;
        ids.shuffle(&mut rand::rng());
        Ok(ids)
    }

    /// Pick the track whose embedded art serves as the playlist cover:
    /// the first contained track that exists in the library and has
    /// cover art. Folders delegate to their first non-empty child.
    /// `None` means the caller falls back to the default image.
    pub fn cover_track(&self, name: &str, tracks: &TracksLibrary) -> Result<Option<u32>> {
        let playlist = self
            .find(name)
            .ok_or_else(|| LibraryError::UnknownPlaylist(name.to_string()))?;
        Ok(cover_of(&playlist, tracks))
    }

    pub fn playlist_names(&self) -> Vec<String> {
        let forest = self.forest.lock();
        let mut names = Vec::new();
        collect_names(&forest, &mut names);
        names.sort();
        names
    }

    pub fn top_level(&self) -> Vec<Playlist> {
        self.forest.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.forest.lock().is_empty()
    }

    /// Empty every playlist's track list but keep the structure. Used by
    /// the delete-everything fast path.
    pub fn clear_all_tracks(&self) {
        {
            let mut forest = self.forest.lock();
            for playlist in forest.iter_mut() {
                playlist.clear_tracks();
            }
        }
        self.events.publish(LibraryEvent::PlaylistsChanged);
    }

    pub fn clear(&self) {
        self.forest.lock().clear();
        self.events.publish(LibraryEvent::PlaylistsChanged);
    }

    /// Run `f` against the forest under the collection lock. Used by the
    /// persistence worker.
    pub fn with_all<R>(&self, f: impl FnOnce(&[Playlist]) -> R) -> R {
        f(&self.forest.lock())
    }

    pub(crate) fn restore(&self, forest: Vec<Playlist>) {
        *self.forest.lock() = forest;
        self.events.publish(LibraryEvent::PlaylistsChanged);
    }
}

fn contains_name(list: &[Playlist], name: &str) -> bool {
    find_in(list, name).is_some()
}

fn find_in<'a>(list: &'a [Playlist], name: &str) -> Option<&'a Playlist> {
    for playlist in list {
        if playlist.name == name {
            return Some(playlist);
        }
        if let Some(found) = find_in(playlist.children(), name) {
            return Some(found);
        }
    }
    None
}

fn find_mut<'a>(list: &'a mut [Playlist], name: &str) -> Option<&'a mut Playlist> {
    for playlist in list.iter_mut() {
        if playlist.name == name {
            return Some(playlist);
        }
        if playlist.is_folder {
            if let Some(found) = find_mut(playlist.children_mut(), name) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_nested(list: &mut [Playlist], name: &str) -> bool {
    for playlist in list.iter_mut() {
        if playlist.is_folder {
            let children = playlist.children_mut();
            if let Some(pos) = children.iter().position(|p| p.name == name) {
                children.remove(pos);
                return true;
            }
            if remove_nested(children, name) {
                return true;
            }
        }
    }
    false
}

fn collect_names(list: &[Playlist], out: &mut Vec<String>) {
    for playlist in list {
        out.push(playlist.name.clone());
        collect_names(playlist.children(), out);
    }
}

fn cover_of(playlist: &Playlist, tracks: &TracksLibrary) -> Option<u32> {
    if playlist.is_folder {
        let child = playlist.children().iter().find(|c| !c.is_empty())?;
        cover_of(child, tracks)
    } else {
        playlist
            .track_ids()
            .iter()
            .copied()
            .find(|&id| tracks.get(id).is_some_and(|t| t.has_cover))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Track;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn bus() -> Arc<EventBus> {
        Arc::new(EventBus::new())
    }

    fn leaf(name: &str, ids: &[u32]) -> Playlist {
        let mut p = Playlist::new(name);
        p.add_tracks(ids).unwrap();
        p
    }

    #[test]
    fn test_duplicate_names_rejected_across_the_forest() {
        let lib = PlaylistsLibrary::new(bus());
        let mut folder = Playlist::new_folder("Folder");
        folder.add_child(leaf("Inner", &[1])).unwrap();
        lib.add_playlist(folder).unwrap();

        let err = lib.add_playlist(Playlist::new("Inner")).unwrap_err();
        assert!(matches!(err, LibraryError::DuplicatePlaylist(_)));
    }

    #[test]
    fn test_delete_searches_top_level_then_folders() {
        let lib = PlaylistsLibrary::new(bus());
        let mut folder = Playlist::new_folder("Folder");
        folder.add_child(leaf("Nested", &[1])).unwrap();
        lib.add_playlist(folder).unwrap();
        lib.add_playlist(leaf("Top", &[2])).unwrap();

        lib.delete_playlist("Top").unwrap();
        assert!(!lib.contains("Top"));

        lib.delete_playlist("Nested").unwrap();
        assert!(!lib.contains("Nested"));
        assert!(lib.contains("Folder"));

        let err = lib.delete_playlist("Nested").unwrap_err();
        assert!(matches!(err, LibraryError::UnknownPlaylist(_)));
    }

    #[test]
    fn test_track_removal_cascades_to_every_leaf() {
        let lib = PlaylistsLibrary::new(bus());
        lib.add_playlist(leaf("A", &[1, 2])).unwrap();
        let mut folder = Playlist::new_folder("F");
        folder.add_child(leaf("B", &[2, 3])).unwrap();
        lib.add_playlist(folder).unwrap();

        lib.remove_from_playlists(2);

        assert_eq!(lib.effective_tracks("A").unwrap(), vec![1]);
        assert_eq!(lib.effective_tracks("B").unwrap(), vec![3]);
    }

    #[test]
    fn test_adding_tracks_to_folder_fails() {
        let lib = PlaylistsLibrary::new(bus());
        lib.add_playlist(Playlist::new_folder("F")).unwrap();

        let err = lib.add_to_playlist("F", &[1]).unwrap_err();
        assert!(matches!(err, LibraryError::FolderPlaylist(_)));
    }

    #[test]
    fn test_random_sorted_list_is_a_permutation() {
        let lib = PlaylistsLibrary::new(bus());
        lib.add_playlist(leaf("P", &[1, 2, 3, 4, 5])).unwrap();

        let mut shuffled = lib.random_sorted_list("P").unwrap();
        shuffled.sort_unstable();
        assert_eq!(shuffled, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_cover_selection_prefers_first_track_with_art() {
        let events = bus();
        let tracks = TracksLibrary::new(events.clone());
        let mut plain = Track::new(1, PathBuf::from("/m"), "1.mp3".into());
        plain.name = "One".into();
        let mut with_art = Track::new(2, PathBuf::from("/m"), "2.mp3".into());
        with_art.name = "Two".into();
        with_art.has_cover = true;
        tracks.add(HashMap::from([(1, plain), (2, with_art)]));

        let lib = PlaylistsLibrary::new(events);
        lib.add_playlist(leaf("P", &[1, 2])).unwrap();
        // Track 1 has no art, track 2 does.
        assert_eq!(lib.cover_track("P", &tracks).unwrap(), Some(2));

        // An empty playlist falls back to no cover at all.
        lib.add_playlist(Playlist::new("Empty")).unwrap();
        assert_eq!(lib.cover_track("Empty", &tracks).unwrap(), None);
    }

    #[test]
    fn test_folder_cover_delegates_to_first_nonempty_child() {
        let events = bus();
        let tracks = TracksLibrary::new(events.clone());
        let mut with_art = Track::new(5, PathBuf::from("/m"), "5.mp3".into());
        with_art.has_cover = true;
        tracks.add(HashMap::from([(5, with_art)]));

        let lib = PlaylistsLibrary::new(events);
        let mut folder = Playlist::new_folder("F");
        folder.add_child(Playlist::new("Empty")).unwrap();
        folder.add_child(leaf("Full", &[5])).unwrap();
        lib.add_playlist(folder).unwrap();

        assert_eq!(lib.cover_track("F", &tracks).unwrap(), Some(5));
    }
}
