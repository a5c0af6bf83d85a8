//! The authoritative track collection and its "currently showing"
//! projection.
//!
//! The canonical id→track map and the showing list are guarded by one
//! mutex: every read or write of either goes through it, so the UI never
//! observes a torn view. The showing list is reprojected synchronously on
//! every structural change, under whatever navigation mode is active.

use crate::events::{EventBus, LibraryEvent};
use crate::library::artists::artists_involved;
use crate::model::Track;
use chrono::Utc;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;

/// What the showing projection materializes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowingMode {
    /// Every track in the library.
    All,
    /// The resolved track ids of one playlist, in playlist order.
    Playlist { name: String, ids: Vec<u32> },
    /// Every track involving one artist.
    Artist(String),
}

struct TracksState {
    tracks: HashMap<u32, Track>,
    showing: Vec<u32>,
    mode: ShowingMode,
}

/// Thread-safe canonical track map plus showing projection.
pub struct TracksLibrary {
    state: Mutex<TracksState>,
    events: Arc<EventBus>,
}

impl TracksLibrary {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            state: Mutex::new(TracksState {
                tracks: HashMap::new(),
                showing: Vec::new(),
                mode: ShowingMode::All,
            }),
            events,
        }
    }

    /// Bulk insert with merge semantics: existing ids are overwritten.
    pub fn add(&self, new_tracks: HashMap<u32, Track>) {
        if new_tracks.is_empty() {
            return;
        }
        let ids: Vec<u32> = {
            let mut state = self.state.lock();
            let ids = new_tracks.keys().copied().collect();
            state.tracks.extend(new_tracks);
            let showing = project(&state.tracks, &state.mode);
            state.showing = showing;
            ids
        };
        self.events.publish(LibraryEvent::TracksAdded(ids));
        self.events.publish(LibraryEvent::ShowingChanged);
    }

    /// Remove tracks by id, returning the removed tracks.
    pub fn remove(&self, ids: &[u32]) -> Vec<Track> {
        let removed: Vec<Track> = {
            let mut state = self.state.lock();
            let removed = ids
                .iter()
                .filter_map(|id| state.tracks.remove(id))
                .collect();
            let showing = project(&state.tracks, &state.mode);
            state.showing = showing;
            removed
        };
        if !removed.is_empty() {
            let removed_ids = removed.iter().map(|t| t.id).collect();
            self.events.publish(LibraryEvent::TracksRemoved(removed_ids));
            self.events.publish(LibraryEvent::ShowingChanged);
        }
        removed
    }

    pub fn get(&self, id: u32) -> Option<Track> {
        self.state.lock().tracks.get(&id).cloned()
    }

    pub fn contains_id(&self, id: u32) -> bool {
        self.state.lock().tracks.contains_key(&id)
    }

    /// Value-based membership: uses track equality, not id.
    pub fn contains(&self, track: &Track) -> bool {
        self.state.lock().tracks.values().any(|t| t == track)
    }

    pub fn len(&self) -> usize {
        self.state.lock().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tracks.is_empty()
    }

    pub fn all_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.state.lock().tracks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Up to `target` distinct playable track ids, uniformly sampled.
    ///
    /// Shuffles the id space once and filters, so the call terminates even
    /// when fewer than `target` playable tracks exist: it returns whatever
    /// was found.
    pub fn random_playable(&self, target: usize) -> Vec<u32> {
        let state = self.state.lock();
        let mut ids: Vec<u32> = state.tracks.keys().copied().collect();
        ids.shuffle(&mut rand::rng());
        ids.into_iter()
            .filter(|id| state.tracks[id].playable())
            .take(target)
            .collect()
    }

    /// Apply `f` to one track, returning the before/after clones so the
    /// caller can reconcile derived indices. Publishes `TrackModified`.
    pub fn update(&self, id: u32, f: impl FnOnce(&mut Track)) -> Option<(Track, Track)> {
        let result = {
            let mut state = self.state.lock();
            let track = state.tracks.get_mut(&id)?;
            let before = track.clone();
            f(track);
            track.last_modified = Utc::now();
            let after = track.clone();
            let showing = project(&state.tracks, &state.mode);
            state.showing = showing;
            Some((before, after))
        };
        self.events.publish(LibraryEvent::TrackModified(id));
        result
    }

    /// Switch navigation mode and reproject in full.
    pub fn set_mode(&self, mode: ShowingMode) {
        {
            let mut state = self.state.lock();
            state.mode = mode;
            let showing = project(&state.tracks, &state.mode);
            state.showing = showing;
        }
        self.events.publish(LibraryEvent::ShowingChanged);
    }

    pub fn mode(&self) -> ShowingMode {
        self.state.lock().mode.clone()
    }

    /// Reproject the showing list under the current mode.
    pub fn reset_showing(&self) {
        {
            let mut state = self.state.lock();
            let showing = project(&state.tracks, &state.mode);
            state.showing = showing;
        }
        self.events.publish(LibraryEvent::ShowingChanged);
    }

    pub fn showing_ids(&self) -> Vec<u32> {
        self.state.lock().showing.clone()
    }

    /// Materialized showing tracks, cloned under the lock.
    pub fn showing_tracks(&self) -> Vec<Track> {
        let state = self.state.lock();
        state
            .showing
            .iter()
            .filter_map(|id| state.tracks.get(id).cloned())
            .collect()
    }

    pub fn clear(&self) {
        let ids: Vec<u32> = {
            let mut state = self.state.lock();
            let ids = state.tracks.keys().copied().collect();
            state.tracks.clear();
            state.showing.clear();
            ids
        };
        self.events.publish(LibraryEvent::TracksRemoved(ids));
        self.events.publish(LibraryEvent::ShowingChanged);
    }

    /// Run `f` against the canonical map under the collection lock. Used
    /// by the persistence worker.
    pub fn with_all<R>(&self, f: impl FnOnce(&HashMap<u32, Track>) -> R) -> R {
        f(&self.state.lock().tracks)
    }
}

fn project(tracks: &HashMap<u32, Track>, mode: &ShowingMode) -> Vec<u32> {
    match mode {
        ShowingMode::All => {
            let mut ids: Vec<u32> = tracks.keys().copied().collect();
            ids.sort_unstable();
            ids
        }
        ShowingMode::Playlist { ids, .. } => ids
            .iter()
            .copied()
            .filter(|id| tracks.contains_key(id))
            .collect(),
        ShowingMode::Artist(artist) => {
            let mut ids: Vec<u32> = tracks
                .values()
                .filter(|t| artists_involved(t).contains(artist))
                .map(|t| t.id)
                .collect();
            ids.sort_unstable();
            ids
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn track(id: u32, name: &str, artist: &str) -> Track {
        let mut t = Track::new(id, PathBuf::from("/music"), format!("{id}.mp3"));
        t.name = name.to_string();
        t.artist = artist.to_string();
        t
    }

    fn library_with(tracks: Vec<Track>) -> TracksLibrary {
        let lib = TracksLibrary::new(Arc::new(EventBus::new()));
        lib.add(tracks.into_iter().map(|t| (t.id, t)).collect());
        lib
    }

    #[test]
    fn test_add_overwrites_existing_ids() {
        let lib = library_with(vec![track(1, "Old", "A")]);
        lib.add(HashMap::from([(1, track(1, "New", "A"))]));

        assert_eq!(lib.len(), 1);
        assert_eq!(lib.get(1).unwrap().name, "New");
    }

    #[test]
    fn test_contains_uses_value_equality() {
        let lib = library_with(vec![track(1, "Song", "A")]);
        // Same content, different id.
        assert!(lib.contains(&track(99, "song", "a")));
        assert!(!lib.contains(&track(1, "Other", "A")));
    }

    #[test]
    fn test_showing_follows_add_and_remove_in_all_mode() {
        let lib = library_with(vec![track(1, "S1", "A"), track(2, "S2", "B")]);
        assert_eq!(lib.showing_ids(), vec![1, 2]);

        lib.remove(&[1]);
        assert_eq!(lib.showing_ids(), vec![2]);
    }

    #[test]
    fn test_artist_mode_projects_involved_tracks() {
        let lib = library_with(vec![
            track(1, "S1", "Adam Beyer"),
            track(2, "S2 (Adam Beyer Remix)", "Someone"),
            track(3, "S3", "Other"),
        ]);
        lib.set_mode(ShowingMode::Artist("Adam Beyer".to_string()));
        assert_eq!(lib.showing_ids(), vec![1, 2]);
    }

    #[test]
    fn test_playlist_mode_keeps_playlist_order() {
        let lib = library_with(vec![track(1, "S1", "A"), track(2, "S2", "B")]);
        lib.set_mode(ShowingMode::Playlist {
            name: "P".to_string(),
            ids: vec![2, 1, 7],
        });
        // Unknown id 7 is not materialized.
        assert_eq!(lib.showing_ids(), vec![2, 1]);
    }

    #[test]
    fn test_reset_showing_reprojects_under_the_current_mode() {
        let lib = library_with(vec![track(1, "S1", "A"), track(2, "S2", "B")]);
        lib.set_mode(ShowingMode::Playlist {
            name: "P".to_string(),
            ids: vec![2],
        });
        lib.reset_showing();
        assert_eq!(lib.showing_ids(), vec![2]);

        lib.set_mode(ShowingMode::All);
        lib.reset_showing();
        assert_eq!(lib.showing_ids(), vec![1, 2]);
    }

    #[test]
    fn test_random_playable_is_bounded_when_library_is_small() {
        let mut playable = track(1, "S1", "A");
        playable.in_disk = true;
        let lib = library_with(vec![playable, track(2, "S2", "B")]);

        let picked = lib.random_playable(50);
        assert_eq!(picked, vec![1]);
    }
}
