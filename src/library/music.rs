//! The music library orchestrator.
//!
//! Composes the track, artist, album, waveform and playlist collections
//! and keeps the derived indices in step with the canonical track map.
//! Every structural change runs the same fixed sequence: artist index,
//! album index, showing projection, save schedule. There is no
//! cross-collection transaction; consistency comes from applying the
//! steps in order and logging (not propagating) per-track failures so one
//! bad track never sinks a batch.

use crate::error::Result;
use crate::events::{EventBus, LibraryEvent};
use crate::library::albums::AlbumsLibrary;
use crate::library::artists::{title_case, ArtistsLibrary};
use crate::library::playlists::PlaylistsLibrary;
use crate::library::tracks::{ShowingMode, TracksLibrary};
use crate::library::waveforms::WaveformsLibrary;
use crate::model::{Playlist, Track};
use std::collections::HashMap;
use std::sync::Arc;

/// Schedules persistence of the flagged collections. Implemented by the
/// save worker handle; tests plug in a no-op.
pub trait SaveScheduler: Send + Sync {
    fn schedule(&self, tracks: bool, waveforms: bool, playlists: bool);
}

/// Scheduler that drops every request. For tests and tooling that
/// manages persistence itself.
pub struct NoopSaver;

impl SaveScheduler for NoopSaver {
    fn schedule(&self, _tracks: bool, _waveforms: bool, _playlists: bool) {}
}

pub struct MusicLibrary {
    pub tracks: Arc<TracksLibrary>,
    pub artists: Arc<ArtistsLibrary>,
    pub albums: Arc<AlbumsLibrary>,
    pub waveforms: Arc<WaveformsLibrary>,
    pub playlists: Arc<PlaylistsLibrary>,
    events: Arc<EventBus>,
    saver: Arc<dyn SaveScheduler>,
}

impl MusicLibrary {
    pub fn new(events: Arc<EventBus>, saver: Arc<dyn SaveScheduler>) -> Self {
        Self {
            tracks: Arc::new(TracksLibrary::new(events.clone())),
            artists: Arc::new(ArtistsLibrary::new(events.clone())),
            albums: Arc::new(AlbumsLibrary::new()),
            waveforms: Arc::new(WaveformsLibrary::new()),
            playlists: Arc::new(PlaylistsLibrary::new(events.clone())),
            events,
            saver,
        }
    }

    /// Compose the orchestrator over collections constructed elsewhere,
    /// for callers that also hand the collections to the save worker.
    pub fn with_collections(
        tracks: Arc<TracksLibrary>,
        artists: Arc<ArtistsLibrary>,
        albums: Arc<AlbumsLibrary>,
        waveforms: Arc<WaveformsLibrary>,
        playlists: Arc<PlaylistsLibrary>,
        events: Arc<EventBus>,
        saver: Arc<dyn SaveScheduler>,
    ) -> Self {
        Self {
            tracks,
            artists,
            albums,
            waveforms,
            playlists,
            events,
            saver,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Merge parsed tracks into the library and update every derived
    /// index.
    pub fn add_tracks(&self, new_tracks: HashMap<u32, Track>) {
        if new_tracks.is_empty() {
            return;
        }
        for track in new_tracks.values() {
            self.artists.add_track(track);
            self.albums.add_track(track);
        }
        self.tracks.add(new_tracks);
        self.saver.schedule(true, false, false);
    }

    /// Delete tracks and scrub them from every derived index.
    ///
    /// A selection covering the whole library takes the wipe-everything
    /// fast path, which must end in the same state as removing the
    /// tracks one at a time.
    pub fn delete_tracks(&self, ids: &[u32]) {
        if ids.is_empty() {
            return;
        }
        if ids.len() == self.tracks.len() {
            self.clear_all();
            return;
        }
        for &id in ids {
            let Some(track) = self.tracks.get(id) else {
                log::warn!("Delete requested for unknown track id {id}");
                continue;
            };
            self.artists.remove_track(&track);
            self.albums.remove_track(&track);
            self.waveforms.remove(id);
            self.playlists.remove_from_playlists(id);
        }
        self.tracks.remove(ids);
        self.saver.schedule(true, true, true);
    }

    fn clear_all(&self) {
        log::info!("Deleting the whole library, clearing all collections");
        self.tracks.clear();
        self.artists.clear();
        self.albums.clear();
        self.waveforms.clear();
        self.playlists.clear_all_tracks();
        self.saver.schedule(true, true, true);
    }

    /// Edit one track in place, reconciling the artist and album indices
    /// with the before/after field values.
    pub fn update_track(&self, id: u32, f: impl FnOnce(&mut Track)) -> bool {
        let Some((before, after)) = self.tracks.update(id, f) else {
            return false;
        };
        self.artists.remove_track(&before);
        self.artists.add_track(&after);
        self.albums.remove_track(&before);
        self.albums.add_track(&after);
        self.saver.schedule(true, false, false);
        true
    }

    // Playlist mutation, with the showing projection refreshed whenever
    // the playlist on display is affected.

    pub fn add_playlist(&self, playlist: Playlist) -> Result<()> {
        self.playlists.add_playlist(playlist)?;
        self.saver.schedule(false, false, true);
        Ok(())
    }

    pub fn add_child_playlist(&self, folder: &str, playlist: Playlist) -> Result<()> {
        self.playlists.add_child_playlist(folder, playlist)?;
        self.saver.schedule(false, false, true);
        Ok(())
    }

    pub fn delete_playlist(&self, name: &str) -> Result<()> {
        self.playlists.delete_playlist(name)?;
        if let ShowingMode::Playlist { name: shown, .. } = self.tracks.mode() {
            if shown == name {
                self.show_all_tracks();
            }
        }
        self.saver.schedule(false, false, true);
        Ok(())
    }

    pub fn add_to_playlist(&self, name: &str, track_ids: &[u32]) -> Result<()> {
        self.playlists.add_to_playlist(name, track_ids)?;
        self.refresh_shown_playlist(name)?;
        self.saver.schedule(false, false, true);
        Ok(())
    }

    pub fn remove_from_playlist(&self, name: &str, track_ids: &[u32]) -> Result<()> {
        self.playlists.remove_from_playlist(name, track_ids)?;
        self.refresh_shown_playlist(name)?;
        self.saver.schedule(false, false, true);
        Ok(())
    }

    fn refresh_shown_playlist(&self, name: &str) -> Result<()> {
        if let ShowingMode::Playlist { name: shown, .. } = self.tracks.mode() {
            if shown == name {
                self.show_playlist(name)?;
            }
        }
        Ok(())
    }

    // Navigation.

    pub fn show_all_tracks(&self) {
        self.tracks.set_mode(ShowingMode::All);
    }

    pub fn show_playlist(&self, name: &str) -> Result<()> {
        let ids = self.playlists.effective_tracks(name)?;
        self.tracks.set_mode(ShowingMode::Playlist {
            name: name.to_string(),
            ids,
        });
        Ok(())
    }

    pub fn show_artist(&self, artist: &str) {
        self.tracks.set_mode(ShowingMode::Artist(title_case(artist)));
    }

    pub fn random_playable(&self, target: usize) -> Vec<u32> {
        self.tracks.random_playable(target)
    }

    /// Track whose embedded art serves as the playlist's cover image.
    pub fn playlist_cover_track(&self, name: &str) -> Result<Option<u32>> {
        self.playlists.cover_track(name, &self.tracks)
    }

    /// Rebuild the in-memory state from persisted collections. Derived
    /// indices are recomputed from the tracks, never loaded from disk.
    pub fn restore(
        &self,
        tracks: HashMap<u32, Track>,
        playlists: Vec<Playlist>,
        waveforms: HashMap<u32, Vec<f32>>,
    ) {
        for track in tracks.values() {
            self.artists.add_track(track);
            self.albums.add_track(track);
        }
        self.tracks.add(tracks);
        self.playlists.restore(playlists);
        self.waveforms.restore(waveforms);
        self.events.publish(LibraryEvent::ShowingChanged);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn library() -> MusicLibrary {
        MusicLibrary::new(Arc::new(EventBus::new()), Arc::new(NoopSaver))
    }

    fn track(id: u32, name: &str, artist: &str, album: &str) -> Track {
        let mut t = Track::new(id, PathBuf::from("/music"), format!("{id}.mp3"));
        t.name = name.to_string();
        t.artist = artist.to_string();
        t.album = album.to_string();
        t
    }

    fn add(lib: &MusicLibrary, tracks: Vec<Track>) {
        lib.add_tracks(tracks.into_iter().map(|t| (t.id, t)).collect());
    }

    #[test]
    fn test_add_updates_every_derived_index() {
        let lib = library();
        add(&lib, vec![track(1, "S", "Adam Beyer & Ida Engberg", "Norte")]);

        assert_eq!(
            lib.artists.artist_names(),
            vec!["Adam Beyer".to_string(), "Ida Engberg".to_string()]
        );
        assert_eq!(lib.albums.album_names(), vec!["Norte".to_string()]);
        assert_eq!(lib.tracks.showing_ids(), vec![1]);
    }

    #[test]
    fn test_delete_all_equals_one_by_one_removal() {
        let seed = || {
            let lib = library();
            add(
                &lib,
                vec![
                    track(1, "S1", "A", "X"),
                    track(2, "S2", "B", "Y"),
                    track(3, "S3", "A", "X"),
                ],
            );
            lib.waveforms.add(1, vec![0.0; 520]);
            lib.add_playlist({
                let mut p = Playlist::new("P");
                p.add_tracks(&[1, 3]).unwrap();
                p
            })
            .unwrap();
            lib
        };

        // Fast path: one call covering the whole library.
        let fast = seed();
        fast.delete_tracks(&[1, 2, 3]);

        // Slow path: one at a time.
        let slow = seed();
        for id in [1, 2, 3] {
            slow.delete_tracks(&[id]);
        }

        for lib in [&fast, &slow] {
            assert!(lib.tracks.is_empty());
            assert!(lib.artists.is_empty());
            assert!(lib.albums.is_empty());
            assert!(lib.waveforms.is_empty());
            assert!(lib.tracks.showing_ids().is_empty());
            assert!(lib.playlists.effective_tracks("P").unwrap().is_empty());
        }
    }

    #[test]
    fn test_partial_delete_scrubs_only_selected_tracks() {
        let lib = library();
        add(&lib, vec![track(1, "S1", "A", "X"), track(2, "S2", "B", "Y")]);
        lib.waveforms.add(1, vec![0.0; 520]);
        lib.waveforms.add(2, vec![0.0; 520]);

        lib.delete_tracks(&[1]);

        assert_eq!(lib.tracks.len(), 1);
        assert!(!lib.artists.contains("A"));
        assert!(lib.artists.contains("B"));
        assert!(!lib.waveforms.contains(1));
        assert!(lib.waveforms.contains(2));
    }

    #[test]
    fn test_unknown_ids_do_not_abort_the_batch() {
        let lib = library();
        add(&lib, vec![track(1, "S1", "A", "X"), track(2, "S2", "B", "Y")]);

        lib.delete_tracks(&[99, 1]);

        assert_eq!(lib.tracks.len(), 1);
        assert!(lib.tracks.contains_id(2));
    }

    #[test]
    fn test_update_track_moves_index_entries() {
        let lib = library();
        add(&lib, vec![track(1, "S", "Old Artist", "Old Album")]);

        lib.update_track(1, |t| {
            t.artist = "New Artist".to_string();
            t.album = "New Album".to_string();
        });

        assert!(!lib.artists.contains("Old Artist"));
        assert!(lib.artists.contains("New Artist"));
        assert!(!lib.albums.contains("Old Album"));
        assert!(lib.albums.contains("New Album"));
    }

    #[test]
    fn test_showing_playlist_tracks_membership_changes() {
        let lib = library();
        add(&lib, vec![track(1, "S1", "A", "X"), track(2, "S2", "B", "Y")]);
        lib.add_playlist(Playlist::new("P")).unwrap();
        lib.add_to_playlist("P", &[1]).unwrap();
        lib.show_playlist("P").unwrap();
        assert_eq!(lib.tracks.showing_ids(), vec![1]);

        lib.add_to_playlist("P", &[2]).unwrap();
        assert_eq!(lib.tracks.showing_ids(), vec![1, 2]);

        lib.delete_playlist("P").unwrap();
        assert_eq!(lib.tracks.showing_ids(), vec![1, 2]);
        assert_eq!(lib.tracks.mode(), ShowingMode::All);
    }
}
