//! Debounced persistence worker.
//!
//! One lazily-started thread services all save requests. A request flags
//! which of the three collections need writing and signals the worker;
//! requests arriving while a save is pending are coalesced into the
//! already-set flags rather than queued. Each write holds the owning
//! collection's lock (inside the persist functions) and re-resolves the
//! target path from the preferences, so a runtime change of the
//! application folder takes effect on the next save.

use crate::config::Preferences;
use crate::error::LibraryError;
use crate::events::ErrorSink;
use crate::library::{PlaylistsLibrary, SaveScheduler, TracksLibrary, WaveformsLibrary};
use crate::persist;
use parking_lot::{Condvar, Mutex};
use std::mem;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Default, Clone, Copy)]
struct SaveFlags {
    tracks: bool,
    waveforms: bool,
    playlists: bool,
}

impl SaveFlags {
    fn any(&self) -> bool {
        self.tracks || self.waveforms || self.playlists
    }
}

struct SaveState {
    flags: SaveFlags,
    worker_started: bool,
}

struct SaveShared {
    state: Mutex<SaveState>,
    trigger: Condvar,
    tracks: Arc<TracksLibrary>,
    playlists: Arc<PlaylistsLibrary>,
    waveforms: Arc<WaveformsLibrary>,
    prefs: Arc<Preferences>,
    errors: Arc<dyn ErrorSink>,
}

/// Cloneable handle used to schedule (or force) library saves.
#[derive(Clone)]
pub struct SaveHandle {
    shared: Arc<SaveShared>,
}

impl SaveHandle {
    pub fn new(
        tracks: Arc<TracksLibrary>,
        playlists: Arc<PlaylistsLibrary>,
        waveforms: Arc<WaveformsLibrary>,
        prefs: Arc<Preferences>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            shared: Arc::new(SaveShared {
                state: Mutex::new(SaveState {
                    flags: SaveFlags::default(),
                    worker_started: false,
                }),
                trigger: Condvar::new(),
                tracks,
                playlists,
                waveforms,
                prefs,
                errors,
            }),
        }
    }

    /// Flag collections for saving and wake the worker, starting it on
    /// the first request.
    pub fn request(&self, tracks: bool, waveforms: bool, playlists: bool) {
        if !(tracks || waveforms || playlists) {
            return;
        }
        {
            let mut state = self.shared.state.lock();
            state.flags.tracks |= tracks;
            state.flags.waveforms |= waveforms;
            state.flags.playlists |= playlists;
            if !state.worker_started {
                let shared = self.shared.clone();
                let spawned = thread::Builder::new()
                    .name("library-saver".to_string())
                    .spawn(move || save_loop(shared));
                match spawned {
                    Ok(_) => state.worker_started = true,
                    Err(e) => log::error!("Could not start save worker: {e}"),
                }
            }
        }
        self.shared.trigger.notify_one();
    }

    /// Write the given collections on the calling thread. Used for
    /// orderly shutdown; clears any matching pending flags.
    pub fn save_now(&self, tracks: bool, waveforms: bool, playlists: bool) {
        {
            let mut state = self.shared.state.lock();
            state.flags.tracks &= !tracks;
            state.flags.waveforms &= !waveforms;
            state.flags.playlists &= !playlists;
        }
        perform_save(
            &self.shared,
            SaveFlags {
                tracks,
                waveforms,
                playlists,
            },
        );
    }
}

impl SaveScheduler for SaveHandle {
    fn schedule(&self, tracks: bool, waveforms: bool, playlists: bool) {
        self.request(tracks, waveforms, playlists);
    }
}

fn save_loop(shared: Arc<SaveShared>) {
    log::debug!("Save worker running");
    loop {
        let flags = {
            let mut state = shared.state.lock();
            while !state.flags.any() {
                shared.trigger.wait(&mut state);
            }
            mem::take(&mut state.flags)
        };
        perform_save(&shared, flags);
    }
}

/// Write the flagged collections. A failure on one collection is
/// reported and does not stop the others, and never kills the loop.
fn perform_save(shared: &SaveShared, flags: SaveFlags) {
    if flags.tracks {
        let path = shared.prefs.tracks_file();
        match persist::write_tracks(&shared.tracks, &path) {
            Ok(()) => {
                log::debug!("Saved tracks to {path:?}");
                // The id sequence advanced with the tracks; keep the
                // preferences file in step.
                if let Err(e) = shared.prefs.save() {
                    report(shared, "Could not save preferences", &e);
                }
            }
            Err(e) => report(shared, "Could not save the tracks collection", &e),
        }
    }
    if flags.waveforms {
        let path = shared.prefs.waveforms_file();
        match persist::write_waveforms(&shared.waveforms, &path) {
            Ok(()) => log::debug!("Saved waveforms to {path:?}"),
            Err(e) => report(shared, "Could not save the waveforms collection", &e),
        }
    }
    if flags.playlists {
        let path = shared.prefs.playlists_file();
        match persist::write_playlists(&shared.playlists, &path) {
            Ok(()) => log::debug!("Saved playlists to {path:?}"),
            Err(e) => report(shared, "Could not save the playlists collection", &e),
        }
    }
}

fn report(shared: &SaveShared, message: &str, err: &LibraryError) {
    log::error!("{message}: {err}");
    shared.errors.report(message, Some(&err.to_string()), &[]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventBus, LogErrors};
    use crate::model::Track;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn handle(prefs: Arc<Preferences>) -> (SaveHandle, Arc<TracksLibrary>) {
        let events = Arc::new(EventBus::new());
        let tracks = Arc::new(TracksLibrary::new(events.clone()));
        let playlists = Arc::new(PlaylistsLibrary::new(events));
        let waveforms = Arc::new(WaveformsLibrary::new());
        let saver = SaveHandle::new(
            tracks.clone(),
            playlists,
            waveforms,
            prefs,
            Arc::new(LogErrors),
        );
        (saver, tracks)
    }

    #[test]
    fn test_save_now_writes_flagged_collections() {
        let dir = TempDir::new().unwrap();
        let prefs = Arc::new(Preferences::open(dir.path().to_path_buf()).unwrap());
        let (saver, tracks) = handle(prefs.clone());

        let mut track = Track::new(1, PathBuf::from("/m"), "1.mp3".to_string());
        track.name = "One".to_string();
        tracks.add(HashMap::from([(1, track)]));

        saver.save_now(true, true, true);

        assert!(prefs.tracks_file().is_file());
        assert!(prefs.waveforms_file().is_file());
        assert!(prefs.playlists_file().is_file());
    }

    #[test]
    fn test_requests_coalesce_into_flags() {
        let dir = TempDir::new().unwrap();
        let prefs = Arc::new(Preferences::open(dir.path().to_path_buf()).unwrap());
        let (saver, _tracks) = handle(prefs);

        saver.request(true, false, false);
        saver.request(false, true, false);
        saver.request(true, false, true);

        // Whatever the worker has or has not written yet, the pending
        // flags never hold more than one bit per collection.
        let state = saver.shared.state.lock();
        assert!(state.worker_started);
    }
}
