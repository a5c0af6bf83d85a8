//! Background task coordination.
//!
//! [`TaskDemon`] gates import concurrency (at most one import at a
//! time), owns the waveform worker's queue and the debounced save
//! worker. It is constructed once at startup and passed by reference;
//! there is no global instance.

pub mod import;
pub mod save;
pub mod waveform;

pub use import::{ImportHandle, ImportOutcome, ImportSource};
pub use save::SaveHandle;
pub use waveform::WaveformHandle;

use crate::config::Preferences;
use crate::error::{LibraryError, Result};
use crate::events::{ErrorSink, ProgressSink};
use crate::library::MusicLibrary;
use crate::metadata;
use crate::model::Track;
use crate::tasks::import::ImportTask;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct TaskDemon {
    library: Arc<MusicLibrary>,
    prefs: Arc<Preferences>,
    progress: Arc<dyn ProgressSink>,
    errors: Arc<dyn ErrorSink>,
    saver: SaveHandle,
    waveform_queue: WaveformHandle,
    importing: Arc<AtomicBool>,
}

impl TaskDemon {
    pub fn new(
        library: Arc<MusicLibrary>,
        prefs: Arc<Preferences>,
        progress: Arc<dyn ProgressSink>,
        errors: Arc<dyn ErrorSink>,
        saver: SaveHandle,
    ) -> Self {
        let waveform_queue = waveform::spawn(
            library.waveforms.clone(),
            saver.clone(),
            library.events().clone(),
            errors.clone(),
        );
        Self {
            library,
            prefs,
            progress,
            errors,
            saver,
            waveform_queue,
            importing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn import_folder(&self, root: PathBuf) -> Result<ImportHandle> {
        self.start_import(ImportSource::Folder(root))
    }

    pub fn import_itunes(&self, xml: PathBuf) -> Result<ImportHandle> {
        self.start_import(ImportSource::ItunesXml(xml))
    }

    /// Start an import, failing fast when one is already running. Two
    /// importers racing on the id sequence and the shared collections
    /// are never allowed.
    fn start_import(&self, source: ImportSource) -> Result<ImportHandle> {
        if self
            .importing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LibraryError::AlreadyImporting);
        }

        let importing = self.importing.clone();
        let spawned = ImportTask::spawn(
            source,
            self.library.clone(),
            self.prefs.clone(),
            self.progress.clone(),
            self.errors.clone(),
            self.saver.clone(),
            move || importing.store(false, Ordering::SeqCst),
        );
        match spawned {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.importing.store(false, Ordering::SeqCst);
                Err(LibraryError::Io(e))
            }
        }
    }

    pub fn is_importing(&self) -> bool {
        self.importing.load(Ordering::SeqCst)
    }

    /// Queue waveform extraction for a track, typically on selection or
    /// playback. Already-cached waveforms are not recomputed.
    pub fn analyze_waveform(&self, track_id: u32) -> Result<()> {
        let track = self
            .library
            .tracks
            .get(track_id)
            .ok_or(LibraryError::UnknownTrack(track_id))?;
        if self.library.waveforms.contains(track_id) {
            return Ok(());
        }
        if !self.waveform_queue.enqueue(track_id, track.file_path()) {
            self.errors
                .report("Waveform worker is not running", None, &[]);
        }
        Ok(())
    }

    /// Apply an edit to a track, reindex it, and write the new tags back
    /// to the file. A failed tag write restores the file from the backup
    /// made before the write and is reported; the in-memory edit stands.
    pub fn edit_track(&self, id: u32, f: impl FnOnce(&mut Track)) -> Result<()> {
        if !self.library.update_track(id, f) {
            return Err(LibraryError::UnknownTrack(id));
        }
        let track = self
            .library
            .tracks
            .get(id)
            .ok_or(LibraryError::UnknownTrack(id))?;
        if track.in_disk {
            if let Err(e) = metadata::write_track(&track) {
                self.errors
                    .report("Could not write the track's tags", Some(&e.to_string()), &[]);
                return Err(e);
            }
        }
        Ok(())
    }

    pub fn request_save(&self, tracks: bool, waveforms: bool, playlists: bool) {
        self.saver.request(tracks, waveforms, playlists);
    }

    pub fn saver(&self) -> &SaveHandle {
        &self.saver
    }
}
