//! The import task: scan → confirm → parse → merge → persist.
//!
//! Runs on its own thread under the task coordinator. Cancellation is
//! cooperative: the flag is polled between pipeline stages and between
//! top-level items inside the parallel parse, never mid-item. A
//! cancelled import discards everything it accumulated; nothing is
//! partially committed to the library.

use crate::config::Preferences;
use crate::events::{ErrorSink, ImportStage, LibraryEvent, ProgressSink};
use crate::library::MusicLibrary;
use crate::parse::files;
use crate::parse::itunes;
use crate::parse::ProgressCounter;
use crate::tasks::save::SaveHandle;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

#[derive(Debug, Clone)]
pub enum ImportSource {
    Folder(PathBuf),
    ItunesXml(PathBuf),
}

/// Final state of an import.
#[derive(Debug)]
pub struct ImportOutcome {
    pub stage: ImportStage,
    pub imported: usize,
    pub failures: Vec<String>,
    pub not_found: Vec<String>,
}

impl ImportOutcome {
    fn cancelled() -> Self {
        Self {
            stage: ImportStage::Cancelled,
            imported: 0,
            failures: Vec::new(),
            not_found: Vec::new(),
        }
    }

    fn aborted(message: String) -> Self {
        Self {
            failures: vec![message],
            ..Self::cancelled()
        }
    }
}

/// Control handle for a running import.
pub struct ImportHandle {
    scanned_rx: Receiver<usize>,
    confirm_tx: Sender<bool>,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<ImportOutcome>,
}

impl ImportHandle {
    /// Number of items the scan found. Blocks until scanning completes;
    /// `None` means the task aborted before reaching confirmation.
    pub fn scanned(&self) -> Option<usize> {
        self.scanned_rx.recv().ok()
    }

    /// Answer the confirmation the task is waiting for.
    pub fn confirm(&self, proceed: bool) {
        let _ = self.confirm_tx.send(proceed);
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        // Unblock the task if it is sitting at the confirmation gate.
        let _ = self.confirm_tx.send(false);
    }

    /// Wait for the task to finish.
    pub fn wait(self) -> ImportOutcome {
        self.join
            .join()
            .unwrap_or_else(|_| ImportOutcome::aborted("import worker panicked".to_string()))
    }
}

pub(crate) struct ImportTask {
    source: ImportSource,
    library: Arc<MusicLibrary>,
    prefs: Arc<Preferences>,
    progress: Arc<dyn ProgressSink>,
    errors: Arc<dyn ErrorSink>,
    saver: SaveHandle,
    cancel: Arc<AtomicBool>,
    confirm_rx: Receiver<bool>,
    scanned_tx: Sender<usize>,
}

impl ImportTask {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        source: ImportSource,
        library: Arc<MusicLibrary>,
        prefs: Arc<Preferences>,
        progress: Arc<dyn ProgressSink>,
        errors: Arc<dyn ErrorSink>,
        saver: SaveHandle,
        on_finish: impl FnOnce() + Send + 'static,
    ) -> std::io::Result<ImportHandle> {
        let (confirm_tx, confirm_rx) = std::sync::mpsc::channel();
        let (scanned_tx, scanned_rx) = std::sync::mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let task = ImportTask {
            source,
            library,
            prefs,
            progress,
            errors,
            saver,
            cancel: cancel.clone(),
            confirm_rx,
            scanned_tx,
        };

        let join = std::thread::Builder::new()
            .name("import-worker".to_string())
            .spawn(move || {
                let outcome = task.run();
                on_finish();
                outcome
            })?;

        Ok(ImportHandle {
            scanned_rx,
            confirm_tx,
            cancel,
            join,
        })
    }

    fn run(&self) -> ImportOutcome {
        let source = self.source.clone();
        match source {
            ImportSource::Folder(root) => self.run_folder(&root),
            ImportSource::ItunesXml(xml) => self.run_itunes(&xml),
        }
    }

    fn stage(&self, stage: ImportStage) {
        log::info!("Import stage: {stage:?}");
        self.library
            .events()
            .publish(LibraryEvent::ImportStage(stage));
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Block at the confirmation gate until the user answers.
    fn confirmed(&self, found: usize) -> bool {
        let _ = self.scanned_tx.send(found);
        self.stage(ImportStage::AwaitingConfirmation);
        matches!(self.confirm_rx.recv(), Ok(true)) && !self.cancelled()
    }

    fn run_folder(&self, root: &Path) -> ImportOutcome {
        self.stage(ImportStage::Scanning);
        self.progress
            .progress(0.0, &format!("Scanning {}", root.display()));
        let paths = files::scan_folder(root, &self.prefs.import_filter());
        log::info!("Found {} audio files under {}", paths.len(), root.display());

        if !self.confirmed(paths.len()) {
            return self.cancel_outcome();
        }

        self.stage(ImportStage::Parsing);
        let counter = ProgressCounter::new(paths.len(), &*self.progress);
        let result = files::parse_audio_files(paths, &self.prefs, &self.cancel, &counter);
        if self.cancelled() {
            return self.cancel_outcome();
        }

        self.stage(ImportStage::Merging);
        let imported = result.tracks.len();
        self.library.add_tracks(result.tracks);

        self.stage(ImportStage::Persisting);
        self.saver.request(true, false, false);

        self.finish(imported, result.errors, Vec::new())
    }

    fn run_itunes(&self, xml: &Path) -> ImportOutcome {
        self.stage(ImportStage::Scanning);
        self.progress
            .progress(0.0, &format!("Reading {}", xml.display()));
        let (track_records, playlist_records) = match itunes::read_itunes_library(xml) {
            Ok(records) => records,
            Err(e) => {
                self.errors
                    .report("Could not read the iTunes library", Some(&e.to_string()), &[]);
                self.stage(ImportStage::Cancelled);
                return ImportOutcome::aborted(e.to_string());
            }
        };
        log::info!(
            "iTunes library holds {} tracks, {} playlists",
            track_records.len(),
            playlist_records.len()
        );

        if !self.confirmed(track_records.len()) {
            return self.cancel_outcome();
        }

        self.stage(ImportStage::Parsing);
        let counter = ProgressCounter::new(track_records.len(), &*self.progress);
        let tracks = itunes::parse_itunes_tracks(track_records, &self.prefs, &self.cancel, &counter);
        if self.cancelled() {
            return self.cancel_outcome();
        }

        // Playlist membership resolves against the completed id map only
        // after every track finished parsing.
        let (playlists, playlist_errors) =
            itunes::parse_itunes_playlists(playlist_records, &tracks.id_map, &self.cancel);
        if self.cancelled() {
            return self.cancel_outcome();
        }

        self.stage(ImportStage::Merging);
        let imported = tracks.tracks.len();
        let mut failures = tracks.errors;
        failures.extend(playlist_errors);
        self.library.add_tracks(tracks.tracks);
        for playlist in playlists {
            if let Err(e) = self.library.add_playlist(playlist) {
                log::warn!("Skipping imported playlist: {e}");
                failures.push(e.to_string());
            }
        }

        self.stage(ImportStage::Persisting);
        self.saver.request(true, false, true);

        self.finish(imported, failures, tracks.not_found)
    }

    fn finish(
        &self,
        imported: usize,
        failures: Vec<String>,
        not_found: Vec<String>,
    ) -> ImportOutcome {
        // Batch failures surface once, as an itemized list.
        if !failures.is_empty() {
            self.errors
                .report("Some items could not be imported", None, &failures);
        }
        if !not_found.is_empty() {
            self.errors
                .report("Some referenced files were not found", None, &not_found);
        }
        self.progress
            .progress(1.0, &format!("Imported {imported} tracks"));
        self.stage(ImportStage::Succeeded);
        ImportOutcome {
            stage: ImportStage::Succeeded,
            imported,
            failures,
            not_found,
        }
    }

    fn cancel_outcome(&self) -> ImportOutcome {
        log::info!("Import cancelled, discarding partial results");
        self.stage(ImportStage::Cancelled);
        ImportOutcome::cancelled()
    }
}
