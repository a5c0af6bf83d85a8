//! Folder import: scan a directory tree for audio files and parse them
//! into tracks.

use crate::config::Preferences;
use crate::metadata;
use crate::model::Track;
use crate::parse::{run_parallel, ProgressCounter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use walkdir::WalkDir;

/// Largest batch a single fork/join leaf parses serially.
const FILES_PER_BATCH: usize = 250;

#[derive(Debug, Default)]
pub struct FilesParseResult {
    pub tracks: HashMap<u32, Track>,
    pub errors: Vec<String>,
}

/// Collect every file under `root` whose extension passes the import
/// filter.
pub fn scan_folder(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable directory entry: {e}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy();
                    extensions.iter().any(|f| f.eq_ignore_ascii_case(&ext))
                })
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Parse audio files into tracks with fork/join fan-out.
///
/// Unreadable files become error entries and are excluded from the
/// result; they never abort the import.
pub fn parse_audio_files(
    paths: Vec<PathBuf>,
    prefs: &Preferences,
    cancel: &AtomicBool,
    progress: &ProgressCounter<'_>,
) -> FilesParseResult {
    let outcome = run_parallel(
        paths,
        FILES_PER_BATCH,
        cancel,
        &|path: &PathBuf| path.display().to_string(),
        &|path: &PathBuf| {
            let track = metadata::read_track(path, prefs.next_track_id())?;
            progress.tick(&format!("Parsed {}", path.display()));
            Ok(track)
        },
    );

    FilesParseResult {
        tracks: outcome.parsed.into_iter().map(|t| (t.id, t)).collect(),
        errors: outcome.errors,
    }
}
