//! Runtime preferences: application folder, import filter, track id
//! sequence and iTunes import policy.
//!
//! The application folder is mutable at runtime; everything that derives a
//! file path from it (the save worker in particular) must re-resolve
//! through the accessor methods instead of caching paths.

use crate::error::{LibraryError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const PREFERENCES_FILE: &str = "preferences.json";
pub const TRACKS_FILE: &str = "tracks.json";
pub const PLAYLISTS_FILE: &str = "playlists.json";
pub const WAVEFORMS_FILE: &str = "waveforms.json";

/// How iTunes library records are converted into tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ItunesPolicy {
    /// Treat the XML purely as a discovery source of file paths and
    /// re-derive every field from the audio file's own metadata.
    #[default]
    ReadFileMetadata,
    /// Trust the values recorded in the XML, consulting the audio file
    /// only for bit rate and encoder information.
    TrustItunes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrefState {
    application_folder: PathBuf,
    import_filter: Vec<String>,
    itunes_policy: ItunesPolicy,
    track_sequence: u32,
}

impl PrefState {
    fn with_folder(folder: PathBuf) -> Self {
        Self {
            application_folder: folder,
            import_filter: default_import_filter(),
            itunes_policy: ItunesPolicy::default(),
            track_sequence: 0,
        }
    }
}

fn default_import_filter() -> Vec<String> {
    ["mp3", "m4a", "wav", "flac"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Shared, thread-safe application preferences.
pub struct Preferences {
    state: RwLock<PrefState>,
}

impl Preferences {
    /// Open preferences rooted at `folder`, loading an existing
    /// preferences file if one is present.
    pub fn open(folder: PathBuf) -> Result<Self> {
        fs::create_dir_all(&folder)?;

        let file = folder.join(PREFERENCES_FILE);
        let state = if file.exists() {
            let raw = fs::read_to_string(&file)?;
            match serde_json::from_str::<PrefState>(&raw) {
                Ok(mut state) => {
                    // The folder the user opened wins over the stored one.
                    state.application_folder = folder;
                    state
                }
                Err(e) => {
                    log::warn!("Unreadable preferences file, starting fresh: {e}");
                    PrefState::with_folder(folder)
                }
            }
        } else {
            PrefState::with_folder(folder)
        };

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub fn application_folder(&self) -> PathBuf {
        self.state.read().application_folder.clone()
    }

    /// Re-point the application folder. Subsequent saves resolve against
    /// the new location.
    pub fn set_application_folder(&self, folder: PathBuf) -> Result<()> {
        fs::create_dir_all(&folder)?;
        self.state.write().application_folder = folder;
        self.save()
    }

    pub fn import_filter(&self) -> Vec<String> {
        self.state.read().import_filter.clone()
    }

    pub fn set_import_filter(&self, extensions: Vec<String>) {
        self.state.write().import_filter = extensions;
    }

    pub fn itunes_policy(&self) -> ItunesPolicy {
        self.state.read().itunes_policy
    }

    pub fn set_itunes_policy(&self, policy: ItunesPolicy) {
        self.state.write().itunes_policy = policy;
    }

    /// Next value of the persistent track id sequence.
    ///
    /// The updated sequence is written out with the next preferences save,
    /// so ids stay unique across process restarts as long as the library
    /// is saved after an import.
    pub fn next_track_id(&self) -> u32 {
        let mut state = self.state.write();
        state.track_sequence += 1;
        state.track_sequence
    }

    pub fn tracks_file(&self) -> PathBuf {
        self.application_folder().join(TRACKS_FILE)
    }

    pub fn playlists_file(&self) -> PathBuf {
        self.application_folder().join(PLAYLISTS_FILE)
    }

    pub fn waveforms_file(&self) -> PathBuf {
        self.application_folder().join(WAVEFORMS_FILE)
    }

    pub fn save(&self) -> Result<()> {
        let (file, raw) = {
            let state = self.state.read();
            let file = state.application_folder.join(PREFERENCES_FILE);
            let raw = serde_json::to_string_pretty(&*state)
                .map_err(|e| LibraryError::persistence(PREFERENCES_FILE, e))?;
            (file, raw)
        };
        fs::write(&file, raw)
            .map_err(|e| LibraryError::persistence(PREFERENCES_FILE, e))?;
        Ok(())
    }
}
