use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single music track and its metadata.
///
/// The id is assigned once from the persistent sequence counter and never
/// changes for the process lifetime. Equality deliberately ignores it:
/// two tracks parsed from the same file content at different times compare
/// equal even though their ids differ. Descriptive fields compare
/// case-insensitively; the file location compares exactly.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique, stable identifier for this track.
    pub id: u32,

    /// Folder the audio file lives in.
    pub file_folder: PathBuf,

    /// File name within the folder.
    pub file_name: String,

    /// Track title.
    pub name: String,

    pub artist: String,
    pub album: String,
    pub genre: String,
    pub comments: String,
    pub album_artist: String,

    /// Record label.
    pub label: String,

    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<u32>,
    pub bpm: Option<f32>,

    /// File size in bytes.
    pub size: u64,

    /// Bit rate in kbps.
    pub bit_rate: u32,
    pub variable_bit_rate: bool,

    pub total_time: Duration,

    /// Container/codec description, e.g. "Mpeg".
    pub encoding: String,

    /// Encoder software recorded in the tags, if any.
    pub encoder: String,

    pub play_count: u32,
    pub is_compilation: bool,

    /// Whether the file carries embedded cover art. Recomputed from the
    /// file on load, never trusted from disk.
    pub has_cover: bool,

    pub date_added: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,

    /// Whether the file currently exists on disk and is playable.
    /// Recomputed on load.
    pub in_disk: bool,
}

impl Track {
    pub fn new(id: u32, file_folder: PathBuf, file_name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            file_folder,
            file_name,
            name: String::new(),
            artist: String::new(),
            album: String::new(),
            genre: String::new(),
            comments: String::new(),
            album_artist: String::new(),
            label: String::new(),
            track_number: None,
            disc_number: None,
            year: None,
            bpm: None,
            size: 0,
            bit_rate: 0,
            variable_bit_rate: false,
            total_time: Duration::ZERO,
            encoding: String::new(),
            encoder: String::new(),
            play_count: 0,
            is_compilation: false,
            has_cover: false,
            date_added: now,
            last_modified: now,
            in_disk: false,
        }
    }

    /// Full path to the audio file.
    pub fn file_path(&self) -> PathBuf {
        self.file_folder.join(&self.file_name)
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    pub fn playable(&self) -> bool {
        self.in_disk
    }

    /// Re-derive the on-disk status from the filesystem.
    pub fn refresh_disk_presence(&mut self) {
        self.in_disk = self.file_path().is_file();
    }

    pub fn increment_play_count(&mut self) {
        self.play_count += 1;
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.file_folder == other.file_folder
            && self.file_name == other.file_name
            && self.name.eq_ignore_ascii_case(&other.name)
            && self.artist.eq_ignore_ascii_case(&other.artist)
            && self.album.eq_ignore_ascii_case(&other.album)
            && self.genre.eq_ignore_ascii_case(&other.genre)
            && self.comments.eq_ignore_ascii_case(&other.comments)
            && self.album_artist.eq_ignore_ascii_case(&other.album_artist)
            && self.label.eq_ignore_ascii_case(&other.label)
            && self.track_number == other.track_number
            && self.disc_number == other.disc_number
            && self.year == other.year
            && self.bpm == other.bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track(id: u32) -> Track {
        let mut track = Track::new(id, PathBuf::from("/music"), "song.mp3".to_string());
        track.name = "Song".to_string();
        track.artist = "Artist".to_string();
        track.album = "Album".to_string();
        track
    }

    #[test]
    fn test_equality_ignores_id() {
        let a = sample_track(1);
        let b = sample_track(2);
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_is_case_insensitive() {
        let a = sample_track(1);
        let mut b = sample_track(2);
        b.name = "SONG".to_string();
        b.artist = "ARTIST".to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_respects_file_location() {
        let a = sample_track(1);
        let mut b = sample_track(1);
        b.file_name = "other.mp3".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_path_joins_folder_and_name() {
        let track = sample_track(1);
        assert_eq!(track.file_path(), PathBuf::from("/music/song.mp3"));
        assert_eq!(track.extension().as_deref(), Some("mp3"));
    }

    #[test]
    fn test_play_count_increments() {
        let mut track = sample_track(1);
        track.increment_play_count();
        track.increment_play_count();
        assert_eq!(track.play_count, 2);
    }
}
