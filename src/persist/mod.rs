//! JSON persistence for the three library documents: tracks, playlists
//! and waveforms.
//!
//! Each document serializes an explicit whitelist of fields. Derived
//! state (on-disk presence, cover presence) is never written; on load it
//! is recomputed from the filesystem instead of being trusted from disk.
//! The write functions hold the owning collection's lock for the duration
//! of the write so concurrent mutation cannot be serialized mid-document.

use crate::error::{LibraryError, Result};
use crate::library::{PlaylistsLibrary, TracksLibrary, WaveformsLibrary};
use crate::metadata;
use crate::model::{Playlist, Track};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The persisted shape of a track: descriptive and technical fields only.
#[derive(Debug, Serialize, Deserialize)]
struct TrackRecord {
    file_folder: PathBuf,
    file_name: String,
    name: String,
    artist: String,
    album: String,
    genre: String,
    comments: String,
    album_artist: String,
    label: String,
    track_number: Option<u32>,
    disc_number: Option<u32>,
    year: Option<u32>,
    bpm: Option<f32>,
    size: u64,
    bit_rate: u32,
    variable_bit_rate: bool,
    total_time_millis: u64,
    encoding: String,
    encoder: String,
    play_count: u32,
    is_compilation: bool,
    date_added: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl TrackRecord {
    fn from_track(track: &Track) -> Self {
        Self {
            file_folder: track.file_folder.clone(),
            file_name: track.file_name.clone(),
            name: track.name.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            genre: track.genre.clone(),
            comments: track.comments.clone(),
            album_artist: track.album_artist.clone(),
            label: track.label.clone(),
            track_number: track.track_number,
            disc_number: track.disc_number,
            year: track.year,
            bpm: track.bpm,
            size: track.size,
            bit_rate: track.bit_rate,
            variable_bit_rate: track.variable_bit_rate,
            total_time_millis: track.total_time.as_millis() as u64,
            encoding: track.encoding.clone(),
            encoder: track.encoder.clone(),
            play_count: track.play_count,
            is_compilation: track.is_compilation,
            date_added: track.date_added,
            last_modified: track.last_modified,
        }
    }

    fn into_track(self, id: u32) -> Track {
        let mut track = Track::new(id, self.file_folder, self.file_name);
        track.name = self.name;
        track.artist = self.artist;
        track.album = self.album;
        track.genre = self.genre;
        track.comments = self.comments;
        track.album_artist = self.album_artist;
        track.label = self.label;
        track.track_number = self.track_number;
        track.disc_number = self.disc_number;
        track.year = self.year;
        track.bpm = self.bpm;
        track.size = self.size;
        track.bit_rate = self.bit_rate;
        track.variable_bit_rate = self.variable_bit_rate;
        track.total_time = Duration::from_millis(self.total_time_millis);
        track.encoding = self.encoding;
        track.encoder = self.encoder;
        track.play_count = self.play_count;
        track.is_compilation = self.is_compilation;
        track.date_added = self.date_added;
        track.last_modified = self.last_modified;
        track
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let name = file_label(path);
    let file = File::create(path).map_err(|e| LibraryError::persistence(&name, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| LibraryError::persistence(&name, e))?;
    writer.flush().map_err(|e| LibraryError::persistence(&name, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let name = file_label(path);
    let file = File::open(path).map_err(|e| LibraryError::persistence(&name, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map(Some)
        .map_err(|e| LibraryError::persistence(&name, e))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Serialize the canonical track map, holding the tracks lock.
pub fn write_tracks(library: &TracksLibrary, path: &Path) -> Result<()> {
    library.with_all(|tracks| {
        let records: BTreeMap<u32, TrackRecord> = tracks
            .iter()
            .map(|(id, track)| (*id, TrackRecord::from_track(track)))
            .collect();
        write_json(path, &records)
    })
}

/// Load the track map, recomputing on-disk presence and cover presence
/// for every entry.
pub fn load_tracks(path: &Path) -> Result<HashMap<u32, Track>> {
    let Some(records) = read_json::<BTreeMap<u32, TrackRecord>>(path)? else {
        return Ok(HashMap::new());
    };
    let mut tracks = HashMap::with_capacity(records.len());
    for (id, record) in records {
        let mut track = record.into_track(id);
        track.refresh_disk_presence();
        track.has_cover = track.in_disk && metadata::has_cover(&track.file_path());
        tracks.insert(id, track);
    }
    Ok(tracks)
}

/// Serialize the playlist forest, holding the playlists lock.
pub fn write_playlists(library: &PlaylistsLibrary, path: &Path) -> Result<()> {
    library.with_all(|forest| write_json(path, &forest))
}

pub fn load_playlists(path: &Path) -> Result<Vec<Playlist>> {
    Ok(read_json(path)?.unwrap_or_default())
}

/// Serialize the waveform cache, holding the waveforms lock.
pub fn write_waveforms(library: &WaveformsLibrary, path: &Path) -> Result<()> {
    library.with_all(|waveforms| {
        let ordered: BTreeMap<u32, &Vec<f32>> =
            waveforms.iter().map(|(id, wave)| (*id, wave)).collect();
        write_json(path, &ordered)
    })
}

pub fn load_waveforms(path: &Path) -> Result<HashMap<u32, Vec<f32>>> {
    Ok(read_json::<HashMap<u32, Vec<f32>>>(path)?.unwrap_or_default())
}
