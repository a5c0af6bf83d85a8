//! iTunes library (plist XML) import.
//!
//! The library file is parsed as a plist document with a streaming XML
//! reader; track and playlist records are then converted into the native
//! model with fork/join fan-out. Playlist conversion runs strictly after
//! track conversion, against the completed iTunes-id → track-id map.

use crate::config::{ItunesPolicy, Preferences};
use crate::error::{LibraryError, Result};
use crate::metadata;
use crate::model::{Playlist, Track};
use crate::parse::{run_parallel, ProgressCounter};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Extensions iTunes records may reference; anything else is skipped.
const ITUNES_EXTENSIONS: [&str; 3] = ["mp3", "m4a", "wav"];

/// Largest batch a single fork/join leaf converts serially.
const TRACKS_PER_BATCH: usize = 250;
const PLAYLISTS_PER_BATCH: usize = 8;

// ---------------------------------------------------------------------
// Plist document model

#[derive(Debug, Clone, PartialEq)]
enum PlistValue {
    Dict(Vec<(String, PlistValue)>),
    Array(Vec<PlistValue>),
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Date(String),
    Data(String),
}

impl PlistValue {
    fn get(&self, key: &str) -> Option<&PlistValue> {
        match self {
            PlistValue::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) | PlistValue::Date(s) | PlistValue::Data(s) => Some(s),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            PlistValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    fn as_u32(&self) -> Option<u32> {
        self.as_i64().and_then(|n| u32::try_from(n).ok())
    }

    fn as_u64(&self) -> Option<u64> {
        self.as_i64().and_then(|n| u64::try_from(n).ok())
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            PlistValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

enum Container {
    Dict {
        entries: Vec<(String, PlistValue)>,
        pending_key: Option<String>,
    },
    Array(Vec<PlistValue>),
}

fn attach(stack: &mut Vec<Container>, root: &mut Option<PlistValue>, value: PlistValue) {
    match stack.last_mut() {
        Some(Container::Dict {
            entries,
            pending_key,
        }) => {
            if let Some(key) = pending_key.take() {
                entries.push((key, value));
            } else {
                log::warn!("Plist value without a preceding key, dropped");
            }
        }
        Some(Container::Array(values)) => values.push(value),
        None => *root = Some(value),
    }
}

/// Parse the whole plist document into a value tree.
fn parse_plist(path: &Path) -> Result<PlistValue> {
    let file = File::open(path)?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Container> = Vec::new();
    let mut root: Option<PlistValue> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"dict" => stack.push(Container::Dict {
                    entries: Vec::new(),
                    pending_key: None,
                }),
                b"array" => stack.push(Container::Array(Vec::new())),
                _ => text.clear(),
            },

            Ok(Event::Text(e)) => {
                text.push_str(&e.unescape().unwrap_or_default());
            }

            Ok(Event::End(e)) => match e.name().as_ref() {
                b"key" => {
                    if let Some(Container::Dict { pending_key, .. }) = stack.last_mut() {
                        *pending_key = Some(mem::take(&mut text));
                    }
                }
                b"string" => attach(&mut stack, &mut root, PlistValue::String(mem::take(&mut text))),
                b"integer" => {
                    let n = text.trim().parse().unwrap_or_default();
                    text.clear();
                    attach(&mut stack, &mut root, PlistValue::Integer(n));
                }
                b"real" => {
                    let n = text.trim().parse().unwrap_or_default();
                    text.clear();
                    attach(&mut stack, &mut root, PlistValue::Real(n));
                }
                b"date" => attach(&mut stack, &mut root, PlistValue::Date(mem::take(&mut text))),
                b"data" => attach(&mut stack, &mut root, PlistValue::Data(mem::take(&mut text))),
                b"dict" | b"array" => {
                    let value = match stack.pop() {
                        Some(Container::Dict { entries, .. }) => PlistValue::Dict(entries),
                        Some(Container::Array(values)) => PlistValue::Array(values),
                        None => break,
                    };
                    attach(&mut stack, &mut root, value);
                }
                _ => {}
            },

            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"true" => attach(&mut stack, &mut root, PlistValue::Boolean(true)),
                b"false" => attach(&mut stack, &mut root, PlistValue::Boolean(false)),
                b"dict" => attach(&mut stack, &mut root, PlistValue::Dict(Vec::new())),
                b"array" => attach(&mut stack, &mut root, PlistValue::Array(Vec::new())),
                b"string" | b"date" | b"data" => {
                    attach(&mut stack, &mut root, PlistValue::String(String::new()))
                }
                _ => {}
            },

            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(LibraryError::InvalidItunesLibrary(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| LibraryError::InvalidItunesLibrary("empty document".to_string()))
}

// ---------------------------------------------------------------------
// Record extraction

/// One track record from the iTunes library.
#[derive(Debug, Clone)]
pub struct ItunesTrack {
    pub id: i64,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub comments: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub play_count: Option<u32>,
    pub size: Option<u64>,
    pub total_time_millis: Option<u64>,
    /// Bit rate as recorded in the XML; a `~` prefix marks VBR.
    pub bit_rate: Option<String>,
    pub location: Option<String>,
    pub track_type: Option<String>,
    pub date_added: Option<String>,
}

impl ItunesTrack {
    fn from_dict(dict: &PlistValue) -> Option<Self> {
        let id = dict.get("Track ID")?.as_i64()?;
        let text = |key: &str| dict.get(key).and_then(|v| v.as_str()).map(str::to_string);
        Some(Self {
            id,
            name: text("Name"),
            artist: text("Artist"),
            album: text("Album"),
            album_artist: text("Album Artist"),
            genre: text("Genre"),
            comments: text("Comments"),
            year: dict.get("Year").and_then(|v| v.as_u32()),
            track_number: dict.get("Track Number").and_then(|v| v.as_u32()),
            disc_number: dict.get("Disc Number").and_then(|v| v.as_u32()),
            play_count: dict.get("Play Count").and_then(|v| v.as_u32()),
            size: dict.get("Size").and_then(|v| v.as_u64()),
            total_time_millis: dict.get("Total Time").and_then(|v| v.as_u64()),
            bit_rate: dict.get("Bit Rate").and_then(|v| match v {
                PlistValue::Integer(n) => Some(n.to_string()),
                PlistValue::String(s) => Some(s.clone()),
                _ => None,
            }),
            location: text("Location"),
            track_type: text("Track Type"),
            date_added: text("Date Added"),
        })
    }

    /// Decode the `file://` location into a filesystem path.
    pub fn file_path(&self) -> Option<PathBuf> {
        let location = self.location.as_deref()?;
        let stripped = location
            .strip_prefix("file://localhost")
            .or_else(|| location.strip_prefix("file://"))?;
        let decoded = urlencoding::decode(stripped).ok()?;
        Some(PathBuf::from(decoded.into_owned()))
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("iTunes track {}", self.id),
        }
    }
}

/// One playlist record from the iTunes library.
#[derive(Debug, Clone)]
pub struct ItunesPlaylist {
    pub name: String,
    pub folder: bool,
    pub item_ids: Vec<i64>,
    pub persistent_id: Option<String>,
    pub parent_persistent_id: Option<String>,
}

impl ItunesPlaylist {
    fn from_dict(dict: &PlistValue) -> Option<Self> {
        // The synthetic master playlist and the built-in media-kind
        // playlists are not user playlists.
        if dict.get("Master").and_then(|v| v.as_bool()).unwrap_or(false)
            || dict.get("Distinguished Kind").is_some()
        {
            return None;
        }
        let name = dict.get("Name")?.as_str()?.to_string();
        let item_ids = match dict.get("Playlist Items") {
            Some(PlistValue::Array(items)) => items
                .iter()
                .filter_map(|item| item.get("Track ID").and_then(|v| v.as_i64()))
                .collect(),
            _ => Vec::new(),
        };
        Some(Self {
            name,
            folder: dict.get("Folder").and_then(|v| v.as_bool()).unwrap_or(false),
            item_ids,
            persistent_id: dict
                .get("Playlist Persistent ID")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            parent_persistent_id: dict
                .get("Parent Persistent ID")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

/// Read the track and playlist records from an iTunes library file.
///
/// Fails fast with [`LibraryError::InvalidItunesLibrary`] when the file
/// does not carry the plist signature, before any parsing starts.
pub fn read_itunes_library(path: &Path) -> Result<(Vec<ItunesTrack>, Vec<ItunesPlaylist>)> {
    validate_signature(path)?;

    let root = parse_plist(path)?;
    let tracks = match root.get("Tracks") {
        Some(PlistValue::Dict(entries)) => entries
            .iter()
            .filter_map(|(_, dict)| ItunesTrack::from_dict(dict))
            .collect(),
        _ => {
            return Err(LibraryError::InvalidItunesLibrary(
                "no Tracks dictionary".to_string(),
            ))
        }
    };
    let playlists = match root.get("Playlists") {
        Some(PlistValue::Array(items)) => items
            .iter()
            .filter_map(ItunesPlaylist::from_dict)
            .collect(),
        _ => Vec::new(),
    };
    Ok((tracks, playlists))
}

fn validate_signature(path: &Path) -> Result<()> {
    let mut head = [0u8; 1024];
    let mut file = File::open(path)?;
    let read = file.read(&mut head)?;
    let head = String::from_utf8_lossy(&head[..read]);
    if head.contains("<!DOCTYPE plist") || head.contains("<plist") {
        Ok(())
    } else {
        Err(LibraryError::InvalidItunesLibrary(
            "missing plist header signature".to_string(),
        ))
    }
}

// ---------------------------------------------------------------------
// Record conversion

enum ConvertedItem {
    Track { itunes_id: i64, track: Track },
    NotFound(String),
    Skipped,
}

#[derive(Debug, Default)]
pub struct ItunesParseResult {
    pub tracks: HashMap<u32, Track>,
    /// iTunes track id → produced track id, fed to playlist conversion.
    pub id_map: HashMap<i64, u32>,
    pub not_found: Vec<String>,
    pub errors: Vec<String>,
}

/// Convert iTunes track records into tracks with fork/join fan-out.
pub fn parse_itunes_tracks(
    records: Vec<ItunesTrack>,
    prefs: &Preferences,
    cancel: &AtomicBool,
    progress: &ProgressCounter<'_>,
) -> ItunesParseResult {
    let policy = prefs.itunes_policy();
    let outcome = run_parallel(
        records,
        TRACKS_PER_BATCH,
        cancel,
        &ItunesTrack::label,
        &|record: &ItunesTrack| {
            let item = convert_record(record, policy, prefs)?;
            progress.tick(&format!("Imported {}", record.label()));
            Ok(item)
        },
    );

    let mut result = ItunesParseResult {
        errors: outcome.errors,
        ..Default::default()
    };
    for item in outcome.parsed {
        match item {
            ConvertedItem::Track { itunes_id, track } => {
                result.id_map.insert(itunes_id, track.id);
                result.tracks.insert(track.id, track);
            }
            ConvertedItem::NotFound(location) => result.not_found.push(location),
            ConvertedItem::Skipped => {}
        }
    }
    result
}

fn convert_record(
    record: &ItunesTrack,
    policy: ItunesPolicy,
    prefs: &Preferences,
) -> anyhow::Result<ConvertedItem> {
    // Remote/URL entries have no local file to import.
    if record.track_type.as_deref() == Some("URL") {
        return Ok(ConvertedItem::Skipped);
    }
    let Some(path) = record.file_path() else {
        return Ok(ConvertedItem::Skipped);
    };
    let supported = path
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            ITUNES_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false);
    if !supported {
        return Ok(ConvertedItem::Skipped);
    }
    if !path.is_file() {
        return Ok(ConvertedItem::NotFound(path.display().to_string()));
    }

    let track = match policy {
        ItunesPolicy::ReadFileMetadata => metadata::read_track(&path, prefs.next_track_id())?,
        ItunesPolicy::TrustItunes => trusted_track(record, prefs.next_track_id(), &path),
    };
    Ok(ConvertedItem::Track {
        itunes_id: record.id,
        track,
    })
}

/// Build a track from the XML record, consulting the audio file only for
/// bit rate and encoder information.
fn trusted_track(record: &ItunesTrack, id: u32, path: &Path) -> Track {
    let folder = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut track = Track::new(id, folder, file_name);
    track.name = record.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    track.artist = record.artist.clone().unwrap_or_default();
    track.album = record.album.clone().unwrap_or_default();
    track.album_artist = record.album_artist.clone().unwrap_or_default();
    track.genre = record.genre.clone().unwrap_or_default();
    track.comments = record.comments.clone().unwrap_or_default();
    track.year = record.year;
    track.track_number = record.track_number;
    track.disc_number = record.disc_number;
    track.play_count = record.play_count.unwrap_or(0);
    track.total_time = Duration::from_millis(record.total_time_millis.unwrap_or(0));
    track.size = record
        .size
        .or_else(|| std::fs::metadata(path).ok().map(|m| m.len()))
        .unwrap_or(0);
    if let Some(added) = record
        .date_added
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        track.date_added = added.with_timezone(&Utc);
    }
    if let Ok(meta) = std::fs::metadata(path) {
        if let Ok(modified) = meta.modified() {
            track.last_modified = DateTime::<Utc>::from(modified);
        }
    }

    let recorded = record.bit_rate.as_deref().and_then(metadata::parse_bit_rate);
    if let Some((_, variable)) = recorded {
        track.variable_bit_rate = variable;
    }
    match metadata::read_audio_properties(path) {
        Ok(props) => {
            track.bit_rate = props.bit_rate;
            track.encoder = props.encoder;
            track.encoding = props.encoding;
            if track.bit_rate == 0 {
                if let Some((rate, _)) = recorded {
                    track.bit_rate = rate;
                }
            }
        }
        Err(e) => {
            log::debug!("Falling back to recorded bit rate for {path:?}: {e}");
            if let Some((rate, _)) = recorded {
                track.bit_rate = rate;
            }
        }
    }

    track.has_cover = metadata::has_cover(path);
    track.in_disk = true;
    track
}

// ---------------------------------------------------------------------
// Playlist conversion

/// Convert iTunes playlist records into the playlist forest.
///
/// Runs strictly after track conversion: membership is resolved against
/// the completed iTunes-id → track-id map. Leaves that end up empty
/// (every referenced track skipped or missing) are dropped. Folder
/// nesting is reassembled from the persistent-id parent links.
pub fn parse_itunes_playlists(
    records: Vec<ItunesPlaylist>,
    id_map: &HashMap<i64, u32>,
    cancel: &AtomicBool,
) -> (Vec<Playlist>, Vec<String>) {
    let outcome = run_parallel(
        records,
        PLAYLISTS_PER_BATCH,
        cancel,
        &|record: &ItunesPlaylist| record.name.clone(),
        &|record: &ItunesPlaylist| {
            let playlist = if record.folder {
                Playlist::new_folder(&record.name)
            } else {
                let ids: Vec<u32> = record
                    .item_ids
                    .iter()
                    .filter_map(|itunes_id| id_map.get(itunes_id).copied())
                    .collect();
                let mut playlist = Playlist::new(&record.name);
                playlist.add_tracks(&ids)?;
                playlist
            };
            Ok((
                record.persistent_id.clone(),
                record.parent_persistent_id.clone(),
                playlist,
            ))
        },
    );

    let mut converted = Vec::new();
    for (pid, parent, playlist) in outcome.parsed {
        if !playlist.is_folder && playlist.track_ids().is_empty() {
            log::debug!("Skipping empty imported playlist: {}", playlist.name);
            continue;
        }
        converted.push((pid, parent, playlist));
    }

    (assemble_forest(converted), outcome.errors)
}

type ConvertedPlaylist = (Option<String>, Option<String>, Playlist);

fn assemble_forest(converted: Vec<ConvertedPlaylist>) -> Vec<Playlist> {
    let known: std::collections::HashSet<String> = converted
        .iter()
        .filter(|(_, _, p)| p.is_folder)
        .filter_map(|(pid, _, _)| pid.clone())
        .collect();

    let mut children_of: HashMap<String, Vec<ConvertedPlaylist>> = HashMap::new();
    let mut roots: Vec<ConvertedPlaylist> = Vec::new();
    for (pid, parent, playlist) in converted {
        match parent {
            Some(parent_pid) if known.contains(&parent_pid) => children_of
                .entry(parent_pid)
                .or_default()
                .push((pid, None, playlist)),
            _ => roots.push((pid, None, playlist)),
        }
    }

    let mut forest = Vec::new();
    for (pid, _, playlist) in roots {
        forest.push(attach_children(playlist, pid.as_deref(), &mut children_of));
    }
    // Anything still unattached had a parent link pointing at a playlist
    // that was itself dropped; keep it at the top level.
    let orphans: Vec<ConvertedPlaylist> = children_of.into_values().flatten().collect();
    for (_, _, playlist) in orphans {
        forest.push(playlist);
    }
    forest
}

fn attach_children(
    mut playlist: Playlist,
    pid: Option<&str>,
    children_of: &mut HashMap<String, Vec<ConvertedPlaylist>>,
) -> Playlist {
    if !playlist.is_folder {
        return playlist;
    }
    let Some(pid) = pid else {
        return playlist;
    };
    for (child_pid, _, child) in children_of.remove(pid).unwrap_or_default() {
        let child = attach_children(child, child_pid.as_deref(), children_of);
        if let Err(e) = playlist.add_child(child) {
            log::warn!("Could not attach imported playlist: {e}");
        }
    }
    playlist
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Major Version</key><integer>1</integer>
    <key>Tracks</key>
    <dict>
        <key>1001</key>
        <dict>
            <key>Track ID</key><integer>1001</integer>
            <key>Name</key><string>First Song</string>
            <key>Artist</key><string>Some Artist</string>
            <key>Bit Rate</key><string>~192</string>
            <key>Total Time</key><integer>200000</integer>
            <key>Track Type</key><string>File</string>
            <key>Location</key><string>file://localhost/music/First%20Song.mp3</string>
        </dict>
        <key>1002</key>
        <dict>
            <key>Track ID</key><integer>1002</integer>
            <key>Name</key><string>Streamed</string>
            <key>Track Type</key><string>URL</string>
            <key>Location</key><string>http://example.com/radio</string>
        </dict>
    </dict>
    <key>Playlists</key>
    <array>
        <dict>
            <key>Master</key><true/>
            <key>Name</key><string>Library</string>
        </dict>
        <dict>
            <key>Name</key><string>Favourites</string>
            <key>Playlist Persistent ID</key><string>AAAA</string>
            <key>Parent Persistent ID</key><string>FFFF</string>
            <key>Playlist Items</key>
            <array>
                <dict><key>Track ID</key><integer>1001</integer></dict>
            </array>
        </dict>
        <dict>
            <key>Name</key><string>Crates</string>
            <key>Folder</key><true/>
            <key>Playlist Persistent ID</key><string>FFFF</string>
        </dict>
    </array>
</dict>
</plist>
"#;

    fn write_sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("iTunes Music Library.xml");
        fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn test_reads_tracks_and_playlists() {
        let dir = TempDir::new().unwrap();
        let (tracks, playlists) = read_itunes_library(&write_sample(&dir)).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, 1001);
        assert_eq!(tracks[0].name.as_deref(), Some("First Song"));
        assert_eq!(tracks[0].bit_rate.as_deref(), Some("~192"));
        assert_eq!(
            tracks[0].file_path(),
            Some(PathBuf::from("/music/First Song.mp3"))
        );

        // The master playlist is not a user playlist.
        assert_eq!(playlists.len(), 2);
        assert_eq!(playlists[0].name, "Favourites");
        assert_eq!(playlists[0].item_ids, vec![1001]);
        assert!(playlists[1].folder);
    }

    #[test]
    fn test_missing_signature_fails_before_parsing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.xml");
        fs::write(&path, "<html><body>nope</body></html>").unwrap();

        let err = read_itunes_library(&path).unwrap_err();
        assert!(matches!(err, LibraryError::InvalidItunesLibrary(_)));
    }

    #[test]
    fn test_url_records_are_skipped_and_missing_files_collected() {
        let dir = TempDir::new().unwrap();
        let (records, _) = read_itunes_library(&write_sample(&dir)).unwrap();

        let prefs = Preferences::open(dir.path().join("lib")).unwrap();
        prefs.set_itunes_policy(ItunesPolicy::TrustItunes);
        let cancel = AtomicBool::new(false);
        let sink = crate::events::LogProgress;
        let progress = ProgressCounter::new(records.len(), &sink);
        let result = parse_itunes_tracks(records, &prefs, &cancel, &progress);

        // Track 1001 points at a file that does not exist; 1002 is a URL.
        assert!(result.tracks.is_empty());
        assert!(result.id_map.is_empty());
        assert_eq!(result.not_found.len(), 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_playlist_membership_resolves_through_id_map() {
        let cancel = AtomicBool::new(false);
        let records = vec![
            ItunesPlaylist {
                name: "Favourites".to_string(),
                folder: false,
                item_ids: vec![1001, 1002, 9999],
                persistent_id: Some("AAAA".to_string()),
                parent_persistent_id: Some("FFFF".to_string()),
            },
            ItunesPlaylist {
                name: "Crates".to_string(),
                folder: true,
                item_ids: Vec::new(),
                persistent_id: Some("FFFF".to_string()),
                parent_persistent_id: None,
            },
        ];
        let id_map = HashMap::from([(1001_i64, 7_u32), (1002_i64, 8_u32)]);

        let (forest, errors) = parse_itunes_playlists(records, &id_map, &cancel);

        assert!(errors.is_empty());
        assert_eq!(forest.len(), 1);
        let folder = &forest[0];
        assert_eq!(folder.name, "Crates");
        assert!(folder.is_folder);
        assert_eq!(folder.children().len(), 1);
        assert_eq!(folder.children()[0].track_ids(), &[7, 8]);
    }

    #[test]
    fn test_trusted_conversion_uses_xml_fields_for_dummy_audio() {
        let dir = TempDir::new().unwrap();
        let audio = dir.path().join("song.mp3");
        fs::write(&audio, b"not actually audio").unwrap();

        let record = ItunesTrack {
            id: 5,
            name: Some("Trusted".to_string()),
            artist: Some("Artist".to_string()),
            album: Some("Album".to_string()),
            album_artist: None,
            genre: None,
            comments: None,
            year: Some(2015),
            track_number: Some(3),
            disc_number: None,
            play_count: Some(12),
            size: Some(1234),
            total_time_millis: Some(180_000),
            bit_rate: Some("~256".to_string()),
            location: None,
            track_type: Some("File".to_string()),
            date_added: Some("2016-05-01T12:00:00Z".to_string()),
        };

        let track = trusted_track(&record, 42, &audio);
        assert_eq!(track.id, 42);
        assert_eq!(track.name, "Trusted");
        assert_eq!(track.play_count, 12);
        assert_eq!(track.total_time, Duration::from_millis(180_000));
        // The file is unreadable as audio, so the recorded bit rate wins
        // and the ~ prefix marks it variable.
        assert_eq!(track.bit_rate, 256);
        assert!(track.variable_bit_rate);
        assert!(track.in_disk);
    }
}
