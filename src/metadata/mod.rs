//! Tag reading/writing boundary.
//!
//! Everything the rest of the crate knows about audio metadata goes
//! through here: building a [`Track`] from a file, writing edited fields
//! back (with a backup/restore cycle around the write), and extracting
//! embedded cover art for playlist covers.

use crate::error::{LibraryError, Result};
use crate::model::Track;
use chrono::{DateTime, Utc};
use image::imageops::FilterType;
use image::ImageFormat;
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::PictureType;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

/// Edge length of the square playlist cover thumbnail.
pub const COVER_THUMBNAIL_SIZE: u32 = 240;

/// Technical attributes read from the audio stream itself, independent of
/// any descriptive tags.
#[derive(Debug, Clone, Default)]
pub struct AudioProperties {
    pub bit_rate: u32,
    pub total_time: Duration,
    pub encoding: String,
    pub encoder: String,
}

fn metadata_error(path: &Path, err: impl std::fmt::Display) -> LibraryError {
    LibraryError::Metadata {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn write_error(path: &Path, err: impl std::fmt::Display) -> LibraryError {
    LibraryError::TagWrite {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Build a track from an audio file's tags and stream properties.
///
/// The id comes from the caller (the persistent sequence); everything
/// else is derived from the file. A missing title falls back to the file
/// stem.
pub fn read_track(path: &Path, id: u32) -> Result<Track> {
    let file_meta = fs::metadata(path).map_err(|e| metadata_error(path, e))?;
    let tagged = Probe::open(path)
        .map_err(|e| metadata_error(path, e))?
        .read()
        .map_err(|e| metadata_error(path, e))?;

    let folder = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| metadata_error(path, "not a file path"))?;

    let mut track = Track::new(id, folder, file_name);
    track.size = file_meta.len();
    track.last_modified = file_meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let properties = tagged.properties();
    track.total_time = properties.duration();
    track.bit_rate = properties.audio_bitrate().unwrap_or(0);
    track.encoding = format!("{:?}", tagged.file_type());

    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        track.name = tag.title().map(|t| t.into_owned()).unwrap_or_default();
        track.artist = tag.artist().map(|t| t.into_owned()).unwrap_or_default();
        track.album = tag.album().map(|t| t.into_owned()).unwrap_or_default();
        track.genre = tag.genre().map(|t| t.into_owned()).unwrap_or_default();
        track.comments = tag.comment().map(|t| t.into_owned()).unwrap_or_default();
        track.album_artist = tag_string(tag, &ItemKey::AlbumArtist);
        track.label = tag_string(tag, &ItemKey::Label);
        track.encoder = tag_string(tag, &ItemKey::EncoderSoftware);
        track.track_number = tag.track();
        track.disc_number = tag.disk();
        track.year = tag.year();
        track.bpm = tag
            .get_string(&ItemKey::Bpm)
            .and_then(|s| s.trim().parse().ok());
        track.is_compilation = tag
            .get_string(&ItemKey::FlagCompilation)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        track.has_cover = !tag.pictures().is_empty();
    }

    if track.name.is_empty() {
        track.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }

    track.refresh_disk_presence();
    Ok(track)
}

fn tag_string(tag: &Tag, key: &ItemKey) -> String {
    tag.get_string(key).unwrap_or_default().to_string()
}

/// Write a track's descriptive fields back to its file.
///
/// A backup copy is made first; if the tag write fails the original file
/// is restored from it, so a failed write never leaves a half-written
/// file behind.
pub fn write_track(track: &Track) -> Result<()> {
    let path = track.file_path();
    let backup = backup_path(&path);
    fs::copy(&path, &backup).map_err(|e| write_error(&path, e))?;

    let result = write_tag(track, &path);
    if result.is_err() {
        if let Err(restore) = fs::copy(&backup, &path) {
            log::error!("Could not restore {path:?} from backup: {restore}");
        }
    }
    if let Err(e) = fs::remove_file(&backup) {
        log::warn!("Could not remove backup {backup:?}: {e}");
    }
    result
}

fn backup_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".bak");
    path.with_file_name(name)
}

fn write_tag(track: &Track, path: &Path) -> Result<()> {
    let tagged = Probe::open(path)
        .map_err(|e| write_error(path, e))?
        .read()
        .map_err(|e| write_error(path, e))?;

    let mut tag = match tagged.primary_tag() {
        Some(existing) => existing.clone(),
        None => Tag::new(tagged.primary_tag_type()),
    };

    tag.set_title(track.name.clone());
    tag.set_artist(track.artist.clone());
    tag.set_album(track.album.clone());
    tag.set_genre(track.genre.clone());
    tag.set_comment(track.comments.clone());
    tag.insert_text(ItemKey::AlbumArtist, track.album_artist.clone());
    tag.insert_text(ItemKey::Label, track.label.clone());
    if let Some(n) = track.track_number {
        tag.set_track(n);
    }
    if let Some(n) = track.disc_number {
        tag.set_disk(n);
    }
    if let Some(y) = track.year {
        tag.set_year(y);
    }
    if let Some(bpm) = track.bpm {
        tag.insert_text(ItemKey::Bpm, format!("{bpm}"));
    }
    tag.insert_text(
        ItemKey::FlagCompilation,
        if track.is_compilation { "1" } else { "0" }.to_string(),
    );

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|e| write_error(path, e))
}

/// Technical attributes only, for imports that trust another source for
/// the descriptive fields.
pub fn read_audio_properties(path: &Path) -> Result<AudioProperties> {
    let tagged = Probe::open(path)
        .map_err(|e| metadata_error(path, e))?
        .read()
        .map_err(|e| metadata_error(path, e))?;
    let properties = tagged.properties();
    let encoder = tagged
        .primary_tag()
        .or_else(|| tagged.first_tag())
        .map(|tag| tag_string(tag, &ItemKey::EncoderSoftware))
        .unwrap_or_default();

    Ok(AudioProperties {
        bit_rate: properties.audio_bitrate().unwrap_or(0),
        total_time: properties.duration(),
        encoding: format!("{:?}", tagged.file_type()),
        encoder,
    })
}

/// Whether the file carries embedded cover art. Unreadable files count
/// as having none.
pub fn has_cover(path: &Path) -> bool {
    match Probe::open(path).and_then(|p| p.read()) {
        Ok(tagged) => tagged.tags().iter().any(|tag| !tag.pictures().is_empty()),
        Err(_) => false,
    }
}

/// Raw embedded cover art, preferring the front cover.
pub fn cover_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
    let tagged = Probe::open(path)
        .map_err(|e| metadata_error(path, e))?
        .read()
        .map_err(|e| metadata_error(path, e))?;

    for tag in tagged.tags() {
        if let Some(picture) = tag
            .pictures()
            .iter()
            .find(|p| p.pic_type() == PictureType::CoverFront)
            .or_else(|| tag.pictures().first())
        {
            return Ok(Some(picture.data().to_vec()));
        }
    }
    Ok(None)
}

/// Embedded cover art downscaled to a square JPEG thumbnail, for
/// playlist covers. `None` when the file has no art.
pub fn cover_thumbnail(path: &Path) -> Result<Option<Vec<u8>>> {
    let Some(bytes) = cover_bytes(path)? else {
        return Ok(None);
    };
    let decoded = image::load_from_memory(&bytes).map_err(|e| metadata_error(path, e))?;
    let resized = decoded.resize_exact(
        COVER_THUMBNAIL_SIZE,
        COVER_THUMBNAIL_SIZE,
        FilterType::Lanczos3,
    );
    let mut buffer = Cursor::new(Vec::new());
    resized
        .write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| metadata_error(path, e))?;
    Ok(Some(buffer.into_inner()))
}

/// Parse a bit-rate string. A `~` prefix marks variable bit rate and is
/// stripped before the numeric parse.
pub fn parse_bit_rate(raw: &str) -> Option<(u32, bool)> {
    let trimmed = raw.trim();
    let (digits, variable) = match trimmed.strip_prefix('~') {
        Some(rest) => (rest.trim_start(), true),
        None => (trimmed, false),
    };
    digits.parse().ok().map(|rate| (rate, variable))
}
