//! Artist index derived from track fields.
//!
//! The index is a multimap artist name → track ids, rebuilt incrementally
//! as tracks are added, removed or edited. Artist names are extracted from
//! the artist and album-artist fields and from remix/feature credits in
//! the track title, split on the usual collaboration separators, then
//! title-cased so that case variants collapse into one entry.

use crate::events::{EventBus, LibraryEvent};
use crate::model::Track;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Words that separate collaborating artists inside a single field.
/// Matched case-insensitively, with an optional trailing period.
const SEPARATOR_WORDS: [&str; 6] = ["vs", "versus", "feat", "ft", "featuring", "with"];

/// All artist names a track involves, deduplicated and title-cased.
pub fn artists_involved(track: &Track) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let credited = split_artist_field(&track.artist)
        .into_iter()
        .chain(split_artist_field(&track.album_artist))
        .chain(artists_in_name(&track.name));
    for raw in credited {
        let cased = title_case(&raw);
        if !cased.is_empty() {
            names.insert(cased);
        }
    }
    names
}

/// Split one artist-like field on `,`, `&` and the separator words.
fn split_artist_field(field: &str) -> Vec<String> {
    let mut artists = Vec::new();
    for chunk in field.split([',', '&']) {
        let mut current: Vec<&str> = Vec::new();
        for word in chunk.split_whitespace() {
            if is_separator_word(word) {
                push_joined(&mut artists, &current);
                current.clear();
            } else {
                current.push(word);
            }
        }
        push_joined(&mut artists, &current);
    }
    artists
}

fn is_separator_word(word: &str) -> bool {
    let lowered = word.to_lowercase();
    let bare = lowered.trim_end_matches('.');
    SEPARATOR_WORDS.contains(&bare)
}

fn push_joined(out: &mut Vec<String>, words: &[&str]) {
    if !words.is_empty() {
        out.push(words.join(" "));
    }
}

/// Extract credited artists from a track title: `(X & Y Remix)` yields the
/// remixers, `(feat Z)` yields the featured artist.
fn artists_in_name(name: &str) -> Vec<String> {
    let mut found = Vec::new();
    for group in parenthesized_groups(name) {
        let group = group.trim();
        if let Some(credited) = strip_remix_suffix(group) {
            found.extend(split_artist_field(credited));
        } else if let Some(first) = group.split_whitespace().next() {
            if is_separator_word(first) {
                let rest = group[first.len()..].trim();
                found.extend(split_artist_field(rest));
            }
        }
    }
    found
}

fn parenthesized_groups(name: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut rest = name;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        match after.find(')') {
            Some(close) => {
                groups.push(&after[..close]);
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    groups
}

fn strip_remix_suffix(group: &str) -> Option<&str> {
    let cut = group.len().checked_sub("remix".len())?;
    if group.is_char_boundary(cut) && group[cut..].eq_ignore_ascii_case("remix") {
        Some(group[..cut].trim_end())
    } else {
        None
    }
}

/// Uppercase the first letter of every word, lowercase the rest, and
/// collapse runs of whitespace.
pub(crate) fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Thread-safe artist name → track ids index.
pub struct ArtistsLibrary {
    index: Mutex<HashMap<String, HashSet<u32>>>,
    events: Arc<EventBus>,
}

impl ArtistsLibrary {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Index a track under every artist it involves.
    pub fn add_track(&self, track: &Track) {
        let mut new_names = false;
        {
            let mut index = self.index.lock();
            for artist in artists_involved(track) {
                let ids = index.entry(artist).or_insert_with(|| {
                    new_names = true;
                    HashSet::new()
                });
                ids.insert(track.id);
            }
        }
        if new_names {
            self.events.publish(LibraryEvent::ArtistsChanged);
        }
    }

    /// Drop a track from every artist entry; entries left empty disappear
    /// from the name list.
    pub fn remove_track(&self, track: &Track) {
        let mut names_dropped = false;
        {
            let mut index = self.index.lock();
            for artist in artists_involved(track) {
                if let Some(ids) = index.get_mut(&artist) {
                    ids.remove(&track.id);
                    if ids.is_empty() {
                        index.remove(&artist);
                        names_dropped = true;
                    }
                }
            }
        }
        if names_dropped {
            self.events.publish(LibraryEvent::ArtistsChanged);
        }
    }

    /// Sorted list of all artist names, for the UI.
    pub fn artist_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tracks_of(&self, artist: &str) -> HashSet<u32> {
        self.index
            .lock()
            .get(&title_case(artist))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, artist: &str) -> bool {
        self.index.lock().contains_key(&title_case(artist))
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }

    pub fn clear(&self) {
        self.index.lock().clear();
        self.events.publish(LibraryEvent::ArtistsChanged);
    }
}
