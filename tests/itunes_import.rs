use melodist::config::{ItunesPolicy, Preferences};
use melodist::events::{EventBus, ImportStage, LogErrors, LogProgress};
use melodist::library::{
    AlbumsLibrary, ArtistsLibrary, MusicLibrary, PlaylistsLibrary, TracksLibrary, WaveformsLibrary,
};
use melodist::tasks::{SaveHandle, TaskDemon};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Write an iTunes library referencing files under `music_dir`. Track
/// 101 and 102 exist on disk, 103 is missing, 104 is a remote stream
/// and 105 has an unsupported extension.
fn write_itunes_xml(dir: &Path, music_dir: &Path) -> std::path::PathBuf {
    let loc = |name: &str| {
        format!(
            "file://{}",
            urlencoding::encode(&format!("{}/{name}", music_dir.display()))
                .replace("%2F", "/")
        )
    };
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Major Version</key><integer>1</integer>
    <key>Tracks</key>
    <dict>
        <key>101</key>
        <dict>
            <key>Track ID</key><integer>101</integer>
            <key>Name</key><string>Opening</string>
            <key>Artist</key><string>Adam Beyer</string>
            <key>Album</key><string>Ignition Key</string>
            <key>Total Time</key><integer>421000</integer>
            <key>Bit Rate</key><string>~224</string>
            <key>Play Count</key><integer>7</integer>
            <key>Track Type</key><string>File</string>
            <key>Location</key><string>{loc_one}</string>
        </dict>
        <key>102</key>
        <dict>
            <key>Track ID</key><integer>102</integer>
            <key>Name</key><string>Closing</string>
            <key>Artist</key><string>Ida Engberg</string>
            <key>Total Time</key><integer>360000</integer>
            <key>Bit Rate</key><integer>320</integer>
            <key>Track Type</key><string>File</string>
            <key>Location</key><string>{loc_two}</string>
        </dict>
        <key>103</key>
        <dict>
            <key>Track ID</key><integer>103</integer>
            <key>Name</key><string>Gone</string>
            <key>Track Type</key><string>File</string>
            <key>Location</key><string>{loc_missing}</string>
        </dict>
        <key>104</key>
        <dict>
            <key>Track ID</key><integer>104</integer>
            <key>Name</key><string>Radio</string>
            <key>Track Type</key><string>URL</string>
            <key>Location</key><string>http://example.com/stream</string>
        </dict>
        <key>105</key>
        <dict>
            <key>Track ID</key><integer>105</integer>
            <key>Name</key><string>Lossless</string>
            <key>Track Type</key><string>File</string>
            <key>Location</key><string>{loc_flac}</string>
        </dict>
    </dict>
    <key>Playlists</key>
    <array>
        <dict>
            <key>Master</key><true/>
            <key>Name</key><string>Library</string>
        </dict>
        <dict>
            <key>Name</key><string>Sets</string>
            <key>Folder</key><true/>
            <key>Playlist Persistent ID</key><string>F0F0</string>
        </dict>
        <dict>
            <key>Name</key><string>Warmup</string>
            <key>Playlist Persistent ID</key><string>A1A1</string>
            <key>Parent Persistent ID</key><string>F0F0</string>
            <key>Playlist Items</key>
            <array>
                <dict><key>Track ID</key><integer>101</integer></dict>
                <dict><key>Track ID</key><integer>102</integer></dict>
                <dict><key>Track ID</key><integer>103</integer></dict>
            </array>
        </dict>
    </array>
</dict>
</plist>
"#,
        loc_one = loc("opening.mp3"),
        loc_two = loc("closing.mp3"),
        loc_missing = loc("gone.mp3"),
        loc_flac = loc("lossless.flac"),
    );
    let path = dir.join("iTunes Music Library.xml");
    fs::write(&path, xml).unwrap();
    path
}

struct Fixture {
    _dir: TempDir,
    library: Arc<MusicLibrary>,
    demon: TaskDemon,
}

fn fixture(dir: TempDir, prefs: Arc<Preferences>) -> Fixture {
    let events = Arc::new(EventBus::new());
    let errors = Arc::new(LogErrors);

    let tracks = Arc::new(TracksLibrary::new(events.clone()));
    let artists = Arc::new(ArtistsLibrary::new(events.clone()));
    let albums = Arc::new(AlbumsLibrary::new());
    let waveforms = Arc::new(WaveformsLibrary::new());
    let playlists = Arc::new(PlaylistsLibrary::new(events.clone()));

    let saver = SaveHandle::new(
        tracks.clone(),
        playlists.clone(),
        waveforms.clone(),
        prefs.clone(),
        errors.clone(),
    );
    let library = Arc::new(MusicLibrary::with_collections(
        tracks,
        artists,
        albums,
        waveforms,
        playlists,
        events,
        Arc::new(saver.clone()),
    ));
    let demon = TaskDemon::new(
        library.clone(),
        prefs,
        Arc::new(LogProgress),
        errors,
        saver,
    );

    Fixture {
        _dir: dir,
        library,
        demon,
    }
}

#[test]
fn test_itunes_import_builds_tracks_and_resolves_playlists() {
    let dir = TempDir::new().unwrap();
    let music = dir.path().join("music");
    fs::create_dir_all(&music).unwrap();
    // The files exist but are not decodable audio; the trusted policy
    // takes its fields from the XML and falls back on the recorded bit
    // rates.
    fs::write(music.join("opening.mp3"), b"dummy").unwrap();
    fs::write(music.join("closing.mp3"), b"dummy").unwrap();
    fs::write(music.join("lossless.flac"), b"dummy").unwrap();
    let xml = write_itunes_xml(dir.path(), &music);

    let prefs = Arc::new(Preferences::open(dir.path().join("library")).unwrap());
    prefs.set_itunes_policy(ItunesPolicy::TrustItunes);
    let fx = fixture(dir, prefs);

    let handle = fx.demon.import_itunes(xml).unwrap();
    // Five records were scanned; only two are importable.
    assert_eq!(handle.scanned(), Some(5));
    handle.confirm(true);
    let outcome = handle.wait();

    assert_eq!(outcome.stage, ImportStage::Succeeded);
    assert_eq!(outcome.imported, 2);
    assert_eq!(outcome.not_found.len(), 1);
    assert!(outcome.failures.is_empty());

    // Each successfully parsed record produced exactly one track.
    assert_eq!(fx.library.tracks.len(), 2);
    let showing = fx.library.tracks.showing_tracks();
    let opening = showing.iter().find(|t| t.name == "Opening").unwrap();
    assert_eq!(opening.artist, "Adam Beyer");
    assert_eq!(opening.play_count, 7);
    assert_eq!(opening.bit_rate, 224);
    assert!(opening.variable_bit_rate);
    assert!(opening.in_disk);

    // The playlist resolved its members through the id map built during
    // track parsing: the two imported tracks, the missing one dropped.
    let folder = fx.library.playlists.find("Sets").unwrap();
    assert!(folder.is_folder);
    assert_eq!(folder.children().len(), 1);
    let warmup = &folder.children()[0];
    assert_eq!(warmup.name, "Warmup");
    let members: Vec<String> = warmup
        .track_ids()
        .iter()
        .map(|id| fx.library.tracks.get(*id).unwrap().name)
        .collect();
    assert_eq!(members, vec!["Opening".to_string(), "Closing".to_string()]);
}

#[test]
fn test_a_file_without_plist_signature_aborts_before_confirmation() {
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("library.xml");
    fs::write(&bogus, "<html>not a library</html>").unwrap();

    let prefs = Arc::new(Preferences::open(dir.path().join("library")).unwrap());
    let fx = fixture(dir, prefs);

    let handle = fx.demon.import_itunes(bogus).unwrap();
    // The task never reaches the confirmation gate.
    assert_eq!(handle.scanned(), None);
    let outcome = handle.wait();
    assert_eq!(outcome.stage, ImportStage::Cancelled);
    assert_eq!(outcome.failures.len(), 1);
    assert!(fx.library.tracks.is_empty());
}

#[test]
fn test_declining_the_confirmation_discards_everything() {
    let dir = TempDir::new().unwrap();
    let music = dir.path().join("music");
    fs::create_dir_all(&music).unwrap();
    fs::write(music.join("opening.mp3"), b"dummy").unwrap();
    fs::write(music.join("closing.mp3"), b"dummy").unwrap();
    fs::write(music.join("lossless.flac"), b"dummy").unwrap();
    let xml = write_itunes_xml(dir.path(), &music);

    let prefs = Arc::new(Preferences::open(dir.path().join("library")).unwrap());
    prefs.set_itunes_policy(ItunesPolicy::TrustItunes);
    let fx = fixture(dir, prefs);

    let handle = fx.demon.import_itunes(xml).unwrap();
    assert_eq!(handle.scanned(), Some(5));
    handle.confirm(false);
    let outcome = handle.wait();

    assert_eq!(outcome.stage, ImportStage::Cancelled);
    assert!(fx.library.tracks.is_empty());
    assert!(fx.library.playlists.is_empty());
}
