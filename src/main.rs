use anyhow::Result;
use clap::Parser;
use melodist::config::{ItunesPolicy, Preferences};
use melodist::events::{EventBus, ImportStage, LibraryEvent, LogErrors, LogProgress};
use melodist::library::{
    AlbumsLibrary, ArtistsLibrary, MusicLibrary, PlaylistsLibrary, TracksLibrary, WaveformsLibrary,
};
use melodist::persist;
use melodist::tasks::{ImportHandle, SaveHandle, TaskDemon};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "melodist")]
#[command(about = "Music library manager core: imports, playlists, waveforms", long_about = None)]
struct Args {
    /// Library folder holding the persisted JSON collections
    #[arg(short = 'l', long, default_value = "~/.melodist")]
    library: String,

    /// Import every audio file found under this folder
    #[arg(short = 'i', long)]
    import: Option<PathBuf>,

    /// Import an iTunes Music Library.xml
    #[arg(long)]
    itunes: Option<String>,

    /// Trust the iTunes XML field values instead of re-reading file metadata
    #[arg(long)]
    trust_itunes: bool,

    /// Skip the import confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,

    /// Compute waveform thumbnails for the library after importing
    #[arg(long)]
    waveforms: bool,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let library_dir = PathBuf::from(shellexpand::tilde(&args.library).as_ref());
    let prefs = Arc::new(Preferences::open(library_dir)?);
    if args.trust_itunes {
        prefs.set_itunes_policy(ItunesPolicy::TrustItunes);
    }

    let events = Arc::new(EventBus::new());
    let errors = Arc::new(LogErrors);
    let progress = Arc::new(LogProgress);

    // The collections are shared between the orchestrator and the save
    // worker, so they are built first and handed to both.
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
        events.clone(),
        Arc::new(saver.clone()),
    ));

    // Restore persisted state; playability and cover presence are
    // recomputed during the load.
    log::info!("Loading library from {:?}", prefs.application_folder());
    let stored_tracks = persist::load_tracks(&prefs.tracks_file())?;
    let stored_playlists = persist::load_playlists(&prefs.playlists_file())?;
    let stored_waveforms = persist::load_waveforms(&prefs.waveforms_file())?;
    log::info!(
        "Loaded {} tracks, {} playlists, {} waveforms",
        stored_tracks.len(),
        stored_playlists.len(),
        stored_waveforms.len()
    );
    library.restore(stored_tracks, stored_playlists, stored_waveforms);

    let demon = TaskDemon::new(
        library.clone(),
        prefs.clone(),
        progress,
        errors,
        saver.clone(),
    );

    if let Some(folder) = args.import.clone() {
        log::info!("Importing folder {:?}", folder);
        run_import(demon.import_folder(folder)?, args.yes)?;
    }

    if let Some(itunes) = args.itunes.as_deref() {
        let xml = PathBuf::from(shellexpand::tilde(itunes).as_ref());
        log::info!("Importing iTunes library {:?}", xml);
        run_import(demon.import_itunes(xml)?, args.yes)?;
    }

    if args.waveforms {
        compute_waveforms(&library, &demon, &events);
    }

    log::info!(
        "Library: {} tracks, {} artists, {} albums, {} playlists",
        library.tracks.len(),
        library.artists.artist_names().len(),
        library.albums.album_names().len(),
        library.playlists.playlist_names().len()
    );

    // Final synchronous flush so nothing pends in the save worker when
    // the process exits.
    saver.save_now(true, true, true);
    prefs.save()?;

    Ok(())
}

/// Drive one import through its confirmation gate and wait for it.
fn run_import(handle: ImportHandle, auto_confirm: bool) -> Result<()> {
    let Some(found) = handle.scanned() else {
        let outcome = handle.wait();
        anyhow::bail!("import aborted: {}", outcome.failures.join("; "));
    };

    if auto_confirm {
        handle.confirm(true);
    } else {
        eprint!("Import {found} items? [y/N] ");
        std::io::stderr().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        let proceed = matches!(line.trim().to_lowercase().as_str(), "y" | "yes");
        handle.confirm(proceed);
    }

    let outcome = handle.wait();
    match outcome.stage {
        ImportStage::Succeeded => log::info!(
            "Imported {} tracks ({} failures, {} files missing)",
            outcome.imported,
            outcome.failures.len(),
            outcome.not_found.len()
        ),
        stage => log::warn!("Import did not complete: {stage:?}"),
    }
    Ok(())
}

/// Queue waveform extraction for every playable track and wait for the
/// worker to drain the queue.
fn compute_waveforms(library: &MusicLibrary, demon: &TaskDemon, events: &EventBus) {
    let receiver = events.subscribe();
    let mut pending = 0usize;
    for id in library.tracks.all_ids() {
        let playable = library.tracks.get(id).map(|t| t.playable()).unwrap_or(false);
        if !playable || library.waveforms.contains(id) {
            continue;
        }
        match demon.analyze_waveform(id) {
            Ok(()) => pending += 1,
            Err(e) => log::warn!("Could not queue waveform for track {id}: {e}"),
        }
    }
    log::info!("Waiting for {pending} waveform(s)");

    let mut done = 0usize;
    while done < pending {
        match receiver.recv_timeout(Duration::from_secs(30)) {
            Ok(LibraryEvent::WaveformReady(id)) => {
                done += 1;
                log::debug!("Waveform ready for track {id} ({done}/{pending})");
            }
            Ok(_) => {}
            Err(_) => {
                log::warn!("Timed out waiting for waveforms ({done}/{pending} done)");
                break;
            }
        }
    }
}
