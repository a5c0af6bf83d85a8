//! The in-memory music library: canonical track collection, derived
//! indices, playlist forest and the orchestrator tying them together.

pub mod albums;
pub mod artists;
pub mod music;
pub mod playlists;
pub mod tracks;
pub mod waveforms;

pub use albums::{AlbumsLibrary, UNKNOWN_ALBUM};
pub use artists::{artists_involved, ArtistsLibrary};
pub use music::{MusicLibrary, NoopSaver, SaveScheduler};
pub use playlists::PlaylistsLibrary;
pub use tracks::{ShowingMode, TracksLibrary};
pub use waveforms::{WaveformsLibrary, WAVEFORM_SAMPLES};
