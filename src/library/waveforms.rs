//! Waveform cache: track id → fixed-length amplitude vector.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Number of amplitude buckets every stored waveform has.
pub const WAVEFORM_SAMPLES: usize = 520;

/// Thread-safe cache of waveform thumbnails, keyed by track id.
pub struct WaveformsLibrary {
    waveforms: Mutex<HashMap<u32, Vec<f32>>>,
}

impl Default for WaveformsLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl WaveformsLibrary {
    pub fn new() -> Self {
        Self {
            waveforms: Mutex::new(HashMap::new()),
        }
    }

    pub fn add(&self, track_id: u32, amplitudes: Vec<f32>) {
        debug_assert_eq!(amplitudes.len(), WAVEFORM_SAMPLES);
        self.waveforms.lock().insert(track_id, amplitudes);
    }

    pub fn get(&self, track_id: u32) -> Option<Vec<f32>> {
        self.waveforms.lock().get(&track_id).cloned()
    }

    pub fn contains(&self, track_id: u32) -> bool {
        self.waveforms.lock().contains_key(&track_id)
    }

    pub fn remove(&self, track_id: u32) {
        self.waveforms.lock().remove(&track_id);
    }

    pub fn len(&self) -> usize {
        self.waveforms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.waveforms.lock().is_empty()
    }

    pub fn clear(&self) {
        self.waveforms.lock().clear();
    }

    /// Run `f` against the whole map under the collection lock. Used by
    /// the persistence worker so a write sees a consistent snapshot.
    pub fn with_all<R>(&self, f: impl FnOnce(&HashMap<u32, Vec<f32>>) -> R) -> R {
        f(&self.waveforms.lock())
    }

    pub(crate) fn restore(&self, waveforms: HashMap<u32, Vec<f32>>) {
        *self.waveforms.lock() = waveforms;
    }
}
