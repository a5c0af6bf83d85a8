//! Waveform extraction worker.
//!
//! One long-lived thread blocks on a job queue fed by track selection
//! and playback events. Each job decodes the audio to mono samples and
//! reduces them to a fixed-length amplitude thumbnail. Success is judged
//! by a post-condition (the decode produced samples), never by
//! inspecting decoder error messages.

use crate::error::{LibraryError, Result};
use crate::events::{ErrorSink, EventBus, LibraryEvent};
use crate::library::{WaveformsLibrary, WAVEFORM_SAMPLES};
use crate::tasks::save::SaveHandle;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as DecodeError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Display scale applied to every amplitude bucket.
const HEIGHT_COEFFICIENT: f32 = 4.2;

/// Formats the extractor accepts.
const WAVEFORM_EXTENSIONS: [&str; 3] = ["wav", "mp3", "m4a"];

#[derive(Debug)]
pub struct WaveformJob {
    pub track_id: u32,
    pub path: PathBuf,
}

/// Cloneable sender feeding the waveform worker's queue.
#[derive(Clone)]
pub struct WaveformHandle {
    queue: Sender<WaveformJob>,
}

impl WaveformHandle {
    pub fn enqueue(&self, track_id: u32, path: PathBuf) -> bool {
        self.queue.send(WaveformJob { track_id, path }).is_ok()
    }
}

/// Start the worker thread. It blocks on the queue when idle and exits
/// once every handle has been dropped.
pub(crate) fn spawn(
    waveforms: Arc<WaveformsLibrary>,
    saver: SaveHandle,
    events: Arc<EventBus>,
    errors: Arc<dyn ErrorSink>,
) -> WaveformHandle {
    let (tx, rx) = channel::<WaveformJob>();
    let spawned = thread::Builder::new()
        .name("waveform-worker".to_string())
        .spawn(move || {
            log::debug!("Waveform worker running");
            while let Ok(job) = rx.recv() {
                match process_amplitudes(&job.path) {
                    Ok(amplitudes) => {
                        waveforms.add(job.track_id, amplitudes);
                        saver.request(false, true, false);
                        events.publish(LibraryEvent::WaveformReady(job.track_id));
                    }
                    Err(e) => {
                        errors.report("Waveform extraction failed", Some(&e.to_string()), &[]);
                    }
                }
            }
            log::debug!("Waveform worker stopped");
        });
    if let Err(e) = spawned {
        log::error!("Could not start waveform worker: {e}");
    }
    WaveformHandle { queue: tx }
}

fn waveform_error(path: &Path, message: impl Into<String>) -> LibraryError {
    LibraryError::Waveform {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Decode an audio file and reduce it to the fixed-length amplitude
/// thumbnail.
pub fn process_amplitudes(path: &Path) -> Result<Vec<f32>> {
    let supported = path
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            WAVEFORM_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false);
    if !supported {
        return Err(waveform_error(path, "unsupported audio format"));
    }

    let samples = decode_to_mono(path)?;
    if samples.is_empty() {
        return Err(waveform_error(path, "decoding produced no audio samples"));
    }
    Ok(reduce_amplitudes(&samples))
}

/// Downsample normalized mono samples into exactly [`WAVEFORM_SAMPLES`]
/// buckets, each the mean absolute amplitude of its span, scaled by the
/// height coefficient. Inputs shorter than the bucket count repeat
/// single samples so the output length is invariant.
fn reduce_amplitudes(samples: &[f32]) -> Vec<f32> {
    let mut amplitudes = vec![0.0f32; WAVEFORM_SAMPLES];
    if samples.is_empty() {
        return amplitudes;
    }
    for (i, bucket) in amplitudes.iter_mut().enumerate() {
        let start = i * samples.len() / WAVEFORM_SAMPLES;
        let end = ((i + 1) * samples.len() / WAVEFORM_SAMPLES)
            .max(start + 1)
            .min(samples.len());
        let span = &samples[start..end];
        let mean: f32 = span.iter().map(|s| s.abs()).sum::<f32>() / span.len() as f32;
        *bucket = mean * HEIGHT_COEFFICIENT;
    }
    amplitudes
}

/// Decode any supported file to mono f32 samples in [-1, 1].
fn decode_to_mono(path: &Path) -> Result<Vec<f32>> {
    let file = std::fs::File::open(path).map_err(|e| waveform_error(path, e.to_string()))?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| waveform_error(path, format!("unrecognized audio container: {e}")))?;
    let mut reader = probed.format;

    let selected = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| waveform_error(path, "no decodable audio stream"))?;
    let stream_id = selected.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&selected.codec_params, &DecoderOptions::default())
        .map_err(|e| waveform_error(path, format!("no decoder for stream: {e}")))?;

    let mut pcm = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            // Some readers surface end-of-stream as an unexpected EOF.
            Err(DecodeError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                log::warn!("Stopped reading {path:?} early: {e}");
                break;
            }
        };
        if packet.track_id() != stream_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(audio) => mix_down(audio, &mut pcm),
            // A corrupt packet is skipped; the sample-count post-condition
            // decides whether the decode as a whole succeeded.
            Err(e) => log::warn!("Skipping undecodable packet in {path:?}: {e}"),
        }
    }
    Ok(pcm)
}

/// Average one decoded buffer's frames across channels and append the
/// mono samples to `out`.
fn mix_down(audio: AudioBufferRef<'_>, out: &mut Vec<f32>) {
    let spec = *audio.spec();
    let mut interleaved = SampleBuffer::<f32>::new(audio.capacity() as u64, spec);
    interleaved.copy_interleaved_ref(audio);

    let width = spec.channels.count().max(1);
    out.extend(
        interleaved
            .samples()
            .chunks(width)
            .map(|frame| frame.iter().sum::<f32>() / width as f32),
    );
}
