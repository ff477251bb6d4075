//! Narration decoding using symphonia
//!
//! `SymphoniaBackend::open` probes the file and resolves its duration from the
//! codec parameters, falling back to counting decoded frames when the container
//! does not declare a frame count.
//!
//! Starting a track spawns a playback thread that owns the cpal stream. It
//! decodes packets to stereo f32, converts them to the device rate and keeps the
//! output ring topped up; the device callback paces the whole pipeline. Read,
//! decode and device errors are reported through `take_error()`, which the
//! session turns into a playback failure.

use super::output::OutputDevice;
use super::resample::StreamResampler;
use super::{AudioBackend, AudioTrack};
use crate::error::{Error, Result};
use crate::stores::AudioHandle;
use cpal::traits::StreamTrait;
use ringbuf::traits::{Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Consecutive undecodable packets tolerated before the stream is declared broken
const MAX_DECODE_ERRORS: u32 = 3;

/// Playback thread poll period while paused or waiting for ring space
const POLL: Duration = Duration::from_millis(10);

/// Output ring length, in seconds of device audio
const RING_SECONDS: f64 = 0.5;

/// Opened format reader with its selected track
struct OpenedStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    n_frames: Option<u64>,
    scratch: Option<SampleBuffer<f32>>,
}

/// Open `path` and pick its first decodable track
fn open_stream(path: &Path) -> Result<OpenedStream> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Audio(format!("Failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Audio(format!("Failed to probe {}: {}", path.display(), e)))?;

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Audio(format!("No audio track in {}", path.display())))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| Error::Audio("Sample rate not found".to_string()))?;
    let n_frames = track.codec_params.n_frames;

    let decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Audio(format!("Failed to create decoder: {}", e)))?;

    Ok(OpenedStream {
        format,
        decoder,
        track_id,
        sample_rate,
        n_frames,
        scratch: None,
    })
}

/// Append `interleaved` (with `channels` per frame) to `out` as stereo
///
/// Mono is duplicated to both sides; channels past the second are dropped.
fn push_stereo(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    match channels {
        0 => {}
        1 => {
            for &sample in interleaved {
                out.push(sample);
                out.push(sample);
            }
        }
        _ => {
            for frame in interleaved.chunks_exact(channels) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
        }
    }
}

fn frames_to_duration(frames: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / sample_rate as f64)
}

/// Result of reading one packet
enum Step {
    /// Decoded this many frames, appended to the output as stereo
    Frames(u64),
    /// Packet for another track, or a recoverable decode error
    Skip,
    EndOfStream,
}

impl OpenedStream {
    fn step(
        &mut self,
        decode_errors: &mut u32,
        out: &mut Vec<f32>,
    ) -> std::result::Result<Step, String> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                return Ok(Step::EndOfStream);
            }
            Err(e) => return Err(format!("Error reading packet: {}", e)),
        };

        if packet.track_id() != self.track_id {
            return Ok(Step::Skip);
        }

        match self.decoder.decode(&packet) {
            Ok(decoded) => {
                *decode_errors = 0;
                let frames = decoded.frames() as u64;
                let spec = *decoded.spec();
                let needed = decoded.capacity() * spec.channels.count();
                if self.scratch.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                    self.scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(scratch) = self.scratch.as_mut() {
                    scratch.copy_interleaved_ref(decoded);
                    push_stereo(scratch.samples(), spec.channels.count(), out);
                }
                Ok(Step::Frames(frames))
            }
            Err(SymphoniaError::DecodeError(e)) => {
                *decode_errors += 1;
                warn!("Decode error: {}", e);
                if *decode_errors >= MAX_DECODE_ERRORS {
                    Err(format!("Stream undecodable after {} errors: {}", decode_errors, e))
                } else {
                    Ok(Step::Skip)
                }
            }
            Err(e) => Err(format!("Decoder failure: {}", e)),
        }
    }

    /// Decode the whole stream, counting frames
    fn count_frames(&mut self) -> Result<u64> {
        let mut frames = 0u64;
        let mut errors = 0u32;
        let mut discard = Vec::new();
        loop {
            discard.clear();
            match self.step(&mut errors, &mut discard).map_err(Error::Audio)? {
                Step::Frames(n) => frames += n,
                Step::Skip => {}
                Step::EndOfStream => return Ok(frames),
            }
        }
    }
}

/// Narration backend decoding files with symphonia and playing them with cpal
#[derive(Debug, Default, Clone)]
pub struct SymphoniaBackend {
    /// Output device name; `None` plays on the host default
    device: Option<String>,
}

impl SymphoniaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(device: Option<String>) -> Self {
        Self { device }
    }

    /// Duration of the narration at `path`
    pub fn read_duration(path: &Path) -> Result<Duration> {
        let mut stream = open_stream(path)?;
        let frames = match stream.n_frames {
            Some(frames) => frames,
            None => {
                debug!("No frame count in {}, decoding to measure", path.display());
                stream.count_frames()?
            }
        };
        Ok(frames_to_duration(frames, stream.sample_rate))
    }
}

impl AudioBackend for SymphoniaBackend {
    fn open(&self, handle: &AudioHandle) -> Result<Box<dyn AudioTrack>> {
        let duration = Self::read_duration(handle.path())?;
        if duration.is_zero() {
            return Err(Error::Audio(format!(
                "Narration {} is empty",
                handle.path().display()
            )));
        }
        debug!(
            "Opened {}: {:.2}s",
            handle.path().display(),
            duration.as_secs_f64()
        );
        Ok(Box::new(SymphoniaTrack::new(
            handle.path().to_path_buf(),
            self.device.clone(),
            duration,
        )))
    }
}

/// Flags shared with the worker thread
#[derive(Default)]
struct WorkerShared {
    stop: AtomicBool,
    paused: AtomicBool,
    error: Mutex<Option<String>>,
}

impl WorkerShared {
    fn record_error(&self, reason: String) {
        if let Ok(mut slot) = self.error.lock() {
            slot.get_or_insert(reason);
        }
    }
}

/// Follows the track's pause and stop flags on the playback thread
struct OutputControl<'a> {
    stream: cpal::Stream,
    shared: &'a WorkerShared,
    playing: bool,
}

impl OutputControl<'_> {
    /// Apply pause/resume requests, blocking while paused
    ///
    /// Returns false once stop has been requested.
    fn wait_until_running(&mut self) -> Result<bool> {
        loop {
            if self.shared.stop.load(Ordering::Acquire) {
                return Ok(false);
            }
            let paused = self.shared.paused.load(Ordering::Acquire);
            if paused == self.playing {
                if paused {
                    self.stream
                        .pause()
                        .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
                } else {
                    self.stream
                        .play()
                        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;
                }
                self.playing = !paused;
            }
            if !paused {
                return Ok(true);
            }
            std::thread::sleep(POLL);
        }
    }

    /// Queue `samples` for the device, waiting for ring space
    ///
    /// Only whole stereo frames are pushed. Returns false once stop has been
    /// requested.
    fn feed(&mut self, ring: &mut HeapProd<f32>, mut samples: &[f32]) -> Result<bool> {
        while !samples.is_empty() {
            if !self.wait_until_running()? {
                return Ok(false);
            }
            let room = (ring.vacant_len() & !1).min(samples.len());
            let written = ring.push_slice(&samples[..room]);
            samples = &samples[written..];
            if !samples.is_empty() {
                std::thread::sleep(POLL);
            }
        }
        Ok(true)
    }
}

struct SymphoniaTrack {
    path: PathBuf,
    device: Option<String>,
    duration: Duration,
    shared: Arc<WorkerShared>,
    worker: Option<JoinHandle<()>>,
}

impl SymphoniaTrack {
    fn new(path: PathBuf, device: Option<String>, duration: Duration) -> Self {
        Self {
            path,
            device,
            duration,
            shared: Arc::new(WorkerShared::default()),
            worker: None,
        }
    }

    fn run_worker(path: PathBuf, device: Option<String>, shared: Arc<WorkerShared>) {
        if let Err(e) = Self::play(&path, device.as_deref(), &shared) {
            warn!("Narration {} failed: {}", path.display(), e);
            shared.record_error(e.to_string());
        }
        debug!("Narration worker for {} exited", path.display());
    }

    /// Play `path` on the output device until end of stream or stop
    fn play(path: &Path, device: Option<&str>, shared: &Arc<WorkerShared>) -> Result<()> {
        let mut stream = open_stream(path)?;
        let output = OutputDevice::open(device)?;
        let mut resampler = StreamResampler::new(stream.sample_rate, output.sample_rate())?;

        let ring_frames = ((output.sample_rate() as f64 * RING_SECONDS) as usize).max(1024);
        let (mut ring, consumer) = HeapRb::<f32>::new(ring_frames * 2).split();

        let error_slot = Arc::clone(shared);
        let device_stream = output.build_stream(
            consumer,
            Arc::new(move |reason| error_slot.record_error(reason)),
        )?;
        let mut control = OutputControl {
            stream: device_stream,
            shared: shared.as_ref(),
            playing: false,
        };

        let mut errors = 0u32;
        let mut decoded = Vec::new();
        loop {
            if !control.wait_until_running()? {
                return Ok(());
            }
            decoded.clear();
            match stream.step(&mut errors, &mut decoded).map_err(Error::Audio)? {
                Step::Frames(_) => {}
                Step::Skip => continue,
                Step::EndOfStream => break,
            }
            let converted = resampler.push(&decoded)?;
            if !control.feed(&mut ring, &converted)? {
                return Ok(());
            }
        }

        let tail = resampler.flush()?;
        if !control.feed(&mut ring, &tail)? {
            return Ok(());
        }

        // Let the device play out what is queued
        while !ring.is_empty() {
            if !control.wait_until_running()? {
                return Ok(());
            }
            std::thread::sleep(POLL);
        }
        Ok(())
    }

    fn join_worker(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Narration worker for {} panicked", self.path.display());
            }
        }
    }
}

impl AudioTrack for SymphoniaTrack {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::InvalidState("Narration already started".to_string()));
        }

        let path = self.path.clone();
        let device = self.device.clone();
        let shared = Arc::clone(&self.shared);
        let worker = std::thread::Builder::new()
            .name("narration-output".to_string())
            .spawn(move || Self::run_worker(path, device, shared))?;
        self.worker = Some(worker);
        Ok(())
    }

    fn pause(&mut self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    fn resume(&mut self) -> Result<()> {
        self.shared.paused.store(false, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) {
        self.join_worker();
    }

    fn take_error(&mut self) -> Option<String> {
        self.shared.error.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Drop for SymphoniaTrack {
    fn drop(&mut self) {
        self.join_worker();
    }
}
