//! Narration backend without real output
//!
//! Tracks report a configured duration and record how many are currently
//! producing sound, so tests can assert that nothing keeps playing after a stop.
//! A track can be set to fail partway through, as a device dropping out would.

use reel_slideshow::audio::{AudioBackend, AudioTrack};
use reel_slideshow::stores::AudioHandle;
use reel_slideshow::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use super::scripted_stores::narration_path;

pub struct FakeAudioBackend {
    default_duration: Duration,
    durations: Mutex<HashMap<PathBuf, Duration>>,
    broken: Mutex<HashSet<PathBuf>>,
    failing: Mutex<HashMap<PathBuf, Duration>>,
    opened: AtomicUsize,
    playing: Arc<AtomicUsize>,
}

impl FakeAudioBackend {
    pub fn new(default_duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            default_duration,
            durations: Mutex::new(HashMap::new()),
            broken: Mutex::new(HashSet::new()),
            failing: Mutex::new(HashMap::new()),
            opened: AtomicUsize::new(0),
            playing: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Narration of asset `id` lasts `duration`
    pub fn set_duration(&self, id: &str, duration: Duration) {
        self.durations
            .lock()
            .unwrap()
            .insert(PathBuf::from(narration_path(id)), duration);
    }

    /// Narration of asset `id` cannot be opened
    pub fn break_narration(&self, id: &str) {
        self.broken
            .lock()
            .unwrap()
            .insert(PathBuf::from(narration_path(id)));
    }

    /// Narration of asset `id` reports an error once it has played for `after`
    pub fn fail_during(&self, id: &str, after: Duration) {
        self.failing
            .lock()
            .unwrap()
            .insert(PathBuf::from(narration_path(id)), after);
    }

    /// Tracks currently producing sound
    pub fn playing_tracks(&self) -> usize {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn opened_tracks(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl AudioBackend for FakeAudioBackend {
    fn open(&self, handle: &AudioHandle) -> Result<Box<dyn AudioTrack>> {
        let path = handle.path().to_path_buf();
        if self.broken.lock().unwrap().contains(&path) {
            return Err(Error::Audio(format!("cannot decode {}", path.display())));
        }
        let duration = self
            .durations
            .lock()
            .unwrap()
            .get(&path)
            .copied()
            .unwrap_or(self.default_duration);

        let fails_after = self.failing.lock().unwrap().get(&path).copied();

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeTrack {
            duration,
            sounding: false,
            playing: Arc::clone(&self.playing),
            fails_after,
            played: Duration::ZERO,
            since: None,
        }))
    }
}

struct FakeTrack {
    duration: Duration,
    sounding: bool,
    playing: Arc<AtomicUsize>,
    fails_after: Option<Duration>,
    /// Play time before the last pause
    played: Duration,
    since: Option<Instant>,
}

impl FakeTrack {
    fn set_sounding(&mut self, sounding: bool) {
        if sounding && !self.sounding {
            self.playing.fetch_add(1, Ordering::SeqCst);
            self.since = Some(Instant::now());
        } else if !sounding && self.sounding {
            self.playing.fetch_sub(1, Ordering::SeqCst);
            if let Some(since) = self.since.take() {
                self.played += since.elapsed();
            }
        }
        self.sounding = sounding;
    }

    fn played(&self) -> Duration {
        self.played + self.since.map_or(Duration::ZERO, |since| since.elapsed())
    }
}

impl AudioTrack for FakeTrack {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn start(&mut self) -> Result<()> {
        self.set_sounding(true);
        Ok(())
    }

    fn pause(&mut self) {
        self.set_sounding(false);
    }

    fn resume(&mut self) -> Result<()> {
        self.set_sounding(true);
        Ok(())
    }

    fn stop(&mut self) {
        self.set_sounding(false);
    }

    fn take_error(&mut self) -> Option<String> {
        let after = self.fails_after?;
        if self.played() < after {
            return None;
        }
        self.fails_after = None;
        Some(format!("output device lost after {:.1}s", after.as_secs_f64()))
    }
}
