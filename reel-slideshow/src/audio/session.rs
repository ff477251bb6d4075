//! Audio player session
//!
//! Wraps exactly one narration at a time. While playing, a repeating timer posts
//! `AudioMsg::Tick` to the session's inbox; `handle()` turns each tick into a
//! position report, the single `Finished` notification, or a `Failed` report.
//!
//! **Generations:** `initialize()`, `stop()` and `invalidate()` bump the
//! generation, so ticks queued for a previous narration are ignored.

use super::{AudioBackend, AudioTrack};
use crate::error::{Error, Result};
use crate::stores::AudioHandle;
use crate::timer::{Timer, TimerControl};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Playback lifecycle of the current narration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing loaded
    Idle,
    /// Initialized, not started
    Ready,
    Playing,
    Paused,
    /// Reached end of media
    Finished,
    /// Backend reported an error during playback
    Failed,
}

/// Session inbox message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMsg {
    Tick { generation: u64 },
}

/// Notification produced by `handle()`
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Current position while playing
    Progress { position: Duration, duration: Duration },
    /// End of media; sent once per narration
    Finished,
    /// Playback broke; the caller should fall back to a fixed timer
    Failed(String),
}

/// Playback of one narration with elapsed-time tracking
pub struct AudioPlayerSession {
    backend: Arc<dyn AudioBackend>,
    tick_interval: Duration,

    source: Option<AudioHandle>,
    track: Option<Box<dyn AudioTrack>>,
    duration: Duration,

    /// Elapsed time banked by earlier play spans
    accumulated: Duration,
    /// Start of the current play span
    resumed_at: Option<Instant>,

    ticker: Option<Timer>,
    generation: u64,
    state: PlaybackState,

    tx: mpsc::UnboundedSender<AudioMsg>,
    rx: mpsc::UnboundedReceiver<AudioMsg>,
}

impl AudioPlayerSession {
    pub fn new(backend: Arc<dyn AudioBackend>, tick_interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            tick_interval,
            source: None,
            track: None,
            duration: Duration::ZERO,
            accumulated: Duration::ZERO,
            resumed_at: None,
            ticker: None,
            generation: 0,
            state: PlaybackState::Idle,
            tx,
            rx,
        }
    }

    /// Load `handle` without starting playback, returning its duration
    ///
    /// Any previous narration is invalidated first.
    pub fn initialize(&mut self, handle: &AudioHandle) -> Result<Duration> {
        self.invalidate();

        let track = self.backend.open(handle)?;
        self.duration = track.duration();
        self.track = Some(track);
        self.source = Some(handle.clone());
        self.state = PlaybackState::Ready;

        debug!(
            "Narration {} ready ({:.2}s)",
            handle.path().display(),
            self.duration.as_secs_f64()
        );
        Ok(self.duration)
    }

    /// Start or continue playback and position ticking
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => return Ok(()),
            PlaybackState::Ready | PlaybackState::Paused => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "Cannot play narration in state {:?}",
                    other
                )))
            }
        }

        let starting = self.state == PlaybackState::Ready;
        let track = self
            .track
            .as_mut()
            .ok_or_else(|| Error::InvalidState("No narration loaded".to_string()))?;

        if starting {
            track.start()?;
        } else {
            track.resume()?;
        }

        self.resumed_at = Some(Instant::now());
        self.state = PlaybackState::Playing;
        self.start_ticker();

        if starting {
            info!("Narration started ({:.2}s)", self.duration.as_secs_f64());
        } else {
            debug!(
                "Narration resumed at {:.2}s",
                self.accumulated.as_secs_f64()
            );
        }
        Ok(())
    }

    /// Same as `play()`
    pub fn resume(&mut self) -> Result<()> {
        self.play()
    }

    /// Halt playback and ticking, keeping the elapsed time
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }

        self.accumulated = self.position();
        self.resumed_at = None;
        self.ticker = None;
        if let Some(track) = self.track.as_mut() {
            track.pause();
        }
        self.state = PlaybackState::Paused;
        debug!("Narration paused at {:.2}s", self.accumulated.as_secs_f64());
    }

    /// Halt playback, reset elapsed time and release the narration
    pub fn stop(&mut self) {
        self.invalidate();
    }

    /// Drop the current narration; pending ticks become no-ops
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.ticker = None;
        if let Some(mut track) = self.track.take() {
            track.stop();
        }
        if let Some(source) = self.source.take() {
            debug!("Narration {} released", source.path().display());
        }
        self.duration = Duration::ZERO;
        self.accumulated = Duration::ZERO;
        self.resumed_at = None;
        self.state = PlaybackState::Idle;
    }

    /// Next inbox message; pending while nothing is playing
    pub async fn recv(&mut self) -> Option<AudioMsg> {
        self.rx.recv().await
    }

    /// Apply an inbox message
    pub fn handle(&mut self, msg: AudioMsg) -> Option<AudioEvent> {
        let AudioMsg::Tick { generation } = msg;
        if generation != self.generation || self.state != PlaybackState::Playing {
            return None;
        }

        if let Some(reason) = self.track.as_mut().and_then(|track| track.take_error()) {
            warn!("Narration playback failed: {}", reason);
            self.halt(PlaybackState::Failed);
            return Some(AudioEvent::Failed(reason));
        }

        let position = self.position();
        if position >= self.duration {
            self.accumulated = self.duration;
            self.halt(PlaybackState::Finished);
            info!("Narration finished ({:.2}s)", self.duration.as_secs_f64());
            return Some(AudioEvent::Finished);
        }

        Some(AudioEvent::Progress {
            position,
            duration: self.duration,
        })
    }

    /// Elapsed playback time, never past the duration
    pub fn position(&self) -> Duration {
        let running = self
            .resumed_at
            .map_or(Duration::ZERO, |since| since.elapsed());
        (self.accumulated + running).min(self.duration)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn source(&self) -> Option<&AudioHandle> {
        self.source.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn start_ticker(&mut self) {
        let tx = self.tx.clone();
        let generation = self.generation;
        self.ticker = Some(Timer::repeating(self.tick_interval, move |_| {
            match tx.send(AudioMsg::Tick { generation }) {
                Ok(()) => TimerControl::Continue,
                Err(_) => TimerControl::Stop,
            }
        }));
    }

    /// Stop ticking and output after finish or failure
    fn halt(&mut self, state: PlaybackState) {
        if state != PlaybackState::Finished {
            self.accumulated = self.position();
        }
        self.ticker = None;
        self.resumed_at = None;
        if let Some(track) = self.track.as_mut() {
            track.stop();
        }
        self.state = state;
    }
}

impl Drop for AudioPlayerSession {
    fn drop(&mut self) {
        if let Some(mut track) = self.track.take() {
            track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        log: Vec<&'static str>,
        error: Option<String>,
    }

    struct FakeTrack {
        duration: Duration,
        calls: Arc<Mutex<Calls>>,
    }

    impl AudioTrack for FakeTrack {
        fn duration(&self) -> Duration {
            self.duration
        }
        fn start(&mut self) -> Result<()> {
            self.calls.lock().unwrap().log.push("start");
            Ok(())
        }
        fn pause(&mut self) {
            self.calls.lock().unwrap().log.push("pause");
        }
        fn resume(&mut self) -> Result<()> {
            self.calls.lock().unwrap().log.push("resume");
            Ok(())
        }
        fn stop(&mut self) {
            self.calls.lock().unwrap().log.push("stop");
        }
        fn take_error(&mut self) -> Option<String> {
            self.calls.lock().unwrap().error.take()
        }
    }

    struct FakeBackend {
        duration: Duration,
        calls: Arc<Mutex<Calls>>,
    }

    impl AudioBackend for FakeBackend {
        fn open(&self, _handle: &AudioHandle) -> Result<Box<dyn AudioTrack>> {
            Ok(Box::new(FakeTrack {
                duration: self.duration,
                calls: Arc::clone(&self.calls),
            }))
        }
    }

    fn session(duration: Duration) -> (AudioPlayerSession, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let backend = Arc::new(FakeBackend {
            duration,
            calls: Arc::clone(&calls),
        });
        (
            AudioPlayerSession::new(backend, Duration::from_millis(100)),
            calls,
        )
    }

    async fn next_event(session: &mut AudioPlayerSession) -> AudioEvent {
        loop {
            let msg = session.recv().await.unwrap();
            if let Some(event) = session.handle(msg) {
                return event;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_reports_duration_without_playing() {
        let (mut session, calls) = session(Duration::from_secs(3));

        let duration = session.initialize(&AudioHandle::new("/n/a.m4a")).unwrap();

        assert_eq!(duration, Duration::from_secs(3));
        assert_eq!(session.state(), PlaybackState::Ready);
        assert!(calls.lock().unwrap().log.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finishes_once_at_duration() {
        let (mut session, _calls) = session(Duration::from_secs(1));
        session.initialize(&AudioHandle::new("/n/a.m4a")).unwrap();
        let start = Instant::now();
        session.play().unwrap();

        let mut progress = 0;
        loop {
            match next_event(&mut session).await {
                AudioEvent::Progress { position, .. } => {
                    assert!(position < Duration::from_secs(1));
                    progress += 1;
                }
                AudioEvent::Finished => break,
                AudioEvent::Failed(reason) => panic!("Unexpected failure: {}", reason),
            }
        }

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(progress, 9);
        assert_eq!(session.state(), PlaybackState::Finished);
        assert_eq!(session.position(), Duration::from_secs(1));

        // No ticker left, nothing further arrives
        let extra = tokio::time::timeout(Duration::from_secs(2), session.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_preserves_position() {
        let (mut session, calls) = session(Duration::from_secs(10));
        session.initialize(&AudioHandle::new("/n/a.m4a")).unwrap();
        session.play().unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        session.pause();
        assert_eq!(session.position(), Duration::from_millis(2500));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.position(), Duration::from_millis(2500));

        session.resume().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(session.position(), Duration::from_secs(3));
        assert_eq!(
            calls.lock().unwrap().log,
            vec!["start", "pause", "resume"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_resets_and_ignores_queued_ticks() {
        let (mut session, calls) = session(Duration::from_secs(10));
        session.initialize(&AudioHandle::new("/n/a.m4a")).unwrap();
        session.play().unwrap();

        let msg = session.recv().await.unwrap();
        session.stop();

        assert_eq!(session.handle(msg), None);
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.position(), Duration::ZERO);
        assert!(session.source().is_none());
        assert_eq!(calls.lock().unwrap().log, vec!["start", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_error_reported_as_failure() {
        let (mut session, calls) = session(Duration::from_secs(10));
        session.initialize(&AudioHandle::new("/n/a.m4a")).unwrap();
        session.play().unwrap();
        calls.lock().unwrap().error = Some("device lost".to_string());

        let event = next_event(&mut session).await;

        assert_eq!(event, AudioEvent::Failed("device lost".to_string()));
        assert_eq!(session.state(), PlaybackState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_without_narration_rejected() {
        let (mut session, _calls) = session(Duration::from_secs(1));
        assert!(matches!(session.play(), Err(Error::InvalidState(_))));
    }
}
