//! Slideshow session actor
//!
//! **State flow:**
//! - `Idle -> LoadingWindow` on play
//! - `LoadingWindow -> PresentingWithAudio | PresentingWithTimer` when the window
//!   loads; `-> Finished` when it times out
//! - `PresentingWithAudio -> LoadingWindow` after narration end plus the grace delay
//! - `PresentingWithTimer -> LoadingWindow` when the slide duration elapses
//! - presenting `<-> Paused`
//! - advancing past the last asset `-> Finished`
//! - `Finished -> LoadingWindow` on play: the timed-out window again, otherwise
//!   the first asset
//!
//! Every change of presented asset bumps `token`. Timer and loader callbacks carry
//! the token they were armed with and are ignored once it is stale.

use super::handle::{SessionStatus, SlideshowHandle};
use crate::audio::{AudioBackend, AudioEvent, AudioPlayerSession};
use crate::config::SlideshowConfig;
use crate::error::{Error, Result};
use crate::loader::{AssetDetail, LoadCoordinator, LoadStatus, LoadWindow, LoaderConfig};
use crate::stores::Stores;
use crate::timer::Timer;
use reel_common::events::{EventBus, FinishReason, ReelEvent, SlideshowState};
use reel_common::{AssetId, AssetRef};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Command inbox depth
const COMMAND_CAPACITY: usize = 32;

pub(super) type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests from `SlideshowHandle`
pub(super) enum Command {
    Play(Reply<()>),
    Pause(Reply<()>),
    Stop(Reply<()>),
    JumpTo { index: usize, reply: Reply<()> },
    Next(Reply<()>),
    Previous(Reply<()>),
    ResetToDefault(Reply<()>),
    LoadWindow { anchor: usize, reply: Reply<oneshot::Receiver<bool>> },
    PublishedDetails(oneshot::Sender<Vec<Arc<AssetDetail>>>),
    Detail { id: AssetId, reply: oneshot::Sender<Option<Arc<AssetDetail>>> },
    LoadStatus { id: AssetId, reply: oneshot::Sender<Option<LoadStatus>> },
    Status(oneshot::Sender<SessionStatus>),
}

/// Internal wake-ups, tagged with the token they were armed under
#[derive(Debug)]
enum SeqMsg {
    WindowLoaded { token: u64, anchor: usize, success: bool },
    SlideElapsed { token: u64 },
    GraceElapsed { token: u64 },
}

/// What the running presentation timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerPurpose {
    /// Fixed-duration slide without narration
    Slide,
    /// Delay between narration end and advancing
    Grace,
}

/// Presentation held by `Paused`
#[derive(Debug, Clone, Copy)]
struct PausedPresentation {
    state: SlideshowState,
    /// Remaining time of the timer running when paused
    timer: Option<(TimerPurpose, Duration)>,
}

/// Entry point for starting sessions
pub struct Slideshow;

impl Slideshow {
    /// Spawn a session actor for `assets` and return its handle
    ///
    /// The session starts `Idle` at index 0; call `play()` to begin. It shuts down
    /// when every handle is dropped. Must be called within a tokio runtime.
    pub fn spawn(
        assets: Vec<AssetRef>,
        stores: Stores,
        backend: Arc<dyn AudioBackend>,
        config: SlideshowConfig,
    ) -> Result<SlideshowHandle> {
        config.validate()?;

        let id = Uuid::new_v4();
        let events = EventBus::new(config.event_capacity);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();
        let len = assets.len();

        let sequencer = Sequencer {
            id,
            loader: LoadCoordinator::new(stores.clone(), LoaderConfig::from(&config)),
            audio: AudioPlayerSession::new(backend, config.audio_tick()),
            assets,
            config: config.clone(),
            events: events.clone(),
            state: SlideshowState::Idle,
            anchor: 0,
            token: 0,
            timer: None,
            paused: None,
            own_load_pending: false,
            finish_reason: None,
            tx,
            rx,
        };

        info!("Slideshow session {} created with {} assets", id, len);
        tokio::spawn(sequencer.run(command_rx));

        Ok(SlideshowHandle::new(
            id,
            command_tx,
            events,
            stores,
            config.user(),
            len,
        ))
    }
}

struct Sequencer {
    id: Uuid,
    assets: Vec<AssetRef>,
    config: SlideshowConfig,

    loader: LoadCoordinator,
    audio: AudioPlayerSession,
    events: EventBus,

    state: SlideshowState,
    /// Index of the current asset
    anchor: usize,
    token: u64,

    timer: Option<(TimerPurpose, Timer)>,
    paused: Option<PausedPresentation>,
    /// The sequencer's own window load is in progress
    own_load_pending: bool,
    /// Why the session last reached `Finished`
    finish_reason: Option<FinishReason>,

    tx: mpsc::UnboundedSender<SeqMsg>,
    rx: mpsc::UnboundedReceiver<SeqMsg>,
}

impl Sequencer {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        debug!("Slideshow session {} running", self.id);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(msg) = self.loader.recv() => self.loader.handle(msg),
                Some(msg) = self.audio.recv() => {
                    if let Some(event) = self.audio.handle(msg) {
                        self.on_audio_event(event);
                    }
                }
                Some(msg) = self.rx.recv() => self.on_message(msg),
            }
        }

        self.audio.stop();
        info!("Slideshow session {} closed", self.id);
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Play(reply) => {
                let _ = reply.send(self.play());
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.pause());
            }
            Command::Stop(reply) => {
                self.stop();
                let _ = reply.send(Ok(()));
            }
            Command::JumpTo { index, reply } => {
                let _ = reply.send(self.jump_to(index));
            }
            Command::Next(reply) => {
                let result = self.jump_to(self.anchor.saturating_add(1));
                let _ = reply.send(result);
            }
            Command::Previous(reply) => {
                let result = match self.anchor.checked_sub(1) {
                    Some(index) => self.jump_to(index),
                    None => Err(Error::InvalidState(
                        "Already at the first asset".to_string(),
                    )),
                };
                let _ = reply.send(result);
            }
            Command::ResetToDefault(reply) => {
                self.reset_to_default();
                let _ = reply.send(Ok(()));
            }
            Command::LoadWindow { anchor, reply } => {
                let _ = reply.send(self.load_window(anchor));
            }
            Command::PublishedDetails(reply) => {
                let _ = reply.send(self.loader.published_details());
            }
            Command::Detail { id, reply } => {
                let _ = reply.send(self.loader.detail(&id));
            }
            Command::LoadStatus { id, reply } => {
                let _ = reply.send(self.loader.status(&id).cloned());
            }
            Command::Status(reply) => {
                let _ = reply.send(SessionStatus {
                    state: self.state,
                    anchor: self.anchor,
                    len: self.assets.len(),
                    narration_position: self
                        .audio
                        .is_playing()
                        .then(|| self.audio.position()),
                });
            }
        }
    }

    fn on_message(&mut self, msg: SeqMsg) {
        match msg {
            SeqMsg::WindowLoaded {
                token,
                anchor,
                success,
            } => {
                if token != self.token {
                    debug!("Ignoring stale window result for anchor {}", anchor);
                    return;
                }
                self.own_load_pending = false;
                if success {
                    self.events.emit_lossy(ReelEvent::WindowLoaded {
                        anchor,
                        window_len: self.window_len(anchor),
                        timestamp: reel_common::time::now(),
                    });
                    self.present(anchor);
                } else {
                    error!("Load window at {} timed out", anchor);
                    self.events.emit_lossy(ReelEvent::LoadTimeout {
                        anchor,
                        timestamp: reel_common::time::now(),
                    });
                    self.finish(FinishReason::LoadTimeout);
                }
            }
            SeqMsg::SlideElapsed { token } => {
                if token == self.token && self.state == SlideshowState::PresentingWithTimer {
                    self.timer = None;
                    self.advance();
                }
            }
            SeqMsg::GraceElapsed { token } => {
                if token == self.token && self.state == SlideshowState::PresentingWithAudio {
                    self.timer = None;
                    self.advance();
                }
            }
        }
    }

    fn on_audio_event(&mut self, event: AudioEvent) {
        let asset_id = self.current_id();
        match event {
            AudioEvent::Progress { position, duration } => {
                self.events.emit_lossy(ReelEvent::AudioProgress {
                    asset_id,
                    position_secs: position.as_secs_f64(),
                    percent: reel_common::time::percent_of(position, duration),
                });
            }
            AudioEvent::Finished => {
                let duration = self.audio.duration();
                self.events.emit_lossy(ReelEvent::AudioProgress {
                    asset_id: asset_id.clone(),
                    position_secs: duration.as_secs_f64(),
                    percent: 100.0,
                });
                self.events.emit_lossy(ReelEvent::AudioFinished { asset_id });
                self.audio.invalidate();
                self.arm_timer(TimerPurpose::Grace, self.config.audio_grace());
            }
            AudioEvent::Failed(reason) => {
                self.audio.invalidate();
                self.fall_back_to_timer(asset_id, reason);
            }
        }
    }

    // ========================================
    // Commands
    // ========================================

    fn play(&mut self) -> Result<()> {
        match self.state {
            SlideshowState::Idle => {
                self.require_assets()?;
                info!("Slideshow {} starting at {}", self.id, self.anchor);
                self.enter_loading(self.anchor);
                Ok(())
            }
            SlideshowState::Finished => {
                self.require_assets()?;
                self.halt_presentation();
                if self.finish_reason == Some(FinishReason::LoadTimeout) {
                    info!("Slideshow {} retrying window at {}", self.id, self.anchor);
                } else {
                    info!("Slideshow {} restarting from the first asset", self.id);
                    self.anchor = 0;
                }
                self.enter_loading(self.anchor);
                Ok(())
            }
            SlideshowState::Paused => {
                self.resume();
                Ok(())
            }
            SlideshowState::LoadingWindow
            | SlideshowState::PresentingWithAudio
            | SlideshowState::PresentingWithTimer => Ok(()),
        }
    }

    fn pause(&mut self) -> Result<()> {
        match self.state {
            SlideshowState::Paused => Ok(()),
            SlideshowState::PresentingWithAudio | SlideshowState::PresentingWithTimer => {
                let timer = self.timer.take().map(|(purpose, timer)| {
                    let remaining = timer.remaining().unwrap_or_default();
                    timer.cancel();
                    (purpose, remaining)
                });
                // A fire already queued must not land after resume
                self.token += 1;
                self.audio.pause();
                self.paused = Some(PausedPresentation {
                    state: self.state,
                    timer,
                });
                self.set_state(SlideshowState::Paused);
                Ok(())
            }
            other => Err(Error::InvalidState(format!(
                "Cannot pause while {}",
                other
            ))),
        }
    }

    fn resume(&mut self) {
        let Some(paused) = self.paused.take() else {
            warn!("Paused without a held presentation, reloading {}", self.anchor);
            self.enter_loading(self.anchor);
            return;
        };

        self.set_state(paused.state);
        if let Some((purpose, remaining)) = paused.timer {
            self.arm_timer(purpose, remaining);
            return;
        }

        if paused.state == SlideshowState::PresentingWithAudio {
            if let Err(e) = self.audio.resume() {
                let asset_id = self.current_id();
                self.audio.invalidate();
                self.fall_back_to_timer(asset_id, e.to_string());
            }
        }
    }

    fn stop(&mut self) {
        self.halt_presentation();
        self.own_load_pending = false;
        self.set_state(SlideshowState::Idle);
        info!("Slideshow {} stopped at {}", self.id, self.anchor);
    }

    fn jump_to(&mut self, index: usize) -> Result<()> {
        if index >= self.assets.len() {
            return Err(Error::InvalidIndex {
                index,
                len: self.assets.len(),
            });
        }

        info!("Slideshow {} jumping to {}", self.id, index);
        self.halt_presentation();
        self.anchor = index;

        if self.loader.is_loaded(&self.assets[index].id) {
            self.own_load_pending = false;
            self.present(index);
        } else {
            self.enter_loading(index);
        }
        Ok(())
    }

    fn reset_to_default(&mut self) {
        self.halt_presentation();
        self.loader.reset_cycle();
        self.own_load_pending = false;
        self.anchor = 0;
        self.set_state(SlideshowState::Idle);
        info!("Slideshow {} reset", self.id);
    }

    /// Preload the window at `anchor` without changing the presentation
    fn load_window(&mut self, anchor: usize) -> Result<oneshot::Receiver<bool>> {
        if self.own_load_pending {
            return Err(Error::InvalidState(
                "A window load is already in progress".to_string(),
            ));
        }
        let window = LoadWindow::for_anchor(&self.assets, anchor, self.config.window_size)
            .ok_or(Error::InvalidIndex {
                index: anchor,
                len: self.assets.len(),
            })?;

        let (done_tx, done_rx) = oneshot::channel();
        self.loader.begin_load_cycle(
            window,
            Box::new(move |success| {
                let _ = done_tx.send(success);
            }),
        );
        Ok(done_rx)
    }

    // ========================================
    // Transitions
    // ========================================

    fn enter_loading(&mut self, anchor: usize) {
        self.token += 1;
        self.paused = None;
        self.set_state(SlideshowState::LoadingWindow);

        let Some(window) = LoadWindow::for_anchor(&self.assets, anchor, self.config.window_size)
        else {
            self.finish(FinishReason::EndOfList);
            return;
        };

        self.loader.retain_window(&window);
        self.own_load_pending = true;
        let tx = self.tx.clone();
        let token = self.token;
        self.loader.begin_load_cycle(
            window,
            Box::new(move |success| {
                let _ = tx.send(SeqMsg::WindowLoaded {
                    token,
                    anchor,
                    success,
                });
            }),
        );
    }

    fn present(&mut self, index: usize) {
        self.token += 1;
        self.paused = None;

        let asset_id = self.assets[index].id.clone();
        let Some(detail) = self.loader.detail(&asset_id) else {
            warn!("Asset {} not published, reloading its window", asset_id);
            self.enter_loading(index);
            return;
        };

        self.events.emit_lossy(ReelEvent::Advanced {
            index,
            asset_id: asset_id.clone(),
            timestamp: reel_common::time::now(),
        });

        match detail.audio.as_ref() {
            Some(narration) => {
                let started = self
                    .audio
                    .initialize(narration)
                    .and_then(|_| self.audio.play());
                match started {
                    Ok(()) => {
                        debug!("Presenting {} ({}) with narration", index, asset_id);
                        self.set_state(SlideshowState::PresentingWithAudio);
                    }
                    Err(e) => {
                        self.audio.invalidate();
                        self.fall_back_to_timer(asset_id, e.to_string());
                    }
                }
            }
            None => {
                debug!("Presenting {} ({}) for the slide duration", index, asset_id);
                self.arm_timer(TimerPurpose::Slide, self.config.slide_duration());
                self.set_state(SlideshowState::PresentingWithTimer);
            }
        }
    }

    fn fall_back_to_timer(&mut self, asset_id: AssetId, reason: String) {
        warn!(
            "Narration for {} failed ({}), using the slide duration",
            asset_id, reason
        );
        self.events
            .emit_lossy(ReelEvent::AudioFailed { asset_id, reason });
        self.arm_timer(TimerPurpose::Slide, self.config.slide_duration());
        self.set_state(SlideshowState::PresentingWithTimer);
    }

    fn advance(&mut self) {
        let next = self.anchor + 1;
        if next >= self.assets.len() {
            self.finish(FinishReason::EndOfList);
            return;
        }
        self.anchor = next;
        self.enter_loading(next);
    }

    fn finish(&mut self, reason: FinishReason) {
        self.halt_presentation();
        self.own_load_pending = false;
        self.finish_reason = Some(reason);
        self.set_state(SlideshowState::Finished);
        info!("Slideshow {} finished ({:?})", self.id, reason);
        self.events.emit_lossy(ReelEvent::SlideshowFinished {
            reason,
            timestamp: reel_common::time::now(),
        });
    }

    /// Stop narration and timers; pending wake-ups become stale
    fn halt_presentation(&mut self) {
        self.token += 1;
        self.audio.stop();
        self.timer = None;
        self.paused = None;
    }

    fn arm_timer(&mut self, purpose: TimerPurpose, delay: Duration) {
        let tx = self.tx.clone();
        let token = self.token;
        let timer = Timer::once(delay, move || {
            let msg = match purpose {
                TimerPurpose::Slide => SeqMsg::SlideElapsed { token },
                TimerPurpose::Grace => SeqMsg::GraceElapsed { token },
            };
            let _ = tx.send(msg);
        });
        self.timer = Some((purpose, timer));
    }

    fn set_state(&mut self, new_state: SlideshowState) {
        if self.state == new_state {
            return;
        }
        let old_state = self.state;
        self.state = new_state;
        debug!("Slideshow {}: {} -> {}", self.id, old_state, new_state);
        self.events.emit_lossy(ReelEvent::StateChanged {
            old_state,
            new_state,
            timestamp: reel_common::time::now(),
        });
    }

    fn require_assets(&self) -> Result<()> {
        if self.assets.is_empty() {
            return Err(Error::InvalidState("Slideshow has no assets".to_string()));
        }
        Ok(())
    }

    fn current_id(&self) -> AssetId {
        self.assets
            .get(self.anchor)
            .map(|asset| asset.id.clone())
            .unwrap_or_else(|| AssetId::new(""))
    }

    fn window_len(&self, anchor: usize) -> usize {
        LoadWindow::for_anchor(&self.assets, anchor, self.config.window_size)
            .map_or(0, |window| window.len())
    }
}
