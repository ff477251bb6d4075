//! Narration playback
//!
//! **Components:**
//! - `AudioPlayerSession`: one active narration at a time, with position ticking,
//!   pause/resume/stop and a single "finished" notification
//! - `AudioBackend` / `AudioTrack`: seam to whatever actually renders the audio
//! - `SymphoniaBackend`: decodes narration files with symphonia and plays them
//!   on a cpal output device, resampled to the device rate
//!
//! The session owns the playback clock. Backends report duration and failures;
//! position and completion come from the session's own elapsed-time accounting.

pub mod decoder;
pub mod output;
pub mod resample;
pub mod session;

pub use decoder::SymphoniaBackend;
pub use output::list_devices;
pub use session::{AudioEvent, AudioMsg, AudioPlayerSession, PlaybackState};

use crate::error::Result;
use crate::stores::AudioHandle;
use std::time::Duration;

/// Opens narration handles for playback
pub trait AudioBackend: Send + Sync {
    /// Prepare `handle` without starting it
    fn open(&self, handle: &AudioHandle) -> Result<Box<dyn AudioTrack>>;
}

/// One opened narration
pub trait AudioTrack: Send {
    /// Total media duration
    fn duration(&self) -> Duration;

    /// Begin output from the start
    fn start(&mut self) -> Result<()>;

    /// Halt output, keeping the read position
    fn pause(&mut self);

    /// Continue after `pause()`
    fn resume(&mut self) -> Result<()>;

    /// Halt output and release resources; the track is not used again
    fn stop(&mut self);

    /// Playback failure detected since the last call, if any
    fn take_error(&mut self) -> Option<String> {
        None
    }
}
