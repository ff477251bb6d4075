//! Slideshow sequencer
//!
//! Drives one slideshow session: loads the window around the current asset,
//! presents it with its narration (or for a fixed duration when there is none),
//! and advances when the narration finishes or the duration elapses.
//!
//! **Structure:**
//! - `core`: the session actor; sole owner of the load coordinator, the audio
//!   session and the presentation timers
//! - `handle`: `SlideshowHandle`, the cloneable command/query front end
//!
//! The actor runs on its own tokio task and processes commands, loader messages,
//! audio ticks and timer expiries one at a time.

mod core;
mod handle;

pub use self::core::Slideshow;
pub use handle::{SessionStatus, SlideshowHandle};
