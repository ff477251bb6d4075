//! # Photo Reel Slideshow Engine (reel-slideshow)
//!
//! Loads per-asset details in small windows and plays them back as a narrated
//! slideshow.
//!
//! **Components:**
//! - `loader`: concurrent metadata/image/audio fetching with a window completion
//!   barrier and a tick-based timeout ceiling
//! - `audio`: narration playback session with position ticking
//! - `sequencer`: session actor deciding when to advance, plus its command handle
//! - `stores`: collaborator contracts and filesystem implementations
//! - `export`: flat records for the video export path
//! - `timer`: cancellable one-shot and repeating callbacks

pub mod audio;
pub mod config;
pub mod error;
pub mod export;
pub mod loader;
pub mod sequencer;
pub mod stores;
pub mod timer;

pub use config::SlideshowConfig;
pub use error::{Error, Result};
pub use sequencer::{SessionStatus, Slideshow, SlideshowHandle};
