//! Test helper modules for reel-slideshow integration tests
//!
//! Provides reusable test infrastructure components:
//! - ScriptedStores: in-memory collaborators with per-asset delays and outcomes
//! - FakeAudioBackend: clock-free narration backend that records track activity
//! - Event helpers: wait on a session's event stream with a virtual-time guard

#![allow(dead_code)]

pub mod events;
pub mod fake_audio;
pub mod scripted_stores;

// Re-export commonly used types
pub use events::{collect_until, wait_for};
pub use fake_audio::FakeAudioBackend;
pub use scripted_stores::{AssetPlan, Outcome, Script, ScriptedStores};

use reel_common::AssetRef;
use reel_slideshow::SlideshowConfig;

/// Device assets named `IMG_0`, `IMG_1`, ...
pub fn assets(count: usize) -> Vec<AssetRef> {
    (0..count)
        .map(|i| AssetRef::device(format!("IMG_{}", i)))
        .collect()
}

/// Default session config
pub fn config() -> SlideshowConfig {
    SlideshowConfig::default()
}
