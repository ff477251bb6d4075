//! Slideshow-related type definitions
//!
//! Supporting types for sequencer state reporting.

use serde::{Deserialize, Serialize};

/// Slideshow sequencer state enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum SlideshowState {
    /// No session running
    Idle,
    /// Waiting for the load window to complete
    LoadingWindow,
    /// Current asset shown while its narration plays
    PresentingWithAudio,
    /// Current asset shown for a fixed duration
    PresentingWithTimer,
    /// Presentation halted, position kept
    Paused,
    /// Past the last asset, or a load window timed out
    Finished,
}

impl SlideshowState {
    /// True for the two presenting states
    pub fn is_presenting(self) -> bool {
        matches!(
            self,
            SlideshowState::PresentingWithAudio | SlideshowState::PresentingWithTimer
        )
    }
}

impl std::fmt::Display for SlideshowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlideshowState::Idle => write!(f, "Idle"),
            SlideshowState::LoadingWindow => write!(f, "LoadingWindow"),
            SlideshowState::PresentingWithAudio => write!(f, "PresentingWithAudio"),
            SlideshowState::PresentingWithTimer => write!(f, "PresentingWithTimer"),
            SlideshowState::Paused => write!(f, "Paused"),
            SlideshowState::Finished => write!(f, "Finished"),
        }
    }
}

/// Why a slideshow reached `Finished`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Advanced past the last asset
    EndOfList,
    /// Load window hit the timeout ceiling
    LoadTimeout,
}
