//! Event types for the Photo Reel event system
//!
//! Provides shared event definitions and the EventBus used by slideshow sessions.

mod slideshow_types;

pub use slideshow_types::{FinishReason, SlideshowState};

use crate::asset::AssetId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Photo Reel event types
///
/// Events are broadcast via EventBus to every listener registered on a session.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReelEvent {
    /// Sequencer state changed
    ///
    /// Triggers:
    /// - UI: Update play/pause controls and loading indicator
    StateChanged {
        /// State before change
        old_state: SlideshowState,
        /// State after change
        new_state: SlideshowState,
        /// When state changed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The sequencer moved to a new asset
    ///
    /// Triggers:
    /// - UI: Scroll the pager to `index`
    Advanced {
        /// Position in the full ordered asset list
        index: usize,
        /// Asset now being presented
        asset_id: AssetId,
        /// When the asset was presented
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Every asset of a load window finished loading
    WindowLoaded {
        /// Anchor index of the window
        anchor: usize,
        /// Number of assets in the window
        window_len: usize,
        /// When the window completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A load window hit the timeout ceiling
    ///
    /// Triggers:
    /// - UI: Show retry prompt
    LoadTimeout {
        /// Anchor index of the window that timed out
        anchor: usize,
        /// When the ceiling was reached
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Narration playback position (about every 100ms while playing)
    ///
    /// Triggers:
    /// - UI: Update narration progress bar
    AudioProgress {
        /// Asset whose narration is playing
        asset_id: AssetId,
        /// Elapsed playback time in seconds
        position_secs: f64,
        /// Elapsed share of total duration, 0.0-100.0
        percent: f64,
    },

    /// Narration reached end-of-media
    AudioFinished {
        /// Asset whose narration finished
        asset_id: AssetId,
    },

    /// Narration failed to decode or was interrupted
    ///
    /// The sequencer falls back to fixed-duration presentation.
    AudioFailed {
        /// Asset whose narration failed
        asset_id: AssetId,
        /// Failure description
        reason: String,
    },

    /// Slideshow stopped auto-advancing
    SlideshowFinished {
        /// Why the slideshow finished
        reason: FinishReason,
        /// When the slideshow finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ReelEvent {
    /// Event type name, matching the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            ReelEvent::StateChanged { .. } => "StateChanged",
            ReelEvent::Advanced { .. } => "Advanced",
            ReelEvent::WindowLoaded { .. } => "WindowLoaded",
            ReelEvent::LoadTimeout { .. } => "LoadTimeout",
            ReelEvent::AudioProgress { .. } => "AudioProgress",
            ReelEvent::AudioFinished { .. } => "AudioFinished",
            ReelEvent::AudioFailed { .. } => "AudioFailed",
            ReelEvent::SlideshowFinished { .. } => "SlideshowFinished",
        }
    }
}

/// Per-session fan-out of `ReelEvent`s over `tokio::sync::broadcast`
///
/// Publishing never waits on subscribers. A subscriber that falls more than
/// `capacity` events behind sees `RecvError::Lagged` on its next receive.
/// Every session owns its own bus.
///
/// # Examples
///
/// ```
/// use reel_common::events::{EventBus, ReelEvent, SlideshowState};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit(ReelEvent::StateChanged {
///     old_state: SlideshowState::Idle,
///     new_state: SlideshowState::LoadingWindow,
///     timestamp: chrono::Utc::now(),
/// }).ok();
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReelEvent>,
    capacity: usize,
}

impl EventBus {
    /// Bus retaining up to `capacity` undelivered events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Receiver for events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ReelEvent> {
        self.tx.subscribe()
    }

    /// Send to every subscriber, returning how many there were
    ///
    /// Errors when nobody is subscribed.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ReelEvent,
    ) -> Result<usize, broadcast::error::SendError<ReelEvent>> {
        self.tx.send(event)
    }

    /// Send, dropping the event silently when nobody listens
    pub fn emit_lossy(&self, event: ReelEvent) {
        let _ = self.tx.send(event);
    }

    /// Live receivers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = ReelEvent::Advanced {
            index: 2,
            asset_id: AssetId::from("IMG_2"),
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Advanced");
        assert_eq!(json["index"], 2);
        assert_eq!(json["asset_id"], "IMG_2");
        assert_eq!(event.event_type(), "Advanced");
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        let result = bus.emit(ReelEvent::AudioFinished {
            asset_id: AssetId::from("a"),
        });
        assert!(result.is_err());

        // Lossy variant is silent
        bus.emit_lossy(ReelEvent::AudioFinished {
            asset_id: AssetId::from("a"),
        });
    }

    #[tokio::test]
    async fn test_each_subscriber_receives_events() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(bus.capacity(), 10);

        let sent = bus
            .emit(ReelEvent::LoadTimeout {
                anchor: 4,
                timestamp: chrono::Utc::now(),
            })
            .unwrap();
        assert_eq!(sent, 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                ReelEvent::LoadTimeout { anchor, .. } => assert_eq!(anchor, 4),
                other => panic!("Unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_separate_buses_do_not_cross_talk() {
        let bus_a = EventBus::new(10);
        let bus_b = EventBus::new(10);
        let mut rx_b = bus_b.subscribe();

        bus_a.emit_lossy(ReelEvent::AudioFinished {
            asset_id: AssetId::from("a"),
        });

        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_slideshow_state_display_and_presenting() {
        assert_eq!(SlideshowState::LoadingWindow.to_string(), "LoadingWindow");
        assert!(SlideshowState::PresentingWithAudio.is_presenting());
        assert!(SlideshowState::PresentingWithTimer.is_presenting());
        assert!(!SlideshowState::Paused.is_presenting());
    }
}
