//! Cancellable scheduled callbacks
//!
//! A `Timer` runs a callback once after a delay, or repeatedly at a fixed period,
//! on a tokio task. Dropping or cancelling the timer aborts the task, so no
//! callback runs after `cancel()` returns unless it was already executing.
//!
//! Callbacks never touch engine state directly: they post a message (tagged with
//! the owner's generation) to the owner's inbox, and the owner decides whether the
//! message is still current. A fire that raced with a cancel is therefore harmless.
//!
//! Resolution is tokio's timer wheel (1ms).

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::trace;

/// Returned by repeating callbacks to keep or stop the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

/// Handle to a scheduled callback; aborts the callback on drop
#[derive(Debug)]
pub struct Timer {
    handle: JoinHandle<()>,
    /// Fire time of a one-shot timer
    deadline: Option<Instant>,
    /// Period of a repeating timer
    period: Option<Duration>,
}

impl Timer {
    /// Run `callback` once after `delay`
    ///
    /// Must be called from within a tokio runtime.
    pub fn once<F>(delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            trace!("One-shot timer fired");
            callback();
        });

        Self {
            handle,
            deadline: Some(deadline),
            period: None,
        }
    }

    /// Run `callback` every `period`, first fire one period from now
    ///
    /// The callback receives the 1-based tick count. Late ticks are delayed rather
    /// than burst, so the count never jumps.
    pub fn repeating<F>(period: Duration, mut callback: F) -> Self
    where
        F: FnMut(u64) -> TimerControl + Send + 'static,
    {
        let start = Instant::now() + period;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut ticks: u64 = 0;
            loop {
                interval.tick().await;
                ticks += 1;
                if callback(ticks) == TimerControl::Stop {
                    trace!("Repeating timer stopped after {} ticks", ticks);
                    break;
                }
            }
        });

        Self {
            handle,
            deadline: None,
            period: Some(period),
        }
    }

    /// Abort the timer; safe to call repeatedly
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// True until the timer fires (one-shot), stops, or is cancelled
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Time left before a one-shot timer fires (None for repeating timers)
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
