//! Waiting on session events under the paused test clock

use reel_common::events::ReelEvent;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Upper bound on any single wait, in virtual time
const WAIT_LIMIT: Duration = Duration::from_secs(300);

/// Next event matching `pred`, with the virtual time it was received
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<ReelEvent>, mut pred: F) -> (ReelEvent, Instant)
where
    F: FnMut(&ReelEvent) -> bool,
{
    let wait = async {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if pred(&event) {
                return (event, Instant::now());
            }
        }
    };
    tokio::time::timeout(WAIT_LIMIT, wait)
        .await
        .expect("timed out waiting for event")
}

/// Every event up to and including the first matching `pred`
pub async fn collect_until<F>(
    rx: &mut broadcast::Receiver<ReelEvent>,
    mut pred: F,
) -> Vec<(ReelEvent, Instant)>
where
    F: FnMut(&ReelEvent) -> bool,
{
    let collect = async {
        let mut seen = Vec::new();
        loop {
            let event = rx.recv().await.expect("event stream closed");
            let done = pred(&event);
            seen.push((event, Instant::now()));
            if done {
                return seen;
            }
        }
    };
    tokio::time::timeout(WAIT_LIMIT, collect)
        .await
        .expect("timed out collecting events")
}
