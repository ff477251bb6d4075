//! Command front end of a slideshow session

use super::core::{Command, Reply};
use crate::error::{Error, Result};
use crate::loader::{AssetDetail, LoadStatus};
use crate::stores::Stores;
use reel_common::events::{EventBus, ReelEvent, SlideshowState};
use reel_common::{AssetId, UserId};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::info;
use uuid::Uuid;

/// Snapshot of a session's position
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: SlideshowState,
    /// Index of the current asset
    pub anchor: usize,
    /// Number of assets in the session
    pub len: usize,
    /// Narration position while narration plays
    pub narration_position: Option<Duration>,
}

/// Cloneable handle to a running slideshow session
///
/// Every method round-trips through the session actor, so calls observe each
/// other's effects in order. Returns `Error::SessionClosed` once the actor is gone.
#[derive(Clone)]
pub struct SlideshowHandle {
    id: Uuid,
    commands: mpsc::Sender<Command>,
    events: EventBus,
    stores: Stores,
    user: UserId,
    len: usize,
}

impl SlideshowHandle {
    pub(super) fn new(
        id: Uuid,
        commands: mpsc::Sender<Command>,
        events: EventBus,
        stores: Stores,
        user: UserId,
        len: usize,
    ) -> Self {
        Self {
            id,
            commands,
            events,
            stores,
            user,
            len,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of assets in the session
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Listen to this session's events
    pub fn subscribe(&self) -> broadcast::Receiver<ReelEvent> {
        self.events.subscribe()
    }

    /// Start from `Idle`, resume from `Paused`, or restart from `Finished`
    ///
    /// After a load timeout the restart retries the same window; otherwise it
    /// begins at the first asset.
    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await
    }

    /// Hold the current presentation, keeping narration position and timer
    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    /// Stop presenting and return to `Idle`; loaded details are kept
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Present the asset at `index`, loading its window first if needed
    pub async fn jump_to(&self, index: usize) -> Result<()> {
        self.request(|reply| Command::JumpTo { index, reply }).await
    }

    pub async fn next(&self) -> Result<()> {
        self.request(Command::Next).await
    }

    pub async fn previous(&self) -> Result<()> {
        self.request(Command::Previous).await
    }

    /// Stop, forget every loaded detail, and return to index 0
    pub async fn reset_to_default(&self) -> Result<()> {
        self.request(Command::ResetToDefault).await
    }

    /// Load the window at `anchor` without changing the presentation
    ///
    /// Resolves with the cycle result. Fails with `InvalidState` while the
    /// session's own window load is pending, and when a later load supersedes
    /// this one before it completes.
    pub async fn load_window(&self, anchor: usize) -> Result<bool> {
        let done = self
            .request(|reply| Command::LoadWindow { anchor, reply })
            .await?;
        done.await
            .map_err(|_| Error::InvalidState("Window load superseded".to_string()))
    }

    /// Published details, in list order after a successful load
    pub async fn published_details(&self) -> Result<Vec<Arc<AssetDetail>>> {
        self.query(Command::PublishedDetails).await
    }

    /// Published detail of one asset
    pub async fn detail(&self, id: &AssetId) -> Result<Option<Arc<AssetDetail>>> {
        let id = id.clone();
        self.query(|reply| Command::Detail { id, reply }).await
    }

    /// Load progress of one asset
    pub async fn load_status(&self, id: &AssetId) -> Result<Option<LoadStatus>> {
        let id = id.clone();
        self.query(|reply| Command::LoadStatus { id, reply }).await
    }

    pub async fn status(&self) -> Result<SessionStatus> {
        self.query(Command::Status).await
    }

    pub async fn state(&self) -> Result<SlideshowState> {
        Ok(self.status().await?.state)
    }

    pub async fn anchor(&self) -> Result<usize> {
        Ok(self.status().await?.anchor)
    }

    // ========================================
    // Narration maintenance
    // ========================================

    /// Stored narration file names for the session's user
    pub async fn list_narrations(&self) -> Result<Vec<String>> {
        Ok(self.stores.audio.list(&self.user).await?)
    }

    /// Store `local_file` as the narration of `asset`
    ///
    /// Takes effect for the asset the next time its details are loaded.
    pub async fn put_narration(&self, asset: &AssetId, local_file: &Path) -> Result<String> {
        let name = self.stores.audio.put(&self.user, asset, local_file).await?;
        info!("Stored narration {} for {}", name, asset);
        Ok(name)
    }

    pub async fn delete_narration(&self, asset: &AssetId) -> Result<()> {
        self.stores.audio.delete(&self.user, asset).await?;
        info!("Deleted narration for {}", asset);
        Ok(())
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| Error::SessionClosed)?;
        response.await.map_err(|_| Error::SessionClosed)?
    }

    async fn query<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| Error::SessionClosed)?;
        response.await.map_err(|_| Error::SessionClosed)
    }
}
