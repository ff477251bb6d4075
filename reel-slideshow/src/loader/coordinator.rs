//! Load coordinator - concurrent per-asset fetching with a window barrier
//!
//! **Responsibilities:**
//! - Fan out metadata, image and audio fetches for every asset in a window
//! - Track per-asset progress in `LoadStatus` records keyed by asset id
//! - Publish each asset's detail once, when all three kinds have resolved
//! - Report the window through its completion callback: success as soon as every
//!   asset is complete, failure when the tick ceiling is reached first
//!
//! **Single writer:** fetches run as tokio tasks and only post `LoaderMsg`s back to
//! the coordinator's inbox. All record mutation happens in `handle()`, called by
//! whoever owns the coordinator (the sequencer actor, or a test loop).
//!
//! **Retention:** records live until `retain_window()` drops the assets outside
//! the window the owner is moving to, or until `reset_cycle()`.
//!
//! **Epochs:** `reset_cycle()` bumps the epoch. Messages tagged with an older
//! epoch are dropped, so a fetch that resolves after a reset cannot touch the new
//! session's records.

use super::detail::AssetDetail;
use super::status::{FetchKind, FetchState, LoadStatus};
use super::window::LoadWindow;
use crate::config::SlideshowConfig;
use crate::stores::{AssetMetadata, AudioHandle, DecodedImage, ImageSize, StoreError, Stores};
use crate::timer::{Timer, TimerControl};
use reel_common::{AssetId, AssetRef, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

/// Invoked exactly once per cycle with the cycle's result, unless the cycle is
/// superseded or reset first
pub type CompletionCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Loader settings derived from the session config
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub user: UserId,
    pub check_interval: Duration,
    pub timeout_ticks: u32,
    pub image_size: ImageSize,
}

impl From<&SlideshowConfig> for LoaderConfig {
    fn from(config: &SlideshowConfig) -> Self {
        Self {
            user: config.user(),
            check_interval: config.check_interval(),
            timeout_ticks: config.load_timeout_ticks,
            image_size: config.image_size(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::from(&SlideshowConfig::default())
    }
}

/// Result of one store call
#[derive(Debug)]
pub enum FetchOutcome {
    Metadata(Result<Option<AssetMetadata>, StoreError>),
    Image(Result<Option<DecodedImage>, StoreError>),
    Audio(Result<Option<AudioHandle>, StoreError>),
}

impl FetchOutcome {
    pub fn kind(&self) -> FetchKind {
        match self {
            FetchOutcome::Metadata(_) => FetchKind::Metadata,
            FetchOutcome::Image(_) => FetchKind::Image,
            FetchOutcome::Audio(_) => FetchKind::Audio,
        }
    }
}

/// Messages posted to the coordinator's inbox
#[derive(Debug)]
pub enum LoaderMsg {
    /// A fetch task finished
    Fetched {
        epoch: u64,
        asset: AssetId,
        outcome: FetchOutcome,
    },
    /// Completion re-check tick of a pending cycle
    Tick { epoch: u64, cycle: u64, tick: u64 },
}

/// The window currently waiting for completion
struct PendingCycle {
    id: u64,
    anchor: usize,
    window: Vec<AssetId>,
    on_complete: Option<CompletionCallback>,
    elapsed_ticks: u32,
    /// Dropping the cycle cancels the tick
    _ticker: Timer,
}

/// Orchestrates per-window loading across the three stores
pub struct LoadCoordinator {
    stores: Stores,
    config: LoaderConfig,

    /// Bumped by `reset_cycle()`; guards against stale fetch results
    epoch: u64,
    next_cycle_id: u64,

    /// Detail records under construction or complete, keyed by asset
    details: HashMap<AssetId, AssetDetail>,
    statuses: HashMap<AssetId, LoadStatus>,
    /// Complete details, kept sorted by list position
    published: Vec<Arc<AssetDetail>>,

    in_flight: HashMap<(AssetId, FetchKind), AbortHandle>,
    cycle: Option<PendingCycle>,

    tx: mpsc::UnboundedSender<LoaderMsg>,
    rx: mpsc::UnboundedReceiver<LoaderMsg>,

    fetches_started: u64,
}

impl LoadCoordinator {
    pub fn new(stores: Stores, config: LoaderConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            stores,
            config,
            epoch: 0,
            next_cycle_id: 0,
            details: HashMap::new(),
            statuses: HashMap::new(),
            published: Vec::new(),
            in_flight: HashMap::new(),
            cycle: None,
            tx,
            rx,
            fetches_started: 0,
        }
    }

    /// Next message for `handle()`
    ///
    /// Never returns None: the coordinator holds a sender to its own inbox.
    pub async fn recv(&mut self) -> Option<LoaderMsg> {
        self.rx.recv().await
    }

    /// Start loading `window`, calling `on_complete` with the outcome
    ///
    /// Assets already complete are skipped; kinds already in flight are not
    /// fetched again. If the whole window is already complete, `on_complete(true)`
    /// runs before this returns and no tick is started.
    ///
    /// A cycle still pending is superseded: its tick stops and its callback is
    /// dropped without being called.
    pub fn begin_load_cycle(&mut self, window: LoadWindow, on_complete: CompletionCallback) {
        if let Some(previous) = self.cycle.take() {
            debug!(
                "Load cycle {} (anchor {}) superseded after {} ticks",
                previous.id, previous.anchor, previous.elapsed_ticks
            );
        }

        if window.is_empty() {
            debug!("Empty load window at anchor {}, nothing to load", window.anchor);
            on_complete(true);
            return;
        }

        self.next_cycle_id += 1;
        let cycle_id = self.next_cycle_id;
        let mut spawned = 0usize;

        for (position, asset) in window.positioned() {
            let status = self
                .statuses
                .entry(asset.id.clone())
                .or_insert_with(|| LoadStatus::new(asset.id.clone()));
            if status.is_complete() {
                continue;
            }

            let kinds = status.kinds_to_fetch();
            for kind in &kinds {
                status.set(*kind, FetchState::InFlight);
            }

            self.details
                .entry(asset.id.clone())
                .or_insert_with(|| AssetDetail::new(asset.clone(), position))
                .index = position;

            for kind in kinds {
                self.spawn_fetch(asset.clone(), kind);
                spawned += 1;
            }
        }

        let ids = window.ids();
        if self.all_complete(&ids) {
            debug!(
                "Load window at anchor {} already complete ({} assets)",
                window.anchor,
                ids.len()
            );
            on_complete(true);
            return;
        }

        info!(
            "Load cycle {} started: anchor {}, {} assets, {} fetches",
            cycle_id,
            window.anchor,
            ids.len(),
            spawned
        );

        let tx = self.tx.clone();
        let epoch = self.epoch;
        let ticker = Timer::repeating(self.config.check_interval, move |tick| {
            match tx.send(LoaderMsg::Tick {
                epoch,
                cycle: cycle_id,
                tick,
            }) {
                Ok(()) => TimerControl::Continue,
                Err(_) => TimerControl::Stop,
            }
        });

        self.cycle = Some(PendingCycle {
            id: cycle_id,
            anchor: window.anchor,
            window: ids,
            on_complete: Some(on_complete),
            elapsed_ticks: 0,
            _ticker: ticker,
        });
    }

    /// Apply one inbox message
    pub fn handle(&mut self, msg: LoaderMsg) {
        match msg {
            LoaderMsg::Fetched {
                epoch,
                asset,
                outcome,
            } => {
                if epoch != self.epoch {
                    trace!(
                        "Dropping stale {} result for {} (epoch {} != {})",
                        outcome.kind(),
                        asset,
                        epoch,
                        self.epoch
                    );
                    return;
                }
                self.apply_outcome(asset, outcome);
                self.evaluate_cycle(false);
            }
            LoaderMsg::Tick { epoch, cycle, tick } => {
                if epoch != self.epoch {
                    return;
                }
                match self.cycle.as_mut() {
                    Some(pending) if pending.id == cycle => {
                        pending.elapsed_ticks += 1;
                        trace!(
                            "Load cycle {} tick {} ({} elapsed)",
                            cycle,
                            tick,
                            pending.elapsed_ticks
                        );
                    }
                    _ => return,
                }
                self.evaluate_cycle(true);
            }
        }
    }

    /// Cancel everything and forget all loaded state
    ///
    /// The pending callback, if any, is dropped without being called. Results of
    /// fetches already running are ignored when they arrive.
    pub fn reset_cycle(&mut self) {
        self.epoch += 1;
        if let Some(pending) = self.cycle.take() {
            debug!("Load cycle {} cancelled by reset", pending.id);
        }
        for (_, handle) in self.in_flight.drain() {
            handle.abort();
        }
        self.details.clear();
        self.statuses.clear();
        self.published.clear();
        info!("Load coordinator reset (epoch {})", self.epoch);
    }

    /// Published details, in list order
    pub fn published_details(&self) -> Vec<Arc<AssetDetail>> {
        self.published.clone()
    }

    /// Published detail for `id`
    pub fn detail(&self, id: &AssetId) -> Option<Arc<AssetDetail>> {
        self.published.iter().find(|d| d.id() == id).cloned()
    }

    /// Forget every asset outside `window` whose fetches have all settled
    ///
    /// Assets with a fetch still in flight are kept until a later call, so a
    /// result never lands on a record that was dropped and recreated. Returns
    /// the number of assets dropped.
    pub fn retain_window(&mut self, window: &LoadWindow) -> usize {
        let keep: HashSet<&AssetId> = window.assets.iter().map(|asset| &asset.id).collect();
        let evict: HashSet<AssetId> = self
            .statuses
            .iter()
            .filter(|(id, status)| !keep.contains(id) && !status.is_in_flight())
            .map(|(id, _)| id.clone())
            .collect();
        if evict.is_empty() {
            return 0;
        }

        self.statuses.retain(|id, _| !evict.contains(id));
        self.details.retain(|id, _| !evict.contains(id));
        self.published.retain(|detail| !evict.contains(detail.id()));
        debug!(
            "Dropped {} assets outside window at {}, {} retained",
            evict.len(),
            window.anchor,
            self.statuses.len()
        );
        evict.len()
    }

    pub fn status(&self, id: &AssetId) -> Option<&LoadStatus> {
        self.statuses.get(id)
    }

    /// True once all three kinds of `id` have resolved
    pub fn is_loaded(&self, id: &AssetId) -> bool {
        self.statuses.get(id).map_or(false, LoadStatus::is_complete)
    }

    pub fn is_cycle_pending(&self) -> bool {
        self.cycle.is_some()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Store calls issued since creation
    pub fn fetches_started(&self) -> u64 {
        self.fetches_started
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn user(&self) -> &UserId {
        &self.config.user
    }

    fn spawn_fetch(&mut self, asset: AssetRef, kind: FetchKind) {
        let tx = self.tx.clone();
        let epoch = self.epoch;
        let stores = self.stores.clone();
        let user = self.config.user.clone();
        let image_size = self.config.image_size;
        let key = (asset.id.clone(), kind);

        trace!("Fetching {} for {}", kind, asset.id);
        let handle = tokio::spawn(async move {
            let outcome = match kind {
                FetchKind::Metadata => {
                    FetchOutcome::Metadata(stores.metadata.get(&user, &asset.id).await)
                }
                FetchKind::Image => {
                    FetchOutcome::Image(stores.images.fetch(&asset, image_size).await)
                }
                FetchKind::Audio => FetchOutcome::Audio(stores.audio.get(&user, &asset.id).await),
            };
            // Inbox outlives every fetch unless the coordinator was dropped
            let _ = tx.send(LoaderMsg::Fetched {
                epoch,
                asset: asset.id,
                outcome,
            });
        });

        self.in_flight.insert(key, handle.abort_handle());
        self.fetches_started += 1;
    }

    fn apply_outcome(&mut self, asset: AssetId, outcome: FetchOutcome) {
        let kind = outcome.kind();
        self.in_flight.remove(&(asset.clone(), kind));

        let (Some(status), Some(detail)) =
            (self.statuses.get_mut(&asset), self.details.get_mut(&asset))
        else {
            warn!("{} result for untracked asset {}", kind, asset);
            return;
        };

        let new_state = match outcome {
            FetchOutcome::Metadata(Ok(Some(metadata))) => {
                detail.apply_metadata(metadata);
                FetchState::Loaded
            }
            FetchOutcome::Metadata(Ok(None)) => {
                debug!("No metadata record for {}, using defaults", asset);
                FetchState::Loaded
            }
            FetchOutcome::Image(Ok(Some(image))) => {
                detail.image = Some(image);
                FetchState::Loaded
            }
            FetchOutcome::Image(Ok(None)) => {
                warn!("Image for {} not found, presenting placeholder", asset);
                FetchState::Loaded
            }
            FetchOutcome::Audio(Ok(Some(handle))) => {
                detail.audio = Some(handle);
                FetchState::Loaded
            }
            FetchOutcome::Audio(Ok(None)) => {
                debug!("No narration recorded for {}", asset);
                FetchState::Loaded
            }
            FetchOutcome::Metadata(Err(e))
            | FetchOutcome::Image(Err(e))
            | FetchOutcome::Audio(Err(e)) => {
                warn!("Fetching {} for {} failed: {}", kind, asset, e);
                FetchState::Failed
            }
        };

        let was_complete = status.is_complete();
        status.set(kind, new_state);
        let now_complete = status.is_complete();

        if !was_complete && now_complete {
            self.publish(&asset);
        }
    }

    /// Insert the complete detail for `id` at its list position, unless already
    /// published
    fn publish(&mut self, id: &AssetId) {
        if self.published.iter().any(|d| d.id() == id) {
            return;
        }
        if let Some(detail) = self.details.get(id) {
            debug!("Asset {} complete (position {})", id, detail.index);
            let at = self.published.partition_point(|d| d.index < detail.index);
            self.published.insert(at, Arc::new(detail.clone()));
        }
    }

    /// Finish the pending cycle if its window is complete, or if a tick reached
    /// the ceiling first
    fn evaluate_cycle(&mut self, on_tick: bool) {
        let Some(pending) = self.cycle.as_ref() else {
            return;
        };

        if self.all_complete(&pending.window) {
            self.finish_cycle(true);
        } else if on_tick && pending.elapsed_ticks >= self.config.timeout_ticks {
            self.finish_cycle(false);
        }
    }

    fn finish_cycle(&mut self, success: bool) {
        let Some(mut pending) = self.cycle.take() else {
            return;
        };

        if success {
            info!(
                "Load cycle {} complete: anchor {}, {} assets after {} ticks",
                pending.id,
                pending.anchor,
                pending.window.len(),
                pending.elapsed_ticks
            );
        } else {
            let (failed, stalled): (Vec<&AssetId>, Vec<&AssetId>) = pending
                .window
                .iter()
                .filter(|id| !self.is_loaded(id))
                .partition(|id| self.statuses.get(*id).map_or(false, LoadStatus::has_failure));
            warn!(
                "Load cycle {} timed out after {} ticks: anchor {}, failed {:?}, unresolved {:?}",
                pending.id, pending.elapsed_ticks, pending.anchor, failed, stalled
            );
        }

        if let Some(on_complete) = pending.on_complete.take() {
            on_complete(success);
        }
    }

    fn all_complete(&self, ids: &[AssetId]) -> bool {
        ids.iter().all(|id| self.is_loaded(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{AudioStore, ImageSource, MetadataStore};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Stores that answer immediately: metadata and image present, no narration
    struct InstantStores;

    #[async_trait]
    impl MetadataStore for InstantStores {
        async fn get(
            &self,
            _user: &UserId,
            _asset: &AssetId,
        ) -> Result<Option<AssetMetadata>, StoreError> {
            Ok(Some(AssetMetadata::default()))
        }
    }

    #[async_trait]
    impl AudioStore for InstantStores {
        async fn get(
            &self,
            _user: &UserId,
            _asset: &AssetId,
        ) -> Result<Option<AudioHandle>, StoreError> {
            Ok(None)
        }
        async fn list(&self, _user: &UserId) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
        async fn put(
            &self,
            _user: &UserId,
            _asset: &AssetId,
            _local_file: &Path,
        ) -> Result<String, StoreError> {
            Err(StoreError::Unsupported("read-only".to_string()))
        }
        async fn delete(&self, _user: &UserId, _asset: &AssetId) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ImageSource for InstantStores {
        async fn fetch(
            &self,
            _asset: &AssetRef,
            _target: ImageSize,
        ) -> Result<Option<DecodedImage>, StoreError> {
            Ok(Some(DecodedImage::new(image::RgbaImage::new(2, 2))))
        }
    }

    fn coordinator() -> LoadCoordinator {
        let stores = Arc::new(InstantStores);
        LoadCoordinator::new(
            Stores::new(stores.clone(), stores.clone(), stores),
            LoaderConfig::default(),
        )
    }

    fn recorder() -> (Arc<Mutex<Vec<bool>>>, CompletionCallback) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        (
            results,
            Box::new(move |ok| sink.lock().unwrap().push(ok)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_window_completes_immediately() {
        let mut coord = coordinator();
        let (results, callback) = recorder();

        coord.begin_load_cycle(LoadWindow::new(0, Vec::new()), callback);

        assert_eq!(*results.lock().unwrap(), vec![true]);
        assert_eq!(coord.fetches_started(), 0);
        assert!(!coord.is_cycle_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_epoch_result_ignored() {
        let mut coord = coordinator();
        let (_results, callback) = recorder();
        let asset = AssetRef::device("IMG_1");

        coord.begin_load_cycle(LoadWindow::new(0, vec![asset.clone()]), callback);
        let old_epoch = coord.epoch();
        coord.reset_cycle();
        assert!(coord.status(&asset.id).is_none());

        coord.handle(LoaderMsg::Fetched {
            epoch: old_epoch,
            asset: asset.id.clone(),
            outcome: FetchOutcome::Audio(Ok(None)),
        });

        assert!(coord.status(&asset.id).is_none());
        assert!(coord.published_details().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_callback_is_dropped() {
        let mut coord = coordinator();
        let (first, first_cb) = recorder();
        let (second, second_cb) = recorder();

        coord.begin_load_cycle(LoadWindow::new(0, vec![AssetRef::device("a")]), first_cb);
        coord.begin_load_cycle(LoadWindow::new(1, vec![AssetRef::device("b")]), second_cb);

        while coord.is_cycle_pending() {
            let msg = coord.recv().await.unwrap();
            coord.handle(msg);
        }

        assert!(first.lock().unwrap().is_empty());
        assert_eq!(*second.lock().unwrap(), vec![true]);
    }
}
