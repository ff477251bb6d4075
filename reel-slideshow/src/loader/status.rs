//! Per-asset load tracking

use reel_common::AssetId;

/// The three independently fetched data kinds of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Metadata,
    Image,
    Audio,
}

impl FetchKind {
    pub const ALL: [FetchKind; 3] = [FetchKind::Metadata, FetchKind::Image, FetchKind::Audio];
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchKind::Metadata => write!(f, "metadata"),
            FetchKind::Image => write!(f, "image"),
            FetchKind::Audio => write!(f, "audio"),
        }
    }
}

/// Progress of one fetch kind for one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    NotAttempted,
    InFlight,
    /// Resolved, including "not found" answers treated as empty
    Loaded,
    /// Failed for the rest of the current cycle
    Failed,
}

impl FetchState {
    /// A new cycle fetches kinds that never ran or failed last time
    pub fn needs_fetch(self) -> bool {
        matches!(self, FetchState::NotAttempted | FetchState::Failed)
    }
}

/// Load tracking record for one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStatus {
    pub id: AssetId,
    pub details: FetchState,
    pub image: FetchState,
    pub audio: FetchState,
}

impl LoadStatus {
    pub fn new(id: AssetId) -> Self {
        Self {
            id,
            details: FetchState::NotAttempted,
            image: FetchState::NotAttempted,
            audio: FetchState::NotAttempted,
        }
    }

    pub fn get(&self, kind: FetchKind) -> FetchState {
        match kind {
            FetchKind::Metadata => self.details,
            FetchKind::Image => self.image,
            FetchKind::Audio => self.audio,
        }
    }

    pub fn set(&mut self, kind: FetchKind, state: FetchState) {
        match kind {
            FetchKind::Metadata => self.details = state,
            FetchKind::Image => self.image = state,
            FetchKind::Audio => self.audio = state,
        }
    }

    /// All three kinds resolved
    pub fn is_complete(&self) -> bool {
        FetchKind::ALL
            .iter()
            .all(|kind| self.get(*kind) == FetchState::Loaded)
    }

    /// Any kind failed in the current cycle
    pub fn has_failure(&self) -> bool {
        FetchKind::ALL
            .iter()
            .any(|kind| self.get(*kind) == FetchState::Failed)
    }

    /// Any kind still waiting on its store
    pub fn is_in_flight(&self) -> bool {
        FetchKind::ALL
            .iter()
            .any(|kind| self.get(*kind) == FetchState::InFlight)
    }

    /// Kinds a new cycle must fetch
    pub fn kinds_to_fetch(&self) -> Vec<FetchKind> {
        FetchKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).needs_fetch())
            .collect()
    }
}
