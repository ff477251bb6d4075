//! Load windows: the current asset plus its lookahead

use reel_common::{AssetId, AssetRef};

/// A run of consecutive assets loaded together as one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWindow {
    /// Index of the first asset in the caller's ordered list
    pub anchor: usize,
    pub assets: Vec<AssetRef>,
}

impl LoadWindow {
    pub fn new(anchor: usize, assets: Vec<AssetRef>) -> Self {
        Self { anchor, assets }
    }

    /// Window of up to `size` assets starting at `anchor`, clipped at the list end
    ///
    /// Returns None when `anchor` is past the end of `list`.
    pub fn for_anchor(list: &[AssetRef], anchor: usize, size: usize) -> Option<Self> {
        if anchor >= list.len() {
            return None;
        }
        let end = anchor.saturating_add(size.max(1)).min(list.len());
        Some(Self::new(anchor, list[anchor..end].to_vec()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Assets paired with their position in the full list
    pub fn positioned(&self) -> impl Iterator<Item = (usize, &AssetRef)> {
        self.assets
            .iter()
            .enumerate()
            .map(move |(offset, asset)| (self.anchor + offset, asset))
    }

    pub fn ids(&self) -> Vec<AssetId> {
        self.assets.iter().map(|asset| asset.id.clone()).collect()
    }
}
