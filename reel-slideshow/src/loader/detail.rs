//! Per-asset detail record
//!
//! Built up by the coordinator as fetches resolve; published as an immutable
//! `Arc<AssetDetail>` snapshot once all three data kinds are resolved.

use crate::stores::{AssetMetadata, AudioHandle, DecodedImage};
use chrono::{DateTime, Utc};
use reel_common::time::format_capture_date;
use reel_common::{AssetId, AssetRef};

/// Everything the slideshow needs to present one asset
#[derive(Debug, Clone)]
pub struct AssetDetail {
    pub asset: AssetRef,
    /// Position in the caller's ordered asset list
    pub index: usize,
    pub location: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub is_favorite: bool,
    pub changed_by_user: bool,
    /// None renders as a placeholder
    pub image: Option<DecodedImage>,
    /// None means no narration was recorded
    pub audio: Option<AudioHandle>,
}

impl AssetDetail {
    pub fn new(asset: AssetRef, index: usize) -> Self {
        Self {
            asset,
            index,
            location: None,
            captured_at: None,
            is_favorite: false,
            changed_by_user: false,
            image: None,
            audio: None,
        }
    }

    pub fn id(&self) -> &AssetId {
        &self.asset.id
    }

    pub fn apply_metadata(&mut self, metadata: AssetMetadata) {
        self.location = metadata.location;
        self.captured_at = metadata.captured_at;
        self.is_favorite = metadata.is_favorite;
        self.changed_by_user = metadata.changed;
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Caption line: "Location · Mar 5, 2024", either part optional
    pub fn caption(&self) -> Option<String> {
        let date = self.captured_at.as_ref().map(format_capture_date);
        match (self.location.as_deref(), date) {
            (Some(location), Some(date)) => Some(format!("{} · {}", location, date)),
            (Some(location), None) => Some(location.to_string()),
            (None, Some(date)) => Some(date),
            (None, None) => None,
        }
    }
}
