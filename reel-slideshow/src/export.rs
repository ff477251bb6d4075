//! Export records
//!
//! A `VideoExportAsset` is a flat snapshot of one asset for the video export path,
//! built fresh from published details on each export request. It does not track
//! later loads.

use crate::loader::AssetDetail;
use crate::stores::DecodedImage;
use reel_common::AssetId;
use serde::Serialize;

/// One asset as handed to the exporter
#[derive(Debug, Clone)]
pub struct VideoExportAsset {
    pub id: AssetId,
    pub image: Option<DecodedImage>,
    pub audio_url: Option<String>,
    pub location: Option<String>,
    /// Capture date as "Mar 5, 2024"
    pub date_string: Option<String>,
}

impl VideoExportAsset {
    pub fn from_detail(detail: &AssetDetail) -> Self {
        Self {
            id: detail.id().clone(),
            image: detail.image.clone(),
            audio_url: detail.audio.as_ref().map(|audio| audio.url()),
            location: detail.location.clone(),
            date_string: detail
                .captured_at
                .as_ref()
                .map(reel_common::time::format_capture_date),
        }
    }

    /// Image and narration both present
    pub fn are_details_loaded(&self) -> bool {
        self.image.is_some() && self.audio_url.is_some()
    }
}

/// Export records for `details`, in the given order
pub fn build_export<'a, I>(details: I) -> Vec<VideoExportAsset>
where
    I: IntoIterator<Item = &'a AssetDetail>,
{
    details
        .into_iter()
        .map(VideoExportAsset::from_detail)
        .collect()
}

/// Readiness counts over a set of export records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub total: usize,
    pub ready: usize,
    pub missing_image: usize,
    pub missing_audio: usize,
}

impl ExportSummary {
    pub fn of(assets: &[VideoExportAsset]) -> Self {
        assets.iter().fold(Self::default(), |mut summary, asset| {
            summary.total += 1;
            if asset.are_details_loaded() {
                summary.ready += 1;
            }
            if asset.image.is_none() {
                summary.missing_image += 1;
            }
            if asset.audio_url.is_none() {
                summary.missing_audio += 1;
            }
            summary
        })
    }

    pub fn all_ready(&self) -> bool {
        self.ready == self.total
    }
}
