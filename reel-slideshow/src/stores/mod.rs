//! Collaborator store contracts
//!
//! The engine reads three kinds of per-asset data from stores it does not own:
//! - `MetadataStore`: location, capture time, favorite and "changed" flags
//! - `AudioStore`: recorded narration, materialized as a local file
//! - `ImageSource`: the photo itself, decoded at a requested size
//!
//! A store answering "not found" returns `Ok(None)`. `Err` is reserved for
//! failures where the store could not tell (I/O, network, decode).
//!
//! `fs` provides filesystem-backed implementations used by the command-line
//! runner and the tests.

pub mod fs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reel_common::{AssetId, AssetRef, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Collaborator failure
#[derive(Error, Debug)]
pub enum StoreError {
    /// Local file or network I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be decoded (image bytes, metadata document)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Store cannot serve this asset's source
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Structured per-asset details from the metadata store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub changed: bool,
}

/// Narration materialized on local disk
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioHandle {
    path: PathBuf,
}

impl AudioHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `file://` form used by the export path
    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// Requested decode size; images are scaled to fit inside it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Decoded RGBA image, cheap to clone
#[derive(Clone)]
pub struct DecodedImage {
    pixels: Arc<image::RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: image::RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &image::RgbaImage {
        &self.pixels
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DecodedImage({}x{})", self.width(), self.height())
    }
}

/// Keyed lookup of per-asset structured details
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// `Ok(None)` when the asset has no stored record
    async fn get(
        &self,
        user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<AssetMetadata>, StoreError>;
}

/// Narration storage keyed by user and asset
#[async_trait]
pub trait AudioStore: Send + Sync {
    /// `Ok(None)` when no narration was recorded (the 404 case)
    async fn get(&self, user: &UserId, asset: &AssetId)
        -> Result<Option<AudioHandle>, StoreError>;

    /// Names of every stored narration for `user`
    async fn list(&self, user: &UserId) -> Result<Vec<String>, StoreError>;

    /// Upload `local_file` as the narration for `asset`, returning the stored file name
    async fn put(
        &self,
        user: &UserId,
        asset: &AssetId,
        local_file: &Path,
    ) -> Result<String, StoreError>;

    /// Remove the narration for `asset`
    async fn delete(&self, user: &UserId, asset: &AssetId) -> Result<(), StoreError>;
}

/// Per-asset image fetch
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// `Ok(None)` when the asset no longer exists at its source
    async fn fetch(
        &self,
        asset: &AssetRef,
        target: ImageSize,
    ) -> Result<Option<DecodedImage>, StoreError>;
}

/// The three collaborators a session loads from
#[derive(Clone)]
pub struct Stores {
    pub metadata: Arc<dyn MetadataStore>,
    pub audio: Arc<dyn AudioStore>,
    pub images: Arc<dyn ImageSource>,
}

impl Stores {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        audio: Arc<dyn AudioStore>,
        images: Arc<dyn ImageSource>,
    ) -> Self {
        Self {
            metadata,
            audio,
            images,
        }
    }
}
