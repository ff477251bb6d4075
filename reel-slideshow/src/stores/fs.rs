//! Filesystem-backed stores
//!
//! Layout under a store root:
//!
//! ```text
//! <root>/<user>/metadata/<asset>.json
//! <root>/<user>/audio/<asset>.<ext>
//! ```
//!
//! Device images are read from a library folder, with the asset id as the path
//! relative to that folder.

use super::{
    AssetMetadata, AudioHandle, AudioStore, DecodedImage, ImageSize, ImageSource, MetadataStore,
    StoreError,
};
use async_trait::async_trait;
use reel_common::{AssetId, AssetRef, AssetSource, UserId};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Narration file extensions recognised by `FsAudioStore`
pub const AUDIO_EXTENSIONS: &[&str] = &["m4a", "mp3", "wav", "aac", "ogg", "flac"];

/// Photo extensions picked up by `FsImageSource::scan`
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// Map an identifier to a single path component
///
/// Device library identifiers may contain `/`, which must not create subfolders.
fn path_component(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            other => other,
        })
        .collect()
}

fn file_stem_for(asset: &AssetId) -> String {
    path_component(asset.as_str())
}

fn user_dir(root: &Path, user: &UserId) -> PathBuf {
    root.join(path_component(user.as_str()))
}

/// Metadata records stored as JSON sidecar files
#[derive(Debug, Clone)]
pub struct FsMetadataStore {
    root: PathBuf,
}

impl FsMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn record_path(&self, user: &UserId, asset: &AssetId) -> PathBuf {
        user_dir(&self.root, user)
            .join("metadata")
            .join(format!("{}.json", file_stem_for(asset)))
    }
}

#[async_trait]
impl MetadataStore for FsMetadataStore {
    async fn get(
        &self,
        user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<AssetMetadata>, StoreError> {
        let path = self.record_path(user, asset);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No metadata record for {}", asset);
                return Ok(None);
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Decode(format!("{}: {}", path.display(), e)))
    }
}

/// Narrations stored as audio files, one per asset
#[derive(Debug, Clone)]
pub struct FsAudioStore {
    root: PathBuf,
}

impl FsAudioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn audio_dir(&self, user: &UserId) -> PathBuf {
        user_dir(&self.root, user).join("audio")
    }

    /// Existing narration files for `asset`, any recognised extension
    async fn find(&self, user: &UserId, asset: &AssetId) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.audio_dir(user);
        let stem = file_stem_for(asset);
        let mut found = Vec::new();

        for ext in AUDIO_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", stem, ext));
            match tokio::fs::metadata(&candidate).await {
                Ok(meta) if meta.is_file() => found.push(candidate),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(e)),
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl AudioStore for FsAudioStore {
    async fn get(
        &self,
        user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<AudioHandle>, StoreError> {
        let found = self.find(user, asset).await?;
        Ok(found.into_iter().next().map(AudioHandle::new))
    }

    async fn list(&self, user: &UserId) -> Result<Vec<String>, StoreError> {
        let dir = self.audio_dir(user);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let recognised = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if recognised {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn put(
        &self,
        user: &UserId,
        asset: &AssetId,
        local_file: &Path,
    ) -> Result<String, StoreError> {
        let ext = local_file
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "m4a".to_string());
        if !AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            return Err(StoreError::Unsupported(format!(
                "audio extension '{}' for {}",
                ext,
                local_file.display()
            )));
        }

        let dir = self.audio_dir(user);
        tokio::fs::create_dir_all(&dir).await?;

        // One narration per asset: drop a previous recording in another format
        for old in self.find(user, asset).await? {
            tokio::fs::remove_file(&old).await?;
        }

        let file_name = format!("{}.{}", file_stem_for(asset), ext);
        tokio::fs::copy(local_file, dir.join(&file_name)).await?;
        debug!("Stored narration {} for {}", file_name, asset);
        Ok(file_name)
    }

    async fn delete(&self, user: &UserId, asset: &AssetId) -> Result<(), StoreError> {
        let found = self.find(user, asset).await?;
        if found.is_empty() {
            debug!("No narration to delete for {}", asset);
        }
        for path in found {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

/// Device photos read from a library folder
#[derive(Debug, Clone)]
pub struct FsImageSource {
    library_root: PathBuf,
}

impl FsImageSource {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
        }
    }

    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Every photo under the library folder, sorted by relative path
    ///
    /// Hidden files and folders are skipped. Unreadable entries are logged and
    /// skipped rather than aborting the scan.
    pub fn scan(&self) -> Result<Vec<AssetRef>, StoreError> {
        if !self.library_root.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("library folder {} not found", self.library_root.display()),
            )));
        }

        let walker = WalkDir::new(&self.library_root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        let mut assets = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error accessing library entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_image_file(entry.path()) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.library_root) else {
                continue;
            };
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            assets.push(AssetRef::device(id));
        }

        debug!(
            "Library scan of {} found {} photos",
            self.library_root.display(),
            assets.len()
        );
        Ok(assets)
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Decode and scale down to fit `target`; smaller images keep their size
fn decode_to_fit(bytes: &[u8], target: ImageSize) -> Result<DecodedImage, StoreError> {
    let image =
        image::load_from_memory(bytes).map_err(|e| StoreError::Decode(e.to_string()))?;

    let image = if image.width() > target.width || image.height() > target.height {
        image.thumbnail(target.width, target.height)
    } else {
        image
    };

    Ok(DecodedImage::new(image.to_rgba8()))
}

#[async_trait]
impl ImageSource for FsImageSource {
    async fn fetch(
        &self,
        asset: &AssetRef,
        target: ImageSize,
    ) -> Result<Option<DecodedImage>, StoreError> {
        if asset.source != AssetSource::Device {
            return Err(StoreError::Unsupported(format!(
                "{} asset {} is not in the local library",
                asset.source, asset.id
            )));
        }

        let path = self.library_root.join(asset.id.as_str());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Library image missing: {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let decoded = tokio::task::spawn_blocking(move || decode_to_fit(&bytes, target))
            .await
            .map_err(|e| StoreError::Backend(format!("decode task failed: {}", e)))??;

        Ok(Some(decoded))
    }
}
