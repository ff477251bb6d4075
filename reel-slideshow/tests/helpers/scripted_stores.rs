//! In-memory collaborators with scripted timing
//!
//! Each asset gets an `AssetPlan` saying, per data kind, how long the fetch takes
//! and how it resolves. Unplanned assets resolve immediately with metadata, an
//! image, and no narration.

use async_trait::async_trait;
use reel_common::{AssetId, AssetRef, UserId};
use reel_slideshow::stores::{
    AssetMetadata, AudioHandle, AudioStore, DecodedImage, ImageSize, ImageSource, MetadataStore,
    StoreError, Stores,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a scripted fetch resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Found,
    NotFound,
    Fail,
    /// Never resolves
    Never,
}

/// Delay plus outcome for one fetch
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub delay: Duration,
    pub outcome: Outcome,
}

impl Script {
    pub fn found(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            outcome: Outcome::Found,
        }
    }

    pub fn not_found(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            outcome: Outcome::NotFound,
        }
    }

    pub fn fail(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            outcome: Outcome::Fail,
        }
    }

    pub fn never() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Outcome::Never,
        }
    }
}

/// Scripts for the three fetches of one asset
#[derive(Debug, Clone, Copy)]
pub struct AssetPlan {
    pub metadata: Script,
    pub image: Script,
    pub audio: Script,
}

impl AssetPlan {
    /// Everything resolves at once; no narration
    pub fn ready() -> Self {
        Self {
            metadata: Script::found(0),
            image: Script::found(0),
            audio: Script::not_found(0),
        }
    }

    /// Everything resolves at once, with narration
    pub fn narrated() -> Self {
        Self::ready().audio(Script::found(0))
    }

    pub fn metadata(mut self, script: Script) -> Self {
        self.metadata = script;
        self
    }

    pub fn image(mut self, script: Script) -> Self {
        self.image = script;
        self
    }

    pub fn audio(mut self, script: Script) -> Self {
        self.audio = script;
        self
    }
}

/// Narration path the scripted audio store hands out for `id`
pub fn narration_path(id: &str) -> String {
    format!("/narration/{}.m4a", id)
}

#[derive(Default)]
pub struct ScriptedStores {
    plans: Mutex<HashMap<String, AssetPlan>>,
    calls: Mutex<Vec<(String, &'static str)>>,
    narrations: Mutex<BTreeMap<String, String>>,
}

impl ScriptedStores {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn plan(&self, id: &str, plan: AssetPlan) {
        self.plans.lock().unwrap().insert(id.to_string(), plan);
    }

    /// Collaborator bundle backed by this instance
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores::new(self.clone(), self.clone(), self.clone())
    }

    /// Fetches issued so far, across all kinds
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Fetches of `kind` ("metadata", "image", "audio") issued for `id`
    pub fn calls_for(&self, id: &str, kind: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(asset, k)| asset == id && *k == kind)
            .count()
    }

    /// Record the call, wait out the script, then report found/not-found
    async fn run(&self, id: &AssetId, kind: &'static str) -> Result<bool, StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push((id.as_str().to_string(), kind));

        let plan = self
            .plans
            .lock()
            .unwrap()
            .get(id.as_str())
            .copied()
            .unwrap_or_else(AssetPlan::ready);
        let script = match kind {
            "metadata" => plan.metadata,
            "image" => plan.image,
            _ => plan.audio,
        };

        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        match script.outcome {
            Outcome::Found => Ok(true),
            Outcome::NotFound => Ok(false),
            Outcome::Fail => Err(StoreError::Backend(format!("scripted {} failure", kind))),
            Outcome::Never => std::future::pending().await,
        }
    }
}

#[async_trait]
impl MetadataStore for ScriptedStores {
    async fn get(
        &self,
        _user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<AssetMetadata>, StoreError> {
        let found = self.run(asset, "metadata").await?;
        Ok(found.then(|| AssetMetadata {
            location: Some(format!("Place of {}", asset)),
            ..Default::default()
        }))
    }
}

#[async_trait]
impl ImageSource for ScriptedStores {
    async fn fetch(
        &self,
        asset: &AssetRef,
        _target: ImageSize,
    ) -> Result<Option<DecodedImage>, StoreError> {
        let found = self.run(&asset.id, "image").await?;
        Ok(found.then(|| DecodedImage::new(image::RgbaImage::new(2, 2))))
    }
}

#[async_trait]
impl AudioStore for ScriptedStores {
    async fn get(
        &self,
        _user: &UserId,
        asset: &AssetId,
    ) -> Result<Option<AudioHandle>, StoreError> {
        let found = self.run(asset, "audio").await?;
        Ok(found.then(|| AudioHandle::new(narration_path(asset.as_str()))))
    }

    async fn list(&self, _user: &UserId) -> Result<Vec<String>, StoreError> {
        Ok(self.narrations.lock().unwrap().values().cloned().collect())
    }

    async fn put(
        &self,
        _user: &UserId,
        asset: &AssetId,
        local_file: &Path,
    ) -> Result<String, StoreError> {
        let ext = local_file
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("m4a");
        let name = format!("{}.{}", asset, ext);
        self.narrations
            .lock()
            .unwrap()
            .insert(asset.as_str().to_string(), name.clone());
        Ok(name)
    }

    async fn delete(&self, _user: &UserId, asset: &AssetId) -> Result<(), StoreError> {
        self.narrations.lock().unwrap().remove(asset.as_str());
        Ok(())
    }
}
