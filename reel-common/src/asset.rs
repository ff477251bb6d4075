//! Asset identifier types
//!
//! An asset is one user-selected photo. The identifier is opaque to the engine;
//! the source tag tells collaborators which store holds the asset's pixels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque asset identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Account identifier used to key the remote metadata and audio stores
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an asset's image lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSource {
    /// On-device photo library
    Device,
    /// Linked cloud photo account
    Cloud,
}

impl fmt::Display for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSource::Device => write!(f, "device"),
            AssetSource::Cloud => write!(f, "cloud"),
        }
    }
}

/// Immutable reference to a user-selected asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRef {
    pub id: AssetId,
    pub source: AssetSource,
}

impl AssetRef {
    pub fn new(id: impl Into<AssetId>, source: AssetSource) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }

    /// Shorthand for an on-device asset
    pub fn device(id: impl Into<AssetId>) -> Self {
        Self::new(id, AssetSource::Device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_display_and_conversion() {
        let id = AssetId::from("IMG_0042");
        assert_eq!(id.to_string(), "IMG_0042");
        assert_eq!(id.as_str(), "IMG_0042");
        assert_eq!(id, AssetId::new(String::from("IMG_0042")));
    }

    #[test]
    fn test_asset_ref_serializes_source_lowercase() {
        let asset = AssetRef::new("abc", AssetSource::Cloud);
        let json = serde_json::to_string(&asset).unwrap();
        assert_eq!(json, r#"{"id":"abc","source":"cloud"}"#);

        let back: AssetRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, asset);
    }

    #[test]
    fn test_device_shorthand() {
        let asset = AssetRef::device("local-1");
        assert_eq!(asset.source, AssetSource::Device);
        assert_eq!(asset.id.as_str(), "local-1");
    }
}
