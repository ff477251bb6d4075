//! # Photo Reel Common Library
//!
//! Shared code for the Photo Reel crates including:
//! - Asset identifier types (AssetRef, AssetId, UserId)
//! - Event types (ReelEvent enum) and the EventBus
//! - Configuration file resolution and TOML loading
//! - Time and date formatting helpers

pub mod asset;
pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use asset::{AssetId, AssetRef, AssetSource, UserId};
pub use error::{Error, Result};
