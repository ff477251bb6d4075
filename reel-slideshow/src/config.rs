//! reel-slideshow configuration
//!
//! Loaded from the `[slideshow]` section of `config.toml`; every key is optional
//! and falls back to the compiled default.

use crate::error::{Error, Result};
use crate::stores::ImageSize;
use reel_common::time::millis_to_duration;
use reel_common::UserId;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "REEL_CONFIG";

/// Top-level config file layout
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReelConfig {
    #[serde(default)]
    pub slideshow: SlideshowConfig,
}

/// Slideshow session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlideshowConfig {
    /// Account used for metadata and audio store lookups
    pub user_id: String,

    /// Assets loaded together per cycle (current + lookahead)
    pub window_size: usize,

    /// Completion re-check period of a load cycle
    pub check_interval_ms: u64,

    /// Elapsed checks after which a load cycle fails
    pub load_timeout_ticks: u32,

    /// How long an asset without narration is shown
    pub slide_duration_ms: u64,

    /// Pause between narration end and advancing
    pub audio_grace_ms: u64,

    /// Narration position reporting period
    pub audio_tick_ms: u64,

    /// Requested decode size for slide images
    pub image_width: u32,
    pub image_height: u32,

    /// Event bus buffer size per session
    pub event_capacity: usize,

    /// Narration output device name; host default when unset
    pub audio_device: Option<String>,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            window_size: 3,
            check_interval_ms: 1000,
            load_timeout_ticks: 25,
            slide_duration_ms: 5000,
            audio_grace_ms: 1000,
            audio_tick_ms: 100,
            image_width: 1080,
            image_height: 1080,
            event_capacity: 256,
            audio_device: None,
        }
    }
}

impl SlideshowConfig {
    /// Resolve and load the config (CLI path, then `REEL_CONFIG`, then platform file)
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config: ReelConfig = reel_common::config::load_or_default(cli_path, CONFIG_ENV_VAR)?;
        config.slideshow.validate()?;
        Ok(config.slideshow)
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ReelConfig = reel_common::config::parse_toml(content)?;
        config.slideshow.validate()?;
        Ok(config.slideshow)
    }

    /// Reject values that would stall or spin the engine
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::Config("window_size must be at least 1".to_string()));
        }
        if self.load_timeout_ticks == 0 {
            return Err(Error::Config("load_timeout_ticks must be at least 1".to_string()));
        }
        for (name, value) in [
            ("check_interval_ms", self.check_interval_ms),
            ("slide_duration_ms", self.slide_duration_ms),
            ("audio_grace_ms", self.audio_grace_ms),
            ("audio_tick_ms", self.audio_tick_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(Error::Config("image size must be non-zero".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn user(&self) -> UserId {
        UserId::new(self.user_id.clone())
    }

    pub fn check_interval(&self) -> Duration {
        millis_to_duration(self.check_interval_ms)
    }

    pub fn slide_duration(&self) -> Duration {
        millis_to_duration(self.slide_duration_ms)
    }

    pub fn audio_grace(&self) -> Duration {
        millis_to_duration(self.audio_grace_ms)
    }

    pub fn audio_tick(&self) -> Duration {
        millis_to_duration(self.audio_tick_ms)
    }

    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.image_width, self.image_height)
    }
}
