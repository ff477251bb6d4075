//! Configuration file resolution and TOML loading

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application directory name under the platform config dir
pub const APP_DIR_NAME: &str = "photoreel";

/// Config file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Config file resolution following this priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. Platform config file (`<config dir>/photoreel/config.toml`), if it exists
/// 4. None: caller falls back to compiled defaults
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        debug!("Using config file from command line: {}", path.display());
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            debug!("Using config file from {}: {}", env_var_name, path);
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file
    if let Some(path) = default_config_path() {
        if path.exists() {
            debug!("Using platform config file: {}", path.display());
            return Some(path);
        }
    }

    // Priority 4: compiled defaults
    None
}

/// Get default configuration file path for the platform
///
/// - Linux: `~/.config/photoreel/config.toml`
/// - macOS: `~/Library/Application Support/photoreel/config.toml`
/// - Windows: `%APPDATA%\photoreel\config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Read and parse a TOML config file
///
/// A missing file is reported as `Error::NotFound` so callers can decide
/// whether to fall back to defaults.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::NotFound(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(Error::Io(e)),
    };

    parse_toml(&content).map_err(|e| match e {
        Error::Toml(inner) => Error::Config(format!("{}: {}", path.display(), inner)),
        other => other,
    })
}

/// Resolve and load a config, falling back to `T::default()` when no file applies
///
/// A file given explicitly (CLI or env) that cannot be read is an error; a
/// missing platform file is not.
pub fn load_or_default<T: DeserializeOwned + Default>(
    cli_arg: Option<&Path>,
    env_var_name: &str,
) -> Result<T> {
    match resolve_config_path(cli_arg, env_var_name) {
        Some(path) => load_toml(&path),
        None => {
            warn!("No config file found, using compiled defaults");
            Ok(T::default())
        }
    }
}
