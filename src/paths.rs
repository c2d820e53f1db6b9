//! Path resolution for custom-provider
//!
//! # Environment Variables
//!
//! - `CUSTOM_PROVIDER_CONFIG` - Override the configuration file
//! - `CUSTOM_PROVIDER_STATE` - Override the state file
//! - `CUSTOM_PROVIDER_STAGING_DIR` - Override the parent of staging directories
//!
//! # Resolution Priority
//!
//! For config_file():
//! 1. `--config` flag (or `CUSTOM_PROVIDER_CONFIG`)
//! 2. `custom.toml` in the working directory, if it exists
//! 3. `<config dir>/custom-provider/custom.toml`, if it exists
//! 4. `custom.toml` in the working directory
//!
//! For state_file():
//! 1. `--state` flag (or `CUSTOM_PROVIDER_STATE`)
//! 2. Next to the config file: `custom.toml` -> `custom.state.json`
//!
//! For staging_dir():
//! 1. `CUSTOM_PROVIDER_STAGING_DIR`
//! 2. `settings.staging_dir` from the config file
//! 3. None - staging directories go into the working directory

use std::path::{Path, PathBuf};

/// Environment variable for config file override
pub const ENV_CONFIG_FILE: &str = "CUSTOM_PROVIDER_CONFIG";

/// Environment variable for state file override
pub const ENV_STATE_FILE: &str = "CUSTOM_PROVIDER_STATE";

/// Environment variable for staging directory override
pub const ENV_STAGING_DIR: &str = "CUSTOM_PROVIDER_STAGING_DIR";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "custom.toml";

/// Resolve the configuration file
pub fn config_file(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return expand(&path.to_string_lossy());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }

    if let Some(dir) = dirs::config_dir() {
        let path = dir.join("custom-provider").join(CONFIG_FILE_NAME);
        if path.exists() {
            log::debug!("Using config file from config dir: {}", path.display());
            return path;
        }
    }

    local
}

/// Resolve the state file for a config file
pub fn state_file(flag: Option<&Path>, config: &Path) -> PathBuf {
    match flag {
        Some(path) => expand(&path.to_string_lossy()),
        None => config.with_extension("state.json"),
    }
}

/// Resolve the parent directory for staging directories
pub fn staging_dir(configured: Option<&str>) -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STAGING_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using staging dir from {}: {}",
            ENV_STAGING_DIR,
            path.display()
        );
        return Some(path);
    }
    configured.map(expand)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
