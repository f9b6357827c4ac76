//! Client settings resolution: defaults, config file, environment, flags.

use anyhow::{Result, bail};
use directories_next::ProjectDirs;
use scan_core::ClientConfig;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Location of the per-user config file, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mri-scan").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Builds the effective client config.
///
/// An explicitly requested file must exist; the default file is optional.
pub fn load_settings(
    explicit: Option<&Path>,
    fallback: Option<&Path>,
    endpoint_flag: Option<&str>,
) -> Result<ClientConfig> {
    let mut config = match (explicit, fallback) {
        (Some(path), _) => {
            if !path.is_file() {
                bail!("config file does not exist: {}", path.display());
            }
            ClientConfig::from_file(path)?
        }
        (None, Some(path)) if path.is_file() => ClientConfig::from_file(path)?,
        _ => ClientConfig::default(),
    };

    config.apply_env();

    if let Some(endpoint) = endpoint_flag {
        config.endpoint = endpoint.to_string();
    }
    tracing::debug!(endpoint = %config.endpoint, timeout = config.request_timeout_secs, "settings loaded");
    Ok(config)
}
