use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/predict";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENDPOINT_ENV: &str = "MRI_SCAN_ENDPOINT";
pub const TIMEOUT_ENV: &str = "MRI_SCAN_TIMEOUT_SECS";

/// Settings for reaching the classification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(raw).context("invalid client configuration")?;
        if config.request_timeout_secs == 0 {
            tracing::warn!("ignoring request_timeout_secs = 0");
            config.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        Ok(config)
    }

    /// Loads a TOML file. Keys missing from the file keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file: {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// Applies `MRI_SCAN_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENDPOINT_ENV) {
            let v = v.trim();
            if !v.is_empty() {
                self.endpoint = v.to_string();
            }
        }
        if let Some(v) = lookup(TIMEOUT_ENV) {
            match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => tracing::warn!("ignoring invalid {TIMEOUT_ENV}={v}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn defaults_point_at_local_service() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.endpoint, "http://127.0.0.1:8000/predict");
        assert_eq!(cfg.request_timeout_secs, 30);
    }

    #[test]
    fn partial_toml_keeps_defaults() -> Result<()> {
        let cfg = ClientConfig::from_toml_str("request_timeout_secs = 5\n")?;
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.request_timeout_secs, 5);
        Ok(())
    }

    #[test]
    fn zero_timeout_in_file_keeps_default() -> Result<()> {
        let cfg = ClientConfig::from_toml_str("request_timeout_secs = 0\n")?;
        assert_eq!(cfg.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        Ok(())
    }

    #[test]
    fn reads_config_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "endpoint = \"http://scanner:9000/predict\"\n")?;
        let cfg = ClientConfig::from_file(&path)?;
        assert_eq!(cfg.endpoint, "http://scanner:9000/predict");
        Ok(())
    }

    #[test]
    fn malformed_file_names_its_path() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.toml");
        fs::write(&path, "endpoint = [")?;
        let err = ClientConfig::from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
        Ok(())
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENDPOINT_ENV, "http://10.0.0.2/predict"),
            (TIMEOUT_ENV, "12"),
        ]);
        let mut cfg = ClientConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.endpoint, "http://10.0.0.2/predict");
        assert_eq!(cfg.request_timeout_secs, 12);
    }

    #[test]
    fn invalid_timeout_override_is_ignored() {
        let mut cfg = ClientConfig::default();
        cfg.apply_overrides(|k| (k == TIMEOUT_ENV).then(|| "soon".to_string()));
        assert_eq!(cfg.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        cfg.apply_overrides(|k| (k == TIMEOUT_ENV).then(|| "0".to_string()));
        assert_eq!(cfg.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }
}
