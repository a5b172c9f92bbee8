use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Stdio,
    Http,
    Both,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub mode: ServerMode,
    #[serde(default)]
    pub http_addr: Option<String>,
    #[serde(default)]
    pub http_port: Option<u16>,
}

/// Retrieval cache settings. `ttl_secs: null` disables expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: Option<u64>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_secs() -> Option<u64> {
    Some(30 * 60)
}

fn default_max_entries() -> usize {
    1000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// JSON array or JSON-lines export served by the file provider.
    #[serde(default)]
    pub records_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Config {
    /// Loads YAML (`.yaml`/`.yml`) or JSON (anything else) from disk.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| AppError::FileAccessError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        let mut cfg: Config = if is_yaml {
            serde_yaml::from_str(&raw).map_err(|e| AppError::ConfigError(e.to_string()))?
        } else {
            serde_json::from_str(&raw).map_err(|e| AppError::ConfigError(e.to_string()))?
        };

        // relative record paths are resolved against the config file's directory
        if let Some(records) = cfg.provider.records_path.as_mut() {
            if records.is_relative() {
                if let Some(dir) = path.parent() {
                    *records = dir.join(&*records);
                }
            }
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn yaml_config_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "server:\n  mode: http\n  http_port: 8080\nprovider:\n  records_path: logs.jsonl\n",
        )
        .unwrap();

        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg.server.mode, ServerMode::Http);
        assert_eq!(cfg.server.http_port, Some(8080));
        assert_eq!(cfg.cache.max_entries, 1000);
        assert_eq!(cfg.cache.ttl(), Some(Duration::from_secs(1800)));
        assert_eq!(cfg.provider.records_path, Some(dir.path().join("logs.jsonl")));
    }

    #[test]
    fn json_config_can_disable_ttl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"cache": {"ttl_secs": null, "max_entries": 5}}"#).unwrap();

        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg.server.mode, ServerMode::Stdio);
        assert_eq!(cfg.cache.ttl(), None);
        assert_eq!(cfg.cache.max_entries, 5);
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Config::load_from_path(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, AppError::FileAccessError { .. }));
    }
}
