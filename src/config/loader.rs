//! Configuration Loader
//!
//! Handles loading and merging gateway entries from multiple sources.

use crate::config::gateway::GatewayConfig;
use crate::error::{Result, WahaError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable pointing at an explicit config file
pub const CONFIG_PATH_ENV: &str = "WAHA_BRIDGE_CONFIG";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Gateway configurations keyed by configuration-entry id
    #[serde(default)]
    pub entries: HashMap<String, GatewayConfig>,
}

/// Configuration loader with support for multiple sources
pub struct ConfigLoader {
    config: BridgeConfig,
}

impl ConfigLoader {
    /// Create a new config loader and load from default locations
    pub fn new() -> Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut loader = Self {
            config: BridgeConfig::default(),
        };
        loader.load_from_default_paths()?;

        Ok(loader)
    }

    /// Create a loader with a specific config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut loader = Self {
            config: BridgeConfig::default(),
        };
        loader.load_from_file(path)?;

        Ok(loader)
    }

    /// Load configuration from default paths
    fn load_from_default_paths(&mut self) -> Result<()> {
        for path in Self::get_config_paths() {
            if path.exists() {
                self.load_from_file(&path)?;
            }
        }

        Ok(())
    }

    /// Get list of config paths to check, lowest precedence first
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Home directory
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".waha-bridge").join("config.json"));
        }

        // 2. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("waha-bridge").join("config.json"));
        }

        // 3. Current directory
        paths.push(PathBuf::from("waha.json"));

        // 4. Environment variable
        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    /// Load configuration from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WahaError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: BridgeConfig = serde_json::from_str(&content).map_err(|e| {
            WahaError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        debug!(
            path = %path.display(),
            entries = config.entries.len(),
            "Loaded gateway configuration"
        );
        self.merge_config(config);
        Ok(())
    }

    /// Merge another config into this one (later configs override earlier)
    fn merge_config(&mut self, other: BridgeConfig) {
        for (entry_id, gateway) in other.entries {
            self.config.entries.insert(entry_id, gateway);
        }
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Take ownership of the configuration
    pub fn into_config(self) -> BridgeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_custom_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "entries": {{
                    "kitchen": {{
                        "base_url": "http://waha.local:3000",
                        "api_key_env": "WAHA_API_KEY",
                        "session": "kitchen",
                        "rate_limit": 4
                    }}
                }}
            }}"#
        )
        .unwrap();

        let loader = ConfigLoader::from_path(file.path()).unwrap();
        let entry = &loader.config().entries["kitchen"];
        assert_eq!(entry.base_url, "http://waha.local:3000");
        assert_eq!(entry.session, "kitchen");
        assert_eq!(entry.rate_limit, 4);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ConfigLoader::from_path("/definitely/not/here/waha.json")
            .err()
            .unwrap();
        assert!(matches!(err, WahaError::Config(_)));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let err = ConfigLoader::from_path(file.path()).err().unwrap();
        assert!(matches!(err, WahaError::Config(_)));
    }

    fn write_entry(url: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"entries": {{"kitchen": {{"base_url": "{}"}}}}}}"#, url).unwrap();
        file
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let home = write_entry("http://home:3000");
        let explicit = write_entry("http://explicit:3000");

        let mut loader = ConfigLoader {
            config: BridgeConfig::default(),
        };
        loader.load_from_file(home.path()).unwrap();
        loader.load_from_file(explicit.path()).unwrap();

        assert_eq!(
            loader.config().entries["kitchen"].base_url,
            "http://explicit:3000"
        );
    }

    #[test]
    fn test_env_config_path_checked_last() {
        std::env::set_var(CONFIG_PATH_ENV, "/tmp/waha-bridge-explicit.json");

        let paths = ConfigLoader::get_config_paths();
        let cwd = paths
            .iter()
            .position(|p| p.as_path() == Path::new("waha.json"))
            .unwrap();

        assert_eq!(
            paths.last().map(PathBuf::as_path),
            Some(Path::new("/tmp/waha-bridge-explicit.json"))
        );
        assert_eq!(cwd, paths.len() - 2);
        if let Some(home_dir) = dirs::home_dir() {
            assert_eq!(paths[0], home_dir.join(".waha-bridge").join("config.json"));
        }
    }

    #[test]
    fn test_merge_configs() {
        let mut loader = ConfigLoader {
            config: BridgeConfig::default(),
        };

        let first = BridgeConfig {
            entries: [
                ("a".to_string(), GatewayConfig::new("http://a:3000")),
                ("b".to_string(), GatewayConfig::new("http://b:3000")),
            ]
            .into_iter()
            .collect(),
        };
        let second = BridgeConfig {
            entries: [("b".to_string(), GatewayConfig::new("http://b2:3000"))]
                .into_iter()
                .collect(),
        };

        loader.merge_config(first);
        loader.merge_config(second);

        let config = loader.into_config();
        assert_eq!(config.entries.len(), 2);
        assert_eq!(config.entries["b"].base_url, "http://b2:3000");
    }
}
