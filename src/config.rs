//! Configuration persistence for the blimp controller
//!
//! One small toml file under the user's config directory. The file only
//! carries compiled-in defaults the user may want to override (target
//! endpoint, publish period); none of it changes core control semantics.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/blimpcontroller";
const CONFIG_FILE: &str = "config.toml";

/// Default target: loopback for bench testing. The blimp's own access point
/// serves the firmware at 192.168.4.1:2222.
pub const DEFAULT_TARGET_HOST: &str = "127.0.0.1";
pub const DEFAULT_TARGET_PORT: u16 = 2222;
pub const DEFAULT_PUBLISH_INTERVAL_MS: u64 = 50;

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BlimpConfig {
    /// Hostname or address of the blimp's UDP endpoint
    pub target_host: String,

    /// UDP port of the blimp's control endpoint
    pub target_port: u16,

    /// Publish period in milliseconds
    pub publish_interval_ms: u64,
}

impl Default for BlimpConfig {
    fn default() -> Self {
        Self {
            target_host: DEFAULT_TARGET_HOST.to_string(),
            target_port: DEFAULT_TARGET_PORT,
            publish_interval_ms: DEFAULT_PUBLISH_INTERVAL_MS,
        }
    }
}

impl BlimpConfig {
    fn get_home_dir() -> PathBuf {
        dirs::home_dir().unwrap_or_else(|| {
            warn!("Could not determine home directory, using current directory");
            PathBuf::from(".")
        })
    }

    fn config_path() -> PathBuf {
        let mut path = Self::get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Writes the default configuration if none exists yet
    pub async fn ensure_default_config() -> std::io::Result<()> {
        let path = Self::config_path();

        if tokio::fs::try_exists(&path).await? {
            return Ok(());
        }

        info!("Creating default configuration at {}", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    /// Loads the configuration, falling back to defaults on any failure
    pub async fn load_or_default() -> Self {
        let path = Self::config_path();

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Could not read config file {}: {}; using defaults",
                    path.display(),
                    e
                );
                return Self::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                debug!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Could not parse config file {}: {}; using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_firmware_contract() {
        let config = BlimpConfig::default();
        assert_eq!(config.target_host, "127.0.0.1");
        assert_eq!(config.target_port, 2222);
        assert_eq!(config.publish_interval_ms, 50);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = BlimpConfig {
            target_host: "192.168.4.1".to_string(),
            target_port: 2222,
            publish_interval_ms: 100,
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: BlimpConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.target_host, "192.168.4.1");
        assert_eq!(parsed.publish_interval_ms, 100);
    }
}
