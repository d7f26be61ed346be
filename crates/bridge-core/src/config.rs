//! Bridge tunables — resolved env → TOML file → built-in defaults.
//!
//! This configures only this crate's own knobs (update-delay bounds, the
//! minimum useful frame size). Relay/Device registration config is the
//! process bootstrap's concern and stays out of scope here.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Worker update-delay bounds, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateDelayConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for UpdateDelayConfig {
    fn default() -> Self {
        Self {
            min_ms: 50,
            max_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub update_delay: UpdateDelayConfig,

    /// Smallest chunk, header included, worth accepting as forward progress.
    /// Below this the bridge retries the same chunk instead of advancing.
    pub min_frame_size: usize,

    /// Upper bound on in-flight (not-yet-complete) reassembly buffers kept
    /// per bridge, to cap memory under a misbehaving or hostile peer.
    pub max_pending_messages: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            update_delay: UpdateDelayConfig::default(),
            min_frame_size: 16,
            max_pending_messages: 256,
        }
    }
}

impl BridgeConfig {
    /// Resolve configuration: `$BRIDGE_CONFIG` file if set, else
    /// `$XDG_CONFIG_HOME/bridge/config.toml`, else built-in defaults; any
    /// env var override is applied last.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match Self::file_path() {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::ReadFailed { path: path.clone(), source })?;
                toml::from_str(&text).map_err(|source| ConfigError::ParseFailed { path, source })?
            }
            _ => Self::default(),
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn file_path() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("BRIDGE_CONFIG") {
            return Some(PathBuf::from(p));
        }
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .ok()?;
        Some(config_home.join("bridge").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BRIDGE_MIN_FRAME_SIZE") {
            if let Ok(n) = v.parse() {
                self.min_frame_size = n;
            }
        }
        if let Ok(v) = std::env::var("BRIDGE_UPDATE_DELAY_MIN_MS") {
            if let Ok(n) = v.parse() {
                self.update_delay.min_ms = n;
            }
        }
        if let Ok(v) = std::env::var("BRIDGE_UPDATE_DELAY_MAX_MS") {
            if let Ok(n) = v.parse() {
                self.update_delay.max_ms = n;
            }
        }
    }
}

impl UpdateDelayConfig {
    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}
