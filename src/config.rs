//! Runtime configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::game::table::DEFAULT_FLIP_DELAY;
use crate::network::server::ServerConfig;

/// Relay bind address.
pub const ENV_BIND: &str = "COIN_FLIP_BIND";
/// `ws://` URL of a relay to play against.
pub const ENV_STORE_URL: &str = "COIN_FLIP_STORE_URL";
/// Path of the durable records file.
pub const ENV_RECORDS: &str = "COIN_FLIP_RECORDS";
/// Flip animation window in milliseconds.
pub const ENV_FLIP_DELAY_MS: &str = "COIN_FLIP_FLIP_DELAY_MS";
/// Session label that fixes the flip sequence for replays.
pub const ENV_SEED: &str = "COIN_FLIP_SEED";

/// Default records file.
pub const DEFAULT_RECORDS_FILE: &str = "coin_flip_records.json";

/// Application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Relay server settings.
    pub server: ServerConfig,
    /// Remote relay to use instead of an in-process store.
    pub store_url: Option<String>,
    /// Durable records file.
    pub records_path: PathBuf,
    /// Flip animation window.
    pub flip_delay: Duration,
    /// Replay label for the coin; fresh entropy when unset.
    pub seed: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store_url: None,
            records_path: PathBuf::from(DEFAULT_RECORDS_FILE),
            flip_delay: DEFAULT_FLIP_DELAY,
            seed: None,
        }
    }
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup. Unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BIND) {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => config.server.bind_addr = addr,
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_BIND, raw, e),
            }
        }

        config.store_url = lookup(ENV_STORE_URL).filter(|url| !url.trim().is_empty());

        if let Some(path) = lookup(ENV_RECORDS) {
            config.records_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup(ENV_FLIP_DELAY_MS) {
            match raw.parse::<u64>() {
                Ok(ms) => config.flip_delay = Duration::from_millis(ms),
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_FLIP_DELAY_MS, raw, e),
            }
        }

        config.seed = lookup(ENV_SEED).filter(|seed| !seed.is_empty());

        config
    }
}
