//! Session configuration loaded from `config/session.toml`.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

pub(crate) const DEFAULT_SESSION_PATH: &str = "config/session.toml";

/// Everything the process needs to host or join a match.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Run as the authoritative host instead of joining one.
    pub host: bool,
    /// Display name carried through the handshake into the score table.
    pub nickname: String,
    /// Arena name, for display and server browser listings.
    pub arena: String,
    /// Address the host binds to.
    pub listen_addr: String,
    /// Address a client connects to.
    pub server_addr: String,
    /// Simulation rate in ticks per second.
    pub tick_rate: u32,
    /// Seed for host-side spawn point selection.
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: false,
            nickname: "player".to_string(),
            arena: "quarry".to_string(),
            listen_addr: "0.0.0.0:27015".to_string(),
            server_addr: "127.0.0.1:27015".to_string(),
            tick_rate: skirmish_core::DEFAULT_TICK_RATE,
            seed: 0,
        }
    }
}

impl SessionConfig {
    /// Load session configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_SESSION_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<SessionConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    SessionConfig::default()
                }
            },
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                SessionConfig::default()
            }
        }
    }

    /// Save session configuration to an explicit path.
    pub fn save_to_path(&self, path: &Path) -> anyhow::Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}
