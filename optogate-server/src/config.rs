//! Typed, file-loadable server configuration, mirroring the teacher's
//! `braid-config-data::parse_config_file`: a `#[serde(deny_unknown_fields)]`
//! struct read once at startup with `toml::from_str`, never mutated
//! thereafter. CLI flags (see `cli.rs`) override individual fields after
//! the file is loaded.

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;

use optogate_core::GaterSettingsSpec;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid gater settings: {0}")]
    Gater(#[from] optogate_core::Error),
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:9001".parse().unwrap()
}

fn default_period_dir() -> PathBuf {
    PathBuf::from("./periods")
}

/// Everything the server binary needs beyond what lives in a `Gater`
/// itself: where to listen, where to persist accepted reference cycles,
/// and the gater settings to validate and hand to each new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_period_dir")]
    pub period_dir: PathBuf,
    #[serde(default)]
    pub gater: GaterSettingsSpec,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            period_dir: default_period_dir(),
            gater: GaterSettingsSpec::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut file = std::fs::File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let cfg: ServerConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = ServerConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.listen_addr, cfg.listen_addr);
        assert_eq!(parsed.period_dir, cfg.period_dir);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let text = "listen_addr = \"127.0.0.1:9001\"\nperiod_dir = \"./p\"\nbogus = 1\n[gater]\n";
        assert!(toml::from_str::<ServerConfig>(text).is_err());
    }
}
