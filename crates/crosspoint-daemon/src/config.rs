//! Daemon configuration.
//!
//! ```toml
//! system_id = 1
//! program_slot = 2
//! host_address = "192.168.1.20"
//! advertisement_interval_secs = 30
//!
//! [[control]]
//! id = 9
//! name = "Lobby touchpanel"
//!
//! [[equipment]]
//! id = 5
//! name = "Amplifier"
//! ```

use crosspoint_core::ports::{self, PortError};
use crosspoint_core::{CrosspointId, HostInfo};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 64, 0, 1);
pub const DEFAULT_ADVERTISEMENT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    pub system_id: u32,
    #[serde(default = "default_program_slot")]
    pub program_slot: u8,
    /// Address other programs should use to reach this one.
    #[serde(default)]
    pub host_address: Option<String>,
    #[serde(default = "default_multicast_group")]
    pub multicast_group: Ipv4Addr,
    #[serde(default = "default_interval")]
    pub advertisement_interval_secs: u64,
    #[serde(default, rename = "control")]
    pub controls: Vec<CrosspointEntry>,
    #[serde(default)]
    pub equipment: Vec<CrosspointEntry>,
}

/// A locally hosted crosspoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrosspointEntry {
    pub id: CrosspointId,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_program_slot() -> u8 {
    1
}

fn default_multicast_group() -> Ipv4Addr {
    DEFAULT_MULTICAST_GROUP
}

fn default_interval() -> u64 {
    DEFAULT_ADVERTISEMENT_INTERVAL_SECS
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that would otherwise fail later at bind time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.advertisement_port()?;
        if self.advertisement_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if !self.multicast_group.is_multicast() {
            return Err(ConfigError::NotMulticast(self.multicast_group));
        }
        Ok(())
    }

    pub fn advertisement_port(&self) -> Result<u16, PortError> {
        ports::advertisement_port(self.program_slot, self.system_id)
    }

    pub fn direct_port(&self) -> Result<u16, PortError> {
        ports::direct_port(self.program_slot, self.system_id)
    }

    pub fn advertisement_interval(&self) -> Duration {
        Duration::from_secs(self.advertisement_interval_secs)
    }

    /// How this program identifies itself in advertisements.
    pub fn host(&self) -> Result<HostInfo, PortError> {
        Ok(HostInfo {
            address: self.host_address.clone(),
            port: self.advertisement_port()?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Port(#[from] PortError),
    #[error("advertisement interval must be at least one second")]
    ZeroInterval,
    #[error("{0} is not a multicast address")]
    NotMulticast(Ipv4Addr),
}
