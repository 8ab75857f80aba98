//! Identity records used for discovery and registry lookups.

use crate::CrosspointId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

pub const LOOPBACK: &str = "127.0.0.1";

/// Network location of a program.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostInfo {
    /// Host name or IP literal. `None` means this machine.
    pub address: Option<String>,
    /// Advertisement port the program listens on.
    pub port: u16,
}

impl HostInfo {
    /// A host at an explicit address.
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: Some(address.into()),
            port,
        }
    }

    /// A host on this machine with no explicit address.
    pub fn local(port: u16) -> Self {
        Self {
            address: None,
            port,
        }
    }

    /// The address to connect to, with any local-machine form replaced by
    /// the loopback literal.
    pub fn address_or_localhost(&self) -> &str {
        match self.address.as_deref() {
            Some(address) if !is_local_address(address) => address,
            _ => LOOPBACK,
        }
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address_or_localhost(), self.port)
    }
}

fn is_local_address(address: &str) -> bool {
    let address = address.trim();
    if address.is_empty() || address.eq_ignore_ascii_case("localhost") {
        return true;
    }
    address
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_loopback() || ip.is_unspecified())
}

/// Identity of one crosspoint as seen by discovery.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CrosspointInfo {
    /// Program hosting the crosspoint.
    pub host: HostInfo,
    /// Crosspoint id, unique within its system.
    pub id: CrosspointId,
    /// Display name, if one was configured.
    pub name: Option<String>,
}

impl CrosspointInfo {
    pub fn new(id: CrosspointId, name: Option<String>, host: HostInfo) -> Self {
        Self { host, id, name }
    }
}

impl fmt::Display for CrosspointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({}) @ {}", self.id, name, self.host),
            None => write!(f, "{} @ {}", self.id, self.host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_forms_become_loopback() {
        for address in ["", "localhost", "LOCALHOST", "127.0.0.1", "127.4.5.6", "0.0.0.0", "::1"] {
            assert_eq!(HostInfo::new(address, 1).address_or_localhost(), LOOPBACK);
        }
        assert_eq!(HostInfo::local(1).address_or_localhost(), LOOPBACK);
    }

    #[test]
    fn remote_address_is_kept() {
        let host = HostInfo::new("10.1.2.3", 30010);
        assert_eq!(host.address_or_localhost(), "10.1.2.3");
        assert_eq!(host.to_string(), "10.1.2.3:30010");
    }

    #[test]
    fn info_json_shape() {
        let info = CrosspointInfo::new(4, Some("Panel".into()), HostInfo::new("10.0.0.2", 30011));
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(
            json,
            r#"{"Host":{"Address":"10.0.0.2","Port":30011},"Id":4,"Name":"Panel"}"#
        );
        let back: CrosspointInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
