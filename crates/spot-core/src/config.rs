//! Configuration types for Spot

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Address, Error, Result};

/// Protocol wiring and policy knobs that are not part of `begin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Address holding vault capital
    pub vault_address: Address,

    /// Address allowed to begin the vault, publish roots and re-price interest
    pub vault_owner: Address,

    /// Address of the wrapped-position contract (the collateral leaf collection)
    pub wrapper_address: Address,

    /// NFT collection the wrapper accepts pools for
    pub collection: Address,

    /// Epochs a loan may go without interest before it can be liquidated
    #[serde(default = "default_grace_epochs")]
    pub grace_epochs: u64,

    /// Maximum number of wrapped positions ever alive at once
    #[serde(default = "default_wrapped_supply_cap")]
    pub wrapped_supply_cap: u64,
}

fn default_grace_epochs() -> u64 {
    2
}

fn default_wrapped_supply_cap() -> u64 {
    860
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            vault_address: Address::from_u64(0x5a01),
            vault_owner: Address::from_u64(0x0a01),
            wrapper_address: Address::from_u64(0x5a02),
            collection: Address::from_u64(0xc011),
            grace_epochs: default_grace_epochs(),
            wrapped_supply_cap: default_wrapped_supply_cap(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Protocol settings
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Interface the API binds to
    #[serde(default = "default_api_host")]
    pub api_host: IpAddr,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Extra tracing directive applied on top of `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_api_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_api_port() -> u16 {
    18545
}

fn default_log_filter() -> String {
    "spot=debug".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolConfig::default(),
            api_host: default_api_host(),
            api_port: default_api_port(),
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Parse a JSON config document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.api_port, 18545);
        assert_eq!(config.protocol.grace_epochs, 2);
        assert_eq!(config.protocol.wrapped_supply_cap, 860);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed = AppConfig::from_json(&json).unwrap();
        assert_eq!(parsed.protocol, config.protocol);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed = AppConfig::from_json(r#"{"api_port": 9000}"#).unwrap();
        assert_eq!(parsed.api_port, 9000);
        assert!(parsed.api_host.is_loopback());
        assert_eq!(parsed.protocol, ProtocolConfig::default());
        assert_eq!(parsed.log_filter, "spot=debug");
    }

    #[test]
    fn test_api_host_override() {
        let parsed = AppConfig::from_json(r#"{"api_host": "0.0.0.0"}"#).unwrap();
        assert!(parsed.api_host.is_unspecified());
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/spot.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
