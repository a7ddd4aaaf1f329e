//! Configuration system for vl3mesh.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $VL3_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/vl3mesh/config.toml
//!   3. ~/.config/vl3mesh/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vl3Config {
    pub identity: IdentityConfig,
    pub network: NetworkConfig,
    pub ipam: IpamConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Fallback endpoint name, used when the first client request
    /// does not carry one.
    pub endpoint_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network service this endpoint offers.
    pub service_name: String,
    /// Whole vL3 address space. Clients get a route for all of it.
    pub vl3_cidr: String,
    /// Remote registry sites queried in addition to the local registry.
    pub remote_sites: Vec<String>,
    /// HTTP API port.
    pub api_port: u16,
    /// Address the HTTP API binds to.
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IpamConfig {
    /// Subnet this endpoint owns inside `vl3_cidr`.
    pub subnet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Static registry table served by the daemon's built-in discovery.
    pub endpoints: Vec<RegistryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    /// Owning manager; for the daemon this is the peer's API address.
    pub manager: String,
    /// Service name, optionally site-scoped (`service@site`).
    pub service: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            service_name: "vl3-service".to_string(),
            vl3_cidr: "10.60.0.0/16".to_string(),
            remote_sites: Vec::new(),
            api_port: 9101,
            bind_addr: "127.0.0.1".to_string(),
        }
    }
}

impl Default for IpamConfig {
    fn default() -> Self {
        Self {
            subnet: "10.60.1.0/24".to_string(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vl3mesh")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl Vl3Config {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Vl3Config::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file without applying env overrides.
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("VL3_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&Vl3Config::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply VL3_* overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VL3_IDENTITY__ENDPOINT_NAME") {
            self.identity.endpoint_name = v;
        }
        if let Some(v) = lookup("VL3_NETWORK__SERVICE_NAME") {
            self.network.service_name = v;
        }
        if let Some(v) = lookup("VL3_NETWORK__VL3_CIDR") {
            self.network.vl3_cidr = v;
        }
        if let Some(v) = lookup("VL3_NETWORK__REMOTE_SITES") {
            self.network.remote_sites = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = lookup("VL3_NETWORK__API_PORT") {
            if let Ok(p) = v.parse() {
                self.network.api_port = p;
            }
        }
        if let Some(v) = lookup("VL3_IPAM__SUBNET") {
            self.ipam.subnet = v;
        }
    }
}
