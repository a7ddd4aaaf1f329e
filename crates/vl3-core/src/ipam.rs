//! Subnet assignment for this endpoint.
//!
//! The generator runs once when the endpoint is built. The subnet it
//! returns is what peers route to us for.

use ipnet::IpNet;

use crate::config::Vl3Config;

#[derive(Debug, thiserror::Error)]
pub enum IpamError {
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("subnet {subnet} is not within vL3 range {range}")]
    OutsideRange { subnet: String, range: String },
}

/// Hands this endpoint its subnet.
pub trait PrefixPoolGenerator: Send + Sync {
    fn generate(&self, config: &Vl3Config) -> Result<String, IpamError>;
}

/// Takes the subnet straight from `[ipam] subnet`, checked against
/// `[network] vl3_cidr`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredSubnet;

impl PrefixPoolGenerator for ConfiguredSubnet {
    fn generate(&self, config: &Vl3Config) -> Result<String, IpamError> {
        let range = parse_cidr(&config.network.vl3_cidr)?;
        let subnet = parse_cidr(&config.ipam.subnet)?;

        if !range.contains(&subnet) {
            return Err(IpamError::OutsideRange {
                subnet: subnet.to_string(),
                range: range.to_string(),
            });
        }
        Ok(subnet.to_string())
    }
}

/// Parse and normalize a CIDR (host bits cleared).
pub fn parse_cidr(cidr: &str) -> Result<IpNet, IpamError> {
    cidr.trim()
        .parse::<IpNet>()
        .map(|net| net.trunc())
        .map_err(|e| IpamError::InvalidCidr(format!("{cidr}: {e}")))
}
