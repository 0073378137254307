// # Public IP Lookup Trait
//
// Defines how the poller asks "what is my public address?" for one address
// family at a time.
//
// ## Implementations
//
// - HTTP echo services: `r53ddns-ip-http` crate

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Whether `ip` belongs to this address family
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            IpVersion::V4 => ip.is_ipv4(),
            IpVersion::V6 => ip.is_ipv6(),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

/// Trait for public IP lookup implementations
///
/// A lookup is a single attempt. The poller bounds it with its own timeout
/// and treats any error as "undetermined" for the current cycle.
#[async_trait]
pub trait PublicIpLookup: Send + Sync {
    /// Determine the public address for the given family
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: An address of the requested family
    /// - `Err(Error)`: If no address could be determined
    async fn lookup(&self, version: IpVersion) -> Result<IpAddr, crate::Error>;
}
