// # HTTP Public IP Lookup
//
// Determines the host's public address by asking "what is my IP" echo
// services over HTTPS.
//
// ## Address Family
//
// Each family has its own HTTP client bound to the unspecified address of
// that family (`0.0.0.0` or `::`), so an IPv4 lookup can only leave the host
// over IPv4 and vice versa. The echoed address must also belong to the
// requested family.
//
// ## Failover
//
// Services are tried in order; the first one that answers with a valid
// address wins. One attempt per service, no retries: the poller bounds the
// whole lookup with its own timeout and tries again next cycle.

use async_trait::async_trait;
use r53ddns_core::traits::{IpVersion, PublicIpLookup};
use r53ddns_core::{Error, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;
use tracing::{debug, warn};

/// Services answering with the caller's IPv4 address as plain text
pub const DEFAULT_V4_SERVICES: &[&str] = &[
    "https://api.ipify.org",
    "https://ipv4.icanhazip.com",
    "https://v4.ident.me",
];

/// Services answering with the caller's IPv6 address as plain text
pub const DEFAULT_V6_SERVICES: &[&str] = &[
    "https://api6.ipify.org",
    "https://ipv6.icanhazip.com",
    "https://v6.ident.me",
];

/// Per-request timeout; the poller's lookup timeout is usually tighter
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Public IP lookup over HTTP echo services
#[derive(Debug)]
pub struct HttpIpLookup {
    v4: FamilyLookup,
    v6: FamilyLookup,
}

#[derive(Debug)]
struct FamilyLookup {
    services: Vec<String>,
    client: reqwest::Client,
}

impl FamilyLookup {
    fn new(version: IpVersion, services: Vec<String>) -> Result<Self> {
        let local: IpAddr = match version {
            IpVersion::V4 => Ipv4Addr::UNSPECIFIED.into(),
            IpVersion::V6 => Ipv6Addr::UNSPECIFIED.into(),
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .local_address(local)
            .build()
            .map_err(|e| Error::http(format!("Failed to build {} HTTP client: {}", version, e)))?;

        Ok(Self { services, client })
    }
}

impl HttpIpLookup {
    /// Create a lookup using the default public services
    pub fn new() -> Result<Self> {
        Self::with_services(
            DEFAULT_V4_SERVICES.iter().map(|s| s.to_string()).collect(),
            DEFAULT_V6_SERVICES.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Create a lookup using custom service URLs, tried in order
    pub fn with_services(v4_services: Vec<String>, v6_services: Vec<String>) -> Result<Self> {
        Ok(Self {
            v4: FamilyLookup::new(IpVersion::V4, v4_services)?,
            v6: FamilyLookup::new(IpVersion::V6, v6_services)?,
        })
    }

    fn family(&self, version: IpVersion) -> &FamilyLookup {
        match version {
            IpVersion::V4 => &self.v4,
            IpVersion::V6 => &self.v6,
        }
    }

    async fn query(&self, client: &reqwest::Client, url: &str, version: IpVersion) -> Result<IpAddr> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::http(format!(
                "{} answered with HTTP {}",
                url,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response from {}: {}", url, e)))?;

        parse_address(&text, version)
    }
}

#[async_trait]
impl PublicIpLookup for HttpIpLookup {
    async fn lookup(&self, version: IpVersion) -> Result<IpAddr> {
        let family = self.family(version);

        for url in &family.services {
            match self.query(&family.client, url, version).await {
                Ok(ip) => {
                    debug!("{} lookup via {} returned {}", version, url, ip);
                    return Ok(ip);
                }
                Err(e) => warn!("{} lookup via {} failed: {}", version, url, e),
            }
        }

        Err(Error::ip_lookup(format!(
            "No service returned a public {} address",
            version
        )))
    }
}

/// Parse an echo-service body as an address of the given family
pub fn parse_address(text: &str, version: IpVersion) -> Result<IpAddr> {
    let text = text.trim();
    let ip: IpAddr = text
        .parse()
        .map_err(|_| Error::ip_lookup(format!("Invalid IP address: {:?}", text)))?;

    if !version.matches(&ip) {
        return Err(Error::ip_lookup(format!("Expected {}, got: {}", version, ip)));
    }

    Ok(ip)
}
