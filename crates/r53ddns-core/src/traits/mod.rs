//! Collaborator interfaces for the reconciliation core
//!
//! - [`DnsRecordClient`]: Resolve zones, list and update address record sets
//! - [`PublicIpLookup`]: Determine the host's public address per family
//! - [`PublicIpSubscriber`] / [`RecordStateSubscriber`]: Injected observers

pub mod dns_client;
pub mod ip_lookup;
pub mod subscriber;

pub use dns_client::DnsRecordClient;
pub use ip_lookup::{IpVersion, PublicIpLookup};
pub use subscriber::{PublicIpSubscriber, RecordStateSubscriber};
