// # r53ddns-core
//
// Core library for the Route 53 dynamic DNS agent.
//
// ## Architecture Overview
//
// - **PublicIpPoller**: Periodically looks up the public IPv4/IPv6 address
// - **Reconciler**: Serializes update cycles, keeping only the latest
//   pending snapshot
// - **RecordSetSource**: Cached (or always-fresh) view of the managed
//   address records
// - **DnsRecordClient**: Trait for the provider side (Route 53)
// - **PublicIpLookup**: Trait for the "what is my IP" side
//
// ```text
// PublicIpPoller ──PublicIpState──▶ Reconciler ──batch──▶ DnsRecordClient
//        │                              │
//        └──────▶ subscribers ◀──── RecordSetSource
// ```
//
// Nothing here is persisted: the provider is the only source of truth and
// the cache is rebuilt on every start.

pub mod config;
pub mod error;
pub mod hostname;
pub mod poller;
pub mod reconcile;
pub mod records;
pub mod source;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    AgentConfig, AwsCredentials, ChangeWaitConfig, HealthConfig, LogConfig, LogFormat,
    PollerConfig, RunMode,
};
pub use error::{Error, Result};
pub use poller::PublicIpPoller;
pub use reconcile::{CycleOutcome, Reconciler};
pub use records::{
    AddressRecord, DnsAddressRecord, DnsAddressRecordState, IpAddresses, PublicIpState,
    RecordType, ZoneRecordSet, ZoneUpdateStatus,
};
pub use source::{FetchPolicy, RecordSetSource};
pub use traits::{
    DnsRecordClient, IpVersion, PublicIpLookup, PublicIpSubscriber, RecordStateSubscriber,
};
