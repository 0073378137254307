// # Subscriber Traits
//
// Observers are passed to the poller and the record set source at
// construction. Handlers are synchronous and must return quickly: the
// Reconciler only flips its state cell and spawns, the Health Reporter only
// swaps a snapshot.

use crate::records::{DnsAddressRecordState, PublicIpState};

/// Receives every public IP snapshot produced by the poller
pub trait PublicIpSubscriber: Send + Sync {
    fn on_public_ip(&self, state: &PublicIpState);
}

/// Receives the flattened record view after fetches and merges
pub trait RecordStateSubscriber: Send + Sync {
    /// Records were (re)fetched from the provider
    fn on_records_retrieved(&self, state: &DnsAddressRecordState);

    /// Records were merged after a reconciliation cycle
    fn on_records_updated(&self, state: &DnsAddressRecordState);
}
