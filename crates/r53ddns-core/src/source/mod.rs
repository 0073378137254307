// # Record Set Source
//
// Holds the in-memory view of the provider's address records for the
// configured hostnames.
//
// ## Fetch Policies
//
// - `Cached`: fetch once, then serve the cache. Only
//   `update_records_after_sync` changes it afterwards.
// - `AlwaysFresh`: fetch on every call and replace the cache.
//
// ## Empty Results
//
// An empty first fetch means the configuration points at nothing and is
// fatal. An empty later fetch is logged and the previous cache is served,
// so the agent keeps running until the provider side recovers.
//
// ## Atomicity
//
// The cache is an `Arc<Vec<ZoneRecordSet>>` swapped whole under a write
// lock. Readers hold a cheap clone of the `Arc` and never see a half-merged
// snapshot.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::reconcile::diff::merge_synced_zones;
use crate::records::{DnsAddressRecordState, ZoneRecordSet, ZoneUpdateStatus};
use crate::traits::{DnsRecordClient, RecordStateSubscriber};

/// How [`RecordSetSource::get_records`] obtains record sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Fetch once, then serve from memory
    Cached,
    /// Fetch on every call
    AlwaysFresh,
}

impl FetchPolicy {
    pub fn from_cache_flag(cache_records: bool) -> Self {
        if cache_records {
            FetchPolicy::Cached
        } else {
            FetchPolicy::AlwaysFresh
        }
    }
}

#[derive(Default)]
struct Cache {
    records: Arc<Vec<ZoneRecordSet>>,
    retrieved: bool,
}

/// Cached or always-fresh view of the managed record sets
pub struct RecordSetSource {
    client: Arc<dyn DnsRecordClient>,
    policy: FetchPolicy,
    hostnames: Vec<String>,
    cache: RwLock<Cache>,
    subscribers: Vec<Arc<dyn RecordStateSubscriber>>,
}

impl RecordSetSource {
    /// Create a new source
    ///
    /// # Parameters
    ///
    /// - `client`: DNS record client used for fetches
    /// - `policy`: Cached or always-fresh
    /// - `hostnames`: Normalized hostnames to manage
    pub fn new(
        client: Arc<dyn DnsRecordClient>,
        policy: FetchPolicy,
        hostnames: Vec<String>,
    ) -> Self {
        Self {
            client,
            policy,
            hostnames,
            cache: RwLock::new(Cache::default()),
            subscribers: Vec::new(),
        }
    }

    /// Register an observer for "retrieved" and "updated" signals
    pub fn with_subscriber(mut self, subscriber: Arc<dyn RecordStateSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn policy(&self) -> FetchPolicy {
        self.policy
    }

    pub fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    /// Current record sets, fetched according to the policy
    ///
    /// # Errors
    ///
    /// - [`Error::NoMatchingRecords`] if the first fetch found nothing
    /// - Any client error from the fetch itself
    pub async fn get_records(&self) -> Result<Arc<Vec<ZoneRecordSet>>> {
        if self.policy == FetchPolicy::Cached {
            let cache = self.cache.read().await;
            if cache.retrieved {
                return Ok(Arc::clone(&cache.records));
            }
        }

        let mut cache = self.cache.write().await;

        // Another caller may have completed the first fetch while we waited
        if self.policy == FetchPolicy::Cached && cache.retrieved {
            return Ok(Arc::clone(&cache.records));
        }

        debug!("Fetching record sets for {} hostname(s)", self.hostnames.len());
        let fetched = self.client.get_zone_records(&self.hostnames).await?;

        let record_count: usize = fetched.iter().map(|set| set.records.len()).sum();
        if record_count == 0 {
            if !cache.retrieved {
                return Err(Error::no_matching_records(format!(
                    "no A/AAAA records found for {}",
                    self.hostnames.join(", ")
                )));
            }

            warn!(
                "Provider returned no matching records, keeping {} cached zone(s)",
                cache.records.len()
            );
            return Ok(Arc::clone(&cache.records));
        }

        self.warn_unmatched_hostnames(&fetched);
        info!(
            "Retrieved {} record set(s) across {} zone(s)",
            record_count,
            fetched.len()
        );

        cache.records = Arc::new(fetched);
        cache.retrieved = true;
        let snapshot = Arc::clone(&cache.records);
        drop(cache);

        let state = DnsAddressRecordState::from_zone_sets(&snapshot);
        for subscriber in &self.subscribers {
            subscriber.on_records_retrieved(&state);
        }

        Ok(snapshot)
    }

    /// Current cache without fetching
    pub async fn cached_records(&self) -> Arc<Vec<ZoneRecordSet>> {
        Arc::clone(&self.cache.read().await.records)
    }

    /// Merge the outcome of a reconciliation cycle into the cache
    ///
    /// Zones whose status is `true` take the submitted values; all others
    /// keep their cached values so the next cycle recomputes the same diff.
    pub async fn update_records_after_sync(
        &self,
        updated: &[ZoneRecordSet],
        status: &ZoneUpdateStatus,
    ) {
        let synced = updated
            .iter()
            .filter(|set| status.get(&set.zone_id).copied().unwrap_or(false))
            .count();

        for set in updated {
            if !status.get(&set.zone_id).copied().unwrap_or(false) {
                warn!(
                    "Zone {} did not sync, keeping cached records for retry",
                    set.zone_id
                );
            }
        }

        if synced == 0 {
            return;
        }

        let snapshot = {
            let mut cache = self.cache.write().await;
            let merged = merge_synced_zones(&cache.records, updated, status);
            cache.records = Arc::new(merged);
            Arc::clone(&cache.records)
        };

        info!("Cached records updated for {} synced zone(s)", synced);

        let state = DnsAddressRecordState::from_zone_sets(&snapshot);
        for subscriber in &self.subscribers {
            subscriber.on_records_updated(&state);
        }
    }

    fn warn_unmatched_hostnames(&self, fetched: &[ZoneRecordSet]) {
        for hostname in &self.hostnames {
            let found = fetched
                .iter()
                .flat_map(|set| set.records.iter())
                .any(|record| &record.name == hostname);
            if !found {
                warn!("No A/AAAA record found for configured hostname {}", hostname);
            }
        }
    }
}
