//! Pure record-set transforms shared by the Reconciler and the Record Set
//! Source: deciding which zones are stale, rewriting their address records,
//! and merging submitted values back into the cache.

use tracing::warn;

use crate::records::{IpAddresses, RecordType, ZoneRecordSet, ZoneUpdateStatus};

/// Whether any address record in the zone disagrees with a known address
///
/// A family whose address is `None` never causes a mismatch.
pub fn zone_needs_update(set: &ZoneRecordSet, target: &IpAddresses) -> bool {
    set.records.iter().any(|record| {
        target
            .for_record_type(&record.record_type)
            .is_some_and(|address| !record.matches_value(address))
    })
}

/// Rewrite every address record of a zone to the target addresses
///
/// Records of a family with no known address keep their current values.
/// Non-address records pass through unchanged.
pub fn apply_addresses(set: &ZoneRecordSet, target: &IpAddresses) -> ZoneRecordSet {
    let mut skipped_v4 = false;
    let mut skipped_v6 = false;

    let records = set
        .records
        .iter()
        .map(|record| match target.for_record_type(&record.record_type) {
            Some(address) => record.with_value(address),
            None => {
                match record.record_type {
                    RecordType::A => skipped_v4 = true,
                    RecordType::Aaaa => skipped_v6 = true,
                    RecordType::Other(_) => {}
                }
                record.clone()
            }
        })
        .collect();

    if skipped_v4 {
        warn!(
            "Public IPv4 address unknown, leaving A records unchanged in zone {}",
            set.zone_id
        );
    }
    if skipped_v6 {
        warn!(
            "Public IPv6 address unknown, leaving AAAA records unchanged in zone {}",
            set.zone_id
        );
    }

    ZoneRecordSet::new(set.zone_id.clone(), records)
}

/// Build the minimal update batch: one rewritten set per stale zone
pub fn build_update_batch(sets: &[ZoneRecordSet], target: &IpAddresses) -> Vec<ZoneRecordSet> {
    sets.iter()
        .filter(|set| zone_needs_update(set, target))
        .map(|set| apply_addresses(set, target))
        .collect()
}

/// Merge submitted zone sets into a cache snapshot
///
/// Zones reported `true` take the submitted records; zones reported `false`
/// or missing from `status` keep their cached records.
pub fn merge_synced_zones(
    current: &[ZoneRecordSet],
    submitted: &[ZoneRecordSet],
    status: &ZoneUpdateStatus,
) -> Vec<ZoneRecordSet> {
    current
        .iter()
        .map(|cached| {
            let synced = status.get(&cached.zone_id).copied().unwrap_or(false);
            if !synced {
                return cached.clone();
            }

            submitted
                .iter()
                .find(|set| set.zone_id == cached.zone_id)
                .cloned()
                .unwrap_or_else(|| cached.clone())
        })
        .collect()
}
