// # DNS Record Client Trait
//
// Defines the interface the core uses to read and write address records at
// the DNS provider.
//
// ## Implementations
//
// - Route 53: `r53ddns-route53` crate
//
// ## Usage
//
// ```rust,ignore
// use r53ddns_core::DnsRecordClient;
//
// #[tokio::main]
// async fn main() -> r53ddns_core::Result<()> {
//     let client = /* DnsRecordClient implementation */;
//
//     let names = vec!["home.example.com.".to_string()];
//     let sets = client.get_zone_records(&names).await?;
//     let status = client.update_zone_records(&sets).await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::records::{ZoneRecordSet, ZoneUpdateStatus};

/// Trait for DNS record client implementations
///
/// Names passed in are expected to be normalized (lower-case, trailing dot,
/// provider escapes applied), see [`crate::hostname::validate_normalize_hostname`].
///
/// # Convergence
///
/// `update_zone_records` owns its own convergence budget. It must return
/// within that budget, success or failure, and never hang. A zone that
/// failed to submit or never converged is reported as `false`, not as an
/// error.
///
/// # Retries
///
/// Implementations do not retry. A zone reported as failed keeps its stale
/// cache entry and the next poll cycle submits the same diff again.
#[async_trait]
pub trait DnsRecordClient: Send + Sync {
    /// Group the given names by the hosted zone that owns them
    ///
    /// A name belongs to the zone with the longest matching suffix. Names
    /// with no owning zone are left out of the result.
    ///
    /// # Returns
    ///
    /// - `Ok(BTreeMap<zone_id, names>)`: Names per zone
    /// - `Err(Error)`: If the zone listing failed or was malformed
    async fn get_zones_for_records(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>, crate::Error>;

    /// Fetch the existing A/AAAA record sets for the given names
    ///
    /// Only sets whose name is in `names` are returned. Every matched zone
    /// appears in the result, even when it holds no matching records.
    async fn get_zone_records(&self, names: &[String])
    -> Result<Vec<ZoneRecordSet>, crate::Error>;

    /// Submit the given record sets, one change batch per zone
    ///
    /// # Returns
    ///
    /// Success flag per submitted zone id, after waiting for convergence or
    /// the time limit.
    async fn update_zone_records(
        &self,
        sets: &[ZoneRecordSet],
    ) -> Result<ZoneUpdateStatus, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
