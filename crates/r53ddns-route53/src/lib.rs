// # Route 53 DNS Record Client
//
// Implements `DnsRecordClient` against the Route 53 REST API (XML bodies,
// Signature Version 4).
//
// ## Behavior
//
// - Zone resolution lists every public hosted zone and assigns each
//   hostname to the zone with the longest matching suffix. Hostnames with
//   no zone are dropped with a warning.
// - Record listing keeps only `A`/`AAAA` sets whose name is configured.
//   Alias sets carry no values and are skipped.
// - Updates are one UPSERT batch per zone, then `GetChange` is polled until
//   the change is `INSYNC` or the wait budget is spent. Every zone gets a
//   status; errors and timeouts become `false`, never an `Err`.
//
// ## Dry-Run Mode
//
// Reads go to the API as usual. UPSERT bodies are logged instead of sent
// and every zone reports `true`.
//
// ## Security
//
// The secret access key never appears in logs or `Debug` output.
//
// ## API Reference
//
// - List zones: GET `/2013-04-01/hostedzone?marker=...`
// - List record sets: GET `/2013-04-01/hostedzone/:id/rrset?name=...&type=...`
// - Change record sets: POST `/2013-04-01/hostedzone/:id/rrset`
// - Change status: GET `/2013-04-01/change/:id`

pub mod policy;
mod signing;
mod xml;

pub use policy::create_policy_for_zones;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::{join_all, try_join_all};
use r53ddns_core::config::keys;
use r53ddns_core::records::{AddressRecord, RecordType, ZoneRecordSet, ZoneUpdateStatus};
use r53ddns_core::traits::DnsRecordClient;
use r53ddns_core::{AgentConfig, AwsCredentials, ChangeWaitConfig, Error, Result, RunMode};
use reqwest::{Method, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use signing::{SigningKey, canonical_query, sign_request};
use xml::{
    Change, ChangeBatch, ChangeInfo, ChangeInfoResponse, ChangeResourceRecord,
    ChangeResourceRecordSet, ChangeResourceRecordSetsRequest, ChangeResourceRecords, Changes,
    ErrorResponse, HostedZone, ListHostedZonesResponse, ListResourceRecordSetsResponse,
    ResourceRecordSet, short_id,
};

/// Route 53 API endpoint (global service)
pub const ROUTE53_ENDPOINT: &str = "https://route53.amazonaws.com";

const API_VERSION: &str = "2013-04-01";
const SERVICE: &str = "route53";
const PROVIDER: &str = "route53";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL used when a listed record set carries none
const DEFAULT_TTL: u32 = 300;

/// Route 53 DNS record client
pub struct Route53Client {
    credentials: AwsCredentials,
    endpoint: String,
    /// `Host` header value derived from the endpoint, signed into every request
    host: String,
    client: reqwest::Client,
    poll_interval: Duration,
    insync_limit: Duration,
    dry_run: bool,
}

// Custom Debug implementation that hides the secret key
impl std::fmt::Debug for Route53Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route53Client")
            .field("credentials", &self.credentials)
            .field("endpoint", &self.endpoint)
            .field("poll_interval", &self.poll_interval)
            .field("insync_limit", &self.insync_limit)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Route53Client {
    /// Create a new Route 53 client
    ///
    /// # Parameters
    ///
    /// - `credentials`: Access key, secret and signing region
    /// - `change_wait`: How often and how long to poll for `INSYNC`
    /// - `dry_run`: If true, perform reads but only log UPSERTs
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are empty or the HTTP client
    /// cannot be built.
    pub fn new(
        credentials: AwsCredentials,
        change_wait: &ChangeWaitConfig,
        dry_run: bool,
    ) -> Result<Self> {
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            endpoint: ROUTE53_ENDPOINT.to_string(),
            host: endpoint_host(ROUTE53_ENDPOINT)?,
            client,
            poll_interval: change_wait.poll_interval(),
            insync_limit: change_wait.insync_limit(),
            dry_run,
        })
    }

    /// Create a client from the agent configuration
    ///
    /// Dry-run is enabled when the mode is `dry-run`.
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let dry_run = config.mode == RunMode::DryRun;
        if dry_run {
            warn!("Route 53 client running in DRY-RUN mode - no changes will be made");
        }

        Self::new(config.credentials.clone(), &config.change_wait, dry_run)
    }

    /// Send requests to another endpoint (API-compatible mocks)
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/');
        self.host = endpoint_host(endpoint)?;
        self.endpoint = endpoint.to_string();
        Ok(self)
    }

    /// Override the convergence wait budget
    pub fn with_change_timing(mut self, poll_interval: Duration, insync_limit: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.insync_limit = insync_limit;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Make a signed request to the Route 53 API
    async fn api_request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<String> {
        let query = canonical_query(params);
        let payload = body.as_deref().unwrap_or("");

        let signed = sign_request(
            &SigningKey {
                access_key_id: &self.credentials.access_key_id,
                secret_access_key: &self.credentials.secret_access_key,
                region: &self.credentials.region,
                service: SERVICE,
            },
            method.as_str(),
            path,
            &query,
            &[("host", self.host.as_str())],
            payload.as_bytes(),
            Utc::now(),
        );

        let url = if query.is_empty() {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}{}?{}", self.endpoint, path, query)
        };

        debug!("Route 53 API request: {} {}", method, path);

        let mut request = self
            .client
            .request(method, &url)
            .header("X-Amz-Date", signed.amz_date)
            .header("Authorization", signed.authorization);

        if let Some(body) = body {
            request = request.header("Content-Type", "application/xml").body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(status_error(status, &response_body));
        }

        Ok(response_body)
    }

    /// All public hosted zones, following pagination
    async fn list_hosted_zones(&self) -> Result<Vec<HostedZone>> {
        let path = format!("/{}/hostedzone", API_VERSION);
        let mut zones = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let params: Vec<(&str, &str)> = marker
                .as_deref()
                .map(|marker| vec![("marker", marker)])
                .unwrap_or_default();
            let response = self.api_request(Method::GET, &path, &params, None).await?;

            let parsed: ListHostedZonesResponse = parse_xml(&response)?;
            let page = parsed.hosted_zones.ok_or_else(|| {
                Error::provider(PROVIDER, "Unexpected ListHostedZones response: no HostedZones")
            })?;
            zones.extend(page.hosted_zone);

            match parsed.next_marker {
                Some(next) if parsed.is_truncated => marker = Some(next),
                _ => break,
            }
        }

        let (private, public): (Vec<HostedZone>, Vec<HostedZone>) = zones
            .into_iter()
            .partition(|zone| zone.config.as_ref().is_some_and(|c| c.private_zone));
        for zone in &private {
            debug!("Ignoring private hosted zone {} ({})", zone.name, short_id(&zone.id));
        }

        Ok(public)
    }

    /// All record sets in a zone, following pagination
    async fn list_record_sets(&self, zone_id: &str) -> Result<Vec<ResourceRecordSet>> {
        let path = format!("/{}/hostedzone/{}/rrset", API_VERSION, zone_id);
        let mut sets = Vec::new();
        let mut next: Option<(String, String, Option<String>)> = None;

        loop {
            let mut params: Vec<(&str, &str)> = Vec::new();
            if let Some((name, record_type, identifier)) = &next {
                params.push(("name", name.as_str()));
                params.push(("type", record_type.as_str()));
                if let Some(identifier) = identifier {
                    params.push(("identifier", identifier.as_str()));
                }
            }
            let response = self.api_request(Method::GET, &path, &params, None).await?;

            let parsed: ListResourceRecordSetsResponse = parse_xml(&response)?;
            if let Some(page) = parsed.resource_record_sets {
                sets.extend(page.resource_record_set);
            }

            match (parsed.next_record_name, parsed.next_record_type) {
                (Some(name), Some(record_type)) if parsed.is_truncated => {
                    next = Some((name, record_type, parsed.next_record_identifier));
                }
                _ => break,
            }
        }

        debug!("Listed {} record set(s) in zone {}", sets.len(), zone_id);
        Ok(sets)
    }

    async fn get_change(&self, change_id: &str) -> Result<ChangeInfo> {
        let path = format!("/{}/change/{}", API_VERSION, change_id);
        let response = self.api_request(Method::GET, &path, &[], None).await?;
        let parsed: ChangeInfoResponse = parse_xml(&response)?;
        Ok(parsed.change_info)
    }

    /// Submit one zone's UPSERT batch and wait for it to converge
    async fn update_zone(&self, set: &ZoneRecordSet) -> bool {
        let request = upsert_request(set);
        if request.change_batch.changes.change.is_empty() {
            debug!("No address records to submit for zone {}", set.zone_id);
            return true;
        }

        let body = match xml::change_request_body(&request) {
            Ok(body) => body,
            Err(e) => {
                warn!("Zone {}: {}", set.zone_id, e);
                return false;
            }
        };

        let path = format!("/{}/hostedzone/{}/rrset", API_VERSION, set.zone_id);

        if self.dry_run {
            info!("[DRY-RUN] Would send POST {} with payload: {}", path, body);
            return true;
        }

        info!(
            "Submitting {} UPSERT(s) for zone {}",
            request.change_batch.changes.change.len(),
            set.zone_id
        );

        let change = match self
            .api_request(Method::POST, &path, &[], Some(body))
            .await
            .and_then(|response| parse_xml::<ChangeInfoResponse>(&response))
        {
            Ok(response) => response.change_info,
            Err(e) => {
                warn!("Failed to submit changes for zone {}: {}", set.zone_id, e);
                return false;
            }
        };

        if change.is_insync() {
            return true;
        }

        self.wait_for_insync(&set.zone_id, short_id(&change.id)).await
    }

    /// Poll a change until it is `INSYNC`, within the wait budget
    async fn wait_for_insync(&self, zone_id: &str, change_id: &str) -> bool {
        let poll = async {
            loop {
                tokio::time::sleep(self.poll_interval).await;
                match self.get_change(change_id).await {
                    Ok(info) if info.is_insync() => return true,
                    Ok(info) => {
                        debug!("Change {} for zone {} is {}", change_id, zone_id, info.status)
                    }
                    Err(e) => {
                        warn!(
                            "Failed to poll change {} for zone {}: {}",
                            change_id, zone_id, e
                        );
                        return false;
                    }
                }
            }
        };

        match tokio::time::timeout(self.insync_limit, poll).await {
            Ok(synced) => synced,
            Err(_) => {
                warn!(
                    "Change {} for zone {} not in sync after {:?}",
                    change_id, zone_id, self.insync_limit
                );
                false
            }
        }
    }
}

#[async_trait]
impl DnsRecordClient for Route53Client {
    async fn get_zones_for_records(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let zones: Vec<(String, String)> = self
            .list_hosted_zones()
            .await?
            .into_iter()
            .map(|zone| (short_id(&zone.id).to_string(), normalize_zone_name(&zone.name)))
            .collect();

        Ok(match_zones(&zones, names))
    }

    async fn get_zone_records(&self, names: &[String]) -> Result<Vec<ZoneRecordSet>> {
        let zones = self.get_zones_for_records(names).await?;

        try_join_all(zones.into_iter().map(|(zone_id, zone_names)| async move {
            let listed = self.list_record_sets(&zone_id).await?;
            let records = to_address_records(listed, &zone_names);
            Ok::<_, Error>(ZoneRecordSet::new(zone_id, records))
        }))
        .await
    }

    async fn update_zone_records(&self, sets: &[ZoneRecordSet]) -> Result<ZoneUpdateStatus> {
        let results = join_all(
            sets.iter()
                .map(|set| async move { (set.zone_id.clone(), self.update_zone(set).await) }),
        )
        .await;

        Ok(results.into_iter().collect())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Assign each hostname to the zone with the longest matching suffix
///
/// `zones` holds `(zone_id, zone_name)` pairs with normalized names.
/// Hostnames matching no zone are left out of the result.
pub fn match_zones(
    zones: &[(String, String)],
    names: &[String],
) -> BTreeMap<String, Vec<String>> {
    let mut matched: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for name in names {
        let best = zones
            .iter()
            .filter(|(_, zone_name)| {
                name == zone_name || name.ends_with(&format!(".{}", zone_name))
            })
            .max_by_key(|(_, zone_name)| zone_name.len());

        match best {
            Some((zone_id, _)) => matched
                .entry(zone_id.clone())
                .or_default()
                .push(name.clone()),
            None => warn!("No hosted zone found for {}", name),
        }
    }

    matched
}

fn normalize_zone_name(name: &str) -> String {
    let name = name.to_ascii_lowercase();
    if name.ends_with('.') { name } else { format!("{}.", name) }
}

/// Keep the simple `A`/`AAAA` sets with values whose name is configured
///
/// Alias sets carry no values and routing-policy sets share their
/// `(name, type)` with siblings, so both are left alone.
fn to_address_records(listed: Vec<ResourceRecordSet>, names: &[String]) -> Vec<AddressRecord> {
    listed
        .into_iter()
        .filter_map(|set| {
            let record_type = RecordType::from(set.record_type.as_str());
            let name = set.name.to_ascii_lowercase();
            if !record_type.is_address() || !names.contains(&name) {
                return None;
            }

            if let Some(identifier) = &set.set_identifier {
                warn!(
                    "Skipping routing-policy record set {} {} ({}), only simple records are managed",
                    name, record_type, identifier
                );
                return None;
            }

            let values: Vec<String> = set
                .resource_records
                .map(|records| records.resource_record.into_iter().map(|r| r.value).collect())
                .unwrap_or_default();
            if values.is_empty() {
                debug!("Skipping alias record set {} {}", name, record_type);
                return None;
            }

            let record = AddressRecord::new(name, record_type, values);
            Some(match set.ttl {
                Some(ttl) => record.with_ttl(ttl),
                None => record,
            })
        })
        .collect()
}

fn upsert_request(set: &ZoneRecordSet) -> ChangeResourceRecordSetsRequest {
    let change = set
        .records
        .iter()
        .filter(|record| record.record_type.is_address())
        .map(|record| Change {
            action: "UPSERT".to_string(),
            resource_record_set: ChangeResourceRecordSet {
                name: record.name.clone(),
                record_type: record.record_type.to_string(),
                ttl: record.ttl.unwrap_or(DEFAULT_TTL),
                resource_records: ChangeResourceRecords {
                    resource_record: record
                        .values
                        .iter()
                        .map(|value| ChangeResourceRecord {
                            value: value.clone(),
                        })
                        .collect(),
                },
            },
        })
        .collect();

    ChangeResourceRecordSetsRequest {
        change_batch: ChangeBatch {
            comment: "Updated by r53ddns".to_string(),
            changes: Changes { change },
        },
    }
}

fn parse_xml<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    quick_xml::de::from_str(body)
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))
}

fn endpoint_host(endpoint: &str) -> Result<String> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| Error::config(format!("Invalid Route 53 endpoint {}: {}", endpoint, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::config(format!("Route 53 endpoint {} has no host", endpoint)))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Map a non-success response to a provider error
fn status_error(status: StatusCode, body: &str) -> Error {
    let detail = quick_xml::de::from_str::<ErrorResponse>(body)
        .map(|response| format!("{}: {}", response.error.code, response.error.message))
        .unwrap_or_else(|_| body.trim().to_string());

    let message = match status.as_u16() {
        401 | 403 => format!(
            "Access denied ({}): {}. Run with {}=policy to print the required IAM policy",
            status,
            detail,
            keys::MODE
        ),
        404 => format!("Resource not found ({}): {}", status, detail),
        400 if detail.starts_with("Throttling") => {
            format!("Rate limit exceeded. Please retry later ({}): {}", status, detail)
        }
        429 => format!("Rate limit exceeded. Please retry later ({}): {}", status, detail),
        500..=599 => format!("Route 53 server error (transient) ({}): {}", status, detail),
        _ => format!("Request failed ({}): {}", status, detail),
    };

    Error::provider(PROVIDER, message)
}
