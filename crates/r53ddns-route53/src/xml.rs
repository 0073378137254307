//! Route 53 REST API XML bodies
//!
//! Only the elements the client reads or writes are modeled; unknown
//! elements are ignored on deserialization.

use r53ddns_core::{Error, Result};
use serde::{Deserialize, Serialize};

pub(crate) const XMLNS: &str = "https://route53.amazonaws.com/doc/2013-04-01/";

#[derive(Debug, Deserialize)]
pub(crate) struct ListHostedZonesResponse {
    #[serde(rename = "HostedZones")]
    pub hosted_zones: Option<HostedZones>,
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: bool,
    #[serde(rename = "NextMarker")]
    pub next_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostedZones {
    #[serde(rename = "HostedZone", default)]
    pub hosted_zone: Vec<HostedZone>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostedZone {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Config")]
    pub config: Option<HostedZoneConfig>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HostedZoneConfig {
    #[serde(rename = "PrivateZone", default)]
    pub private_zone: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResourceRecordSetsResponse {
    #[serde(rename = "ResourceRecordSets")]
    pub resource_record_sets: Option<ResourceRecordSets>,
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: bool,
    #[serde(rename = "NextRecordName")]
    pub next_record_name: Option<String>,
    #[serde(rename = "NextRecordType")]
    pub next_record_type: Option<String>,
    #[serde(rename = "NextRecordIdentifier")]
    pub next_record_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceRecordSets {
    #[serde(rename = "ResourceRecordSet", default)]
    pub resource_record_set: Vec<ResourceRecordSet>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceRecordSet {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    /// Present on weighted, latency and other routing-policy sets
    #[serde(rename = "SetIdentifier")]
    pub set_identifier: Option<String>,
    #[serde(rename = "TTL")]
    pub ttl: Option<u32>,
    #[serde(rename = "ResourceRecords")]
    pub resource_records: Option<ResourceRecords>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceRecords {
    #[serde(rename = "ResourceRecord", default)]
    pub resource_record: Vec<ResourceRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceRecord {
    #[serde(rename = "Value")]
    pub value: String,
}

/// Shared by ChangeResourceRecordSets and GetChange responses
#[derive(Debug, Deserialize)]
pub(crate) struct ChangeInfoResponse {
    #[serde(rename = "ChangeInfo")]
    pub change_info: ChangeInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChangeInfo {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Status")]
    pub status: String,
}

impl ChangeInfo {
    pub fn is_insync(&self) -> bool {
        self.status == "INSYNC"
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(rename = "Error")]
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeResourceRecordSetsRequest {
    #[serde(rename = "ChangeBatch")]
    pub change_batch: ChangeBatch,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeBatch {
    #[serde(rename = "Comment")]
    pub comment: String,
    #[serde(rename = "Changes")]
    pub changes: Changes,
}

#[derive(Debug, Serialize)]
pub(crate) struct Changes {
    #[serde(rename = "Change")]
    pub change: Vec<Change>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Change {
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "ResourceRecordSet")]
    pub resource_record_set: ChangeResourceRecordSet,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeResourceRecordSet {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(rename = "TTL")]
    pub ttl: u32,
    #[serde(rename = "ResourceRecords")]
    pub resource_records: ChangeResourceRecords,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeResourceRecords {
    #[serde(rename = "ResourceRecord")]
    pub resource_record: Vec<ChangeResourceRecord>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChangeResourceRecord {
    #[serde(rename = "Value")]
    pub value: String,
}

/// Serialize a change request with the Route 53 namespace on its root
pub(crate) fn change_request_body(request: &ChangeResourceRecordSetsRequest) -> Result<String> {
    let body = quick_xml::se::to_string(request).map_err(|e| {
        Error::provider("route53", format!("Failed to serialize change batch: {}", e))
    })?;
    Ok(body.replace(
        "<ChangeResourceRecordSetsRequest>",
        &format!("<ChangeResourceRecordSetsRequest xmlns=\"{}\">", XMLNS),
    ))
}

/// Strip the `/hostedzone/` or `/change/` prefix from a Route 53 id
pub(crate) fn short_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}
