//! Data model shared by the Record Set Source, the Reconciler and the
//! collaborators around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Per-zone success flags reported by a DNS record client after an update
pub type ZoneUpdateStatus = HashMap<String, bool>;

/// Last observed public address pair
///
/// `None` means "not determined this cycle", never "clear the record".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddresses {
    pub v4: Option<String>,
    pub v6: Option<String>,
}

impl IpAddresses {
    pub fn new(v4: Option<String>, v6: Option<String>) -> Self {
        Self { v4, v6 }
    }

    /// Address to publish for a record of the given type, if known
    pub fn for_record_type(&self, record_type: &RecordType) -> Option<&str> {
        match record_type {
            RecordType::A => self.v4.as_deref(),
            RecordType::Aaaa => self.v6.as_deref(),
            RecordType::Other(_) => None,
        }
    }
}

/// Snapshot produced once per poll cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpState {
    pub public_ip_addresses: IpAddresses,
    pub observed_at: DateTime<Utc>,
}

impl PublicIpState {
    pub fn new(public_ip_addresses: IpAddresses) -> Self {
        Self {
            public_ip_addresses,
            observed_at: Utc::now(),
        }
    }
}

/// DNS resource record type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Anything else; passed through untouched
    Other(String),
}

impl RecordType {
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Other(other) => other,
        }
    }

    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            other => RecordType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RecordType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecordType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(RecordType::from(raw.as_str()))
    }
}

/// One A or AAAA resource record set as held by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub name: String,
    pub record_type: RecordType,
    /// TTL reported by the provider; preserved on update
    pub ttl: Option<u32>,
    pub values: Vec<String>,
}

impl AddressRecord {
    pub fn new(
        name: impl Into<String>,
        record_type: RecordType,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            ttl: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Copy of this record with its values replaced by a single address
    pub fn with_value(&self, value: &str) -> Self {
        Self {
            values: vec![value.to_string()],
            ..self.clone()
        }
    }

    /// Whether the record holds exactly `value` and nothing else
    pub fn matches_value(&self, value: &str) -> bool {
        self.values.len() == 1 && self.values[0] == value
    }
}

/// All relevant address records of one zone; the unit of update submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecordSet {
    pub zone_id: String,
    pub records: Vec<AddressRecord>,
}

impl ZoneRecordSet {
    pub fn new(zone_id: impl Into<String>, records: Vec<AddressRecord>) -> Self {
        Self {
            zone_id: zone_id.into(),
            records,
        }
    }
}

/// Flattened `(name, type, value)` view used for health reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsAddressRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub value: String,
}

/// Flattened record view plus the time it was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsAddressRecordState {
    pub dns_records: Vec<DnsAddressRecord>,
    pub last_change: DateTime<Utc>,
}

impl DnsAddressRecordState {
    /// Flatten zone record sets, one entry per record value
    pub fn from_zone_sets(sets: &[ZoneRecordSet]) -> Self {
        let dns_records = sets
            .iter()
            .flat_map(|set| set.records.iter())
            .flat_map(|record| {
                record.values.iter().map(|value| DnsAddressRecord {
                    name: record.name.clone(),
                    record_type: record.record_type.clone(),
                    value: value.clone(),
                })
            })
            .collect();

        Self {
            dns_records,
            last_change: Utc::now(),
        }
    }
}
