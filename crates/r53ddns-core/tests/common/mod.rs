//! Test doubles and common utilities for contract tests
//!
//! The doubles only count, record and gate calls; none of them talk to a
//! network.

#![allow(dead_code)]

use async_trait::async_trait;
use r53ddns_core::error::{Error, Result};
use r53ddns_core::records::{
    AddressRecord, DnsAddressRecordState, IpAddresses, PublicIpState, RecordType, ZoneRecordSet,
    ZoneUpdateStatus,
};
use r53ddns_core::traits::{
    DnsRecordClient, IpVersion, PublicIpLookup, PublicIpSubscriber, RecordStateSubscriber,
};
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// A DNS record client serving fixed record sets and recording submissions
pub struct MockDnsRecordClient {
    records: Mutex<Vec<ZoneRecordSet>>,
    fetch_count: AtomicUsize,
    submissions: Mutex<Vec<Vec<ZoneRecordSet>>>,
    failing_zones: Mutex<HashSet<String>>,
    fail_updates: AtomicBool,
    fail_fetches: AtomicBool,
    panic_next_update: AtomicBool,
    /// When set, each update waits for one permit before returning
    gate: Option<Arc<Semaphore>>,
}

impl MockDnsRecordClient {
    pub fn new(records: Vec<ZoneRecordSet>) -> Self {
        Self {
            records: Mutex::new(records),
            fetch_count: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            failing_zones: Mutex::new(HashSet::new()),
            fail_updates: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
            panic_next_update: AtomicBool::new(false),
            gate: None,
        }
    }

    /// Hold every update until the returned semaphore hands out a permit
    pub fn gated(records: Vec<ZoneRecordSet>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut client = Self::new(records);
        client.gate = Some(Arc::clone(&gate));
        (client, gate)
    }

    pub fn set_records(&self, records: Vec<ZoneRecordSet>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn fail_zone(&self, zone_id: &str) {
        self.failing_zones.lock().unwrap().insert(zone_id.to_string());
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Panic inside the next update call, after recording it
    pub fn panic_next_update(&self) {
        self.panic_next_update.store(true, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn submissions(&self) -> Vec<Vec<ZoneRecordSet>> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsRecordClient for MockDnsRecordClient {
    async fn get_zones_for_records(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let records = self.records.lock().unwrap().clone();
        let mut zones = BTreeMap::new();
        for set in records {
            let matched: Vec<String> = set
                .records
                .iter()
                .filter(|record| names.contains(&record.name))
                .map(|record| record.name.clone())
                .collect();
            zones.insert(set.zone_id, matched);
        }
        Ok(zones)
    }

    async fn get_zone_records(&self, _names: &[String]) -> Result<Vec<ZoneRecordSet>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(Error::dns_client("list failed"));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update_zone_records(&self, sets: &[ZoneRecordSet]) -> Result<ZoneUpdateStatus> {
        self.submissions.lock().unwrap().push(sets.to_vec());

        if self.panic_next_update.swap(false, Ordering::SeqCst) {
            panic!("update_zone_records blew up");
        }

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::dns_client("update failed"));
        }

        let failing = self.failing_zones.lock().unwrap().clone();
        Ok(sets
            .iter()
            .map(|set| (set.zone_id.clone(), !failing.contains(&set.zone_id)))
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A lookup returning fixed results per family
pub struct MockIpLookup {
    v4: Option<IpAddr>,
    v6: Option<IpAddr>,
    delay: Option<std::time::Duration>,
    call_count: AtomicUsize,
}

impl MockIpLookup {
    pub fn new(v4: Option<&str>, v6: Option<&str>) -> Self {
        Self {
            v4: v4.map(|ip| ip.parse().unwrap()),
            v6: v6.map(|ip| ip.parse().unwrap()),
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Every lookup sleeps this long before answering
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PublicIpLookup for MockIpLookup {
    async fn lookup(&self, version: IpVersion) -> Result<IpAddr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let found = match version {
            IpVersion::V4 => self.v4,
            IpVersion::V6 => self.v6,
        };
        found.ok_or_else(|| Error::ip_lookup(format!("no {} address", version)))
    }
}

/// Records every notification it receives
#[derive(Default)]
pub struct RecordingSubscriber {
    pub public_ips: Mutex<Vec<PublicIpState>>,
    pub retrieved: Mutex<Vec<DnsAddressRecordState>>,
    pub updated: Mutex<Vec<DnsAddressRecordState>>,
}

impl PublicIpSubscriber for RecordingSubscriber {
    fn on_public_ip(&self, state: &PublicIpState) {
        self.public_ips.lock().unwrap().push(state.clone());
    }
}

impl RecordStateSubscriber for RecordingSubscriber {
    fn on_records_retrieved(&self, state: &DnsAddressRecordState) {
        self.retrieved.lock().unwrap().push(state.clone());
    }

    fn on_records_updated(&self, state: &DnsAddressRecordState) {
        self.updated.lock().unwrap().push(state.clone());
    }
}

/// Zone with one A and one AAAA record for `sub.test.tld.`
pub fn dual_stack_zone(zone_id: &str, v4: &str, v6: &str) -> ZoneRecordSet {
    ZoneRecordSet::new(
        zone_id,
        vec![
            AddressRecord::new("sub.test.tld.", RecordType::A, [v4]),
            AddressRecord::new("sub.test.tld.", RecordType::Aaaa, [v6]),
        ],
    )
}

pub fn public_ip(v4: Option<&str>, v6: Option<&str>) -> PublicIpState {
    PublicIpState::new(IpAddresses::new(
        v4.map(str::to_string),
        v6.map(str::to_string),
    ))
}

pub fn hostnames() -> Vec<String> {
    vec!["sub.test.tld.".to_string()]
}
