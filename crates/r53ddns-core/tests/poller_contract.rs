//! Contract Test: Public IP Poller
//!
//! Constraints verified:
//! - Every poll notifies every subscriber with one snapshot
//! - Failed or slow lookups become `None`, never an error
//! - IPv6 is not looked up when disabled
//! - The spawned poller ticks immediately and then once per interval

mod common;

use common::*;
use r53ddns_core::{
    FetchPolicy, PollerConfig, PublicIpPoller, PublicIpSubscriber, RecordSetSource, Reconciler,
};
use std::sync::Arc;
use std::time::Duration;

fn poller_config(ipv6_enabled: bool) -> PollerConfig {
    PollerConfig {
        interval_secs: 60,
        lookup_timeout_secs: 10,
        ipv6_enabled,
    }
}

#[tokio::test]
async fn poll_notifies_every_subscriber() {
    let lookup = Arc::new(MockIpLookup::new(Some("10.10.10.10"), Some("1000::1000")));
    let first = Arc::new(RecordingSubscriber::default());
    let second = Arc::new(RecordingSubscriber::default());
    let poller = PublicIpPoller::new(
        lookup,
        &poller_config(true),
        vec![
            first.clone() as Arc<dyn PublicIpSubscriber>,
            second.clone() as Arc<dyn PublicIpSubscriber>,
        ],
    );

    let state = poller.poll_once().await;

    assert_eq!(state.public_ip_addresses.v4.as_deref(), Some("10.10.10.10"));
    assert_eq!(state.public_ip_addresses.v6.as_deref(), Some("1000::1000"));
    assert_eq!(*first.public_ips.lock().unwrap(), vec![state.clone()]);
    assert_eq!(*second.public_ips.lock().unwrap(), vec![state]);
}

#[tokio::test]
async fn ipv6_skipped_when_disabled() {
    let lookup = Arc::new(MockIpLookup::new(Some("10.10.10.10"), Some("1000::1000")));
    let poller = PublicIpPoller::new(lookup.clone(), &poller_config(false), Vec::new());

    let state = poller.poll_once().await;

    assert_eq!(state.public_ip_addresses.v6, None);
    assert_eq!(lookup.call_count(), 1);
}

#[tokio::test]
async fn failed_lookup_yields_none() {
    let lookup = Arc::new(MockIpLookup::new(None, Some("1000::1000")));
    let poller = PublicIpPoller::new(lookup, &poller_config(true), Vec::new());

    let state = poller.poll_once().await;

    assert_eq!(state.public_ip_addresses.v4, None);
    assert_eq!(state.public_ip_addresses.v6.as_deref(), Some("1000::1000"));
}

#[tokio::test(start_paused = true)]
async fn slow_lookup_times_out_to_none() {
    let lookup = Arc::new(
        MockIpLookup::new(Some("10.10.10.10"), None).with_delay(Duration::from_secs(30)),
    );
    let poller = PublicIpPoller::new(lookup, &poller_config(false), Vec::new());

    let state = poller.poll_once().await;

    assert_eq!(state.public_ip_addresses.v4, None);
}

#[tokio::test(start_paused = true)]
async fn spawned_poller_ticks_per_interval() {
    let lookup = Arc::new(MockIpLookup::new(Some("10.10.10.10"), None));
    let subscriber = Arc::new(RecordingSubscriber::default());
    let subscribers: Vec<Arc<dyn PublicIpSubscriber>> = vec![subscriber.clone()];
    let poller = PublicIpPoller::new(lookup, &poller_config(false), subscribers);

    let handle = poller.spawn();
    tokio::time::sleep(Duration::from_secs(150)).await;
    handle.abort();

    // Ticks at 0s, 60s and 120s
    assert_eq!(subscriber.public_ips.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn reconciler_receives_polled_addresses() {
    let client = Arc::new(MockDnsRecordClient::new(vec![dual_stack_zone(
        "TEST_ID",
        "10.10.10.10",
        "1000::1000",
    )]));
    let source = Arc::new(RecordSetSource::new(
        client.clone(),
        FetchPolicy::Cached,
        hostnames(),
    ));
    let reconciler = Reconciler::new(client.clone(), source);
    let lookup = Arc::new(MockIpLookup::new(Some("10.10.10.11"), None));
    let subscribers: Vec<Arc<dyn PublicIpSubscriber>> = vec![Arc::new(reconciler.clone())];
    let poller = PublicIpPoller::new(lookup, &poller_config(false), subscribers);

    poller.poll_once().await;
    tokio_test::assert_ok!(tokio::time::timeout(Duration::from_secs(5), reconciler.drain()).await);

    assert_eq!(
        client.submissions(),
        vec![vec![dual_stack_zone("TEST_ID", "10.10.10.11", "1000::1000")]]
    );
}
