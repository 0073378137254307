//! Public IP Poller
//!
//! Periodically determines the host's public IPv4 (and optionally IPv6)
//! address and hands a [`PublicIpState`] to every subscriber.
//!
//! ## Timing
//!
//! ```text
//!  tick ──▶ lookup v4 ─┐
//!       └─▶ lookup v6 ─┴─▶ PublicIpState ──▶ subscribers
//!           (each bounded by lookup_timeout)
//! ```
//!
//! The interval always exceeds the lookup timeout, so two polls never
//! overlap. A failed or timed out lookup yields `None` for that family.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::records::{IpAddresses, PublicIpState};
use crate::traits::{IpVersion, PublicIpLookup, PublicIpSubscriber};

/// Periodic public IP lookup feeding the subscribers
pub struct PublicIpPoller {
    lookup: Arc<dyn PublicIpLookup>,
    interval: Duration,
    lookup_timeout: Duration,
    ipv6_enabled: bool,
    subscribers: Vec<Arc<dyn PublicIpSubscriber>>,
}

impl PublicIpPoller {
    /// Create a new poller
    ///
    /// # Parameters
    ///
    /// - `lookup`: Public IP lookup used for both families
    /// - `config`: Interval, timeout and IPv6 toggle
    /// - `subscribers`: Notified after every poll, in order
    pub fn new(
        lookup: Arc<dyn PublicIpLookup>,
        config: &PollerConfig,
        subscribers: Vec<Arc<dyn PublicIpSubscriber>>,
    ) -> Self {
        let lookup_timeout = config.lookup_timeout();
        let mut interval = config.interval();

        if interval <= lookup_timeout {
            let raised = lookup_timeout + Duration::from_secs(1);
            warn!(
                "Poll interval {:?} does not exceed lookup timeout {:?}, using {:?}",
                interval, lookup_timeout, raised
            );
            interval = raised;
        }

        Self {
            lookup,
            interval,
            lookup_timeout,
            ipv6_enabled: config.ipv6_enabled,
            subscribers,
        }
    }

    /// Effective interval between polls
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Look up both families once and notify subscribers
    pub async fn poll_once(&self) -> PublicIpState {
        let (v4, v6) = tokio::join!(self.lookup_family(IpVersion::V4), async {
            if self.ipv6_enabled {
                self.lookup_family(IpVersion::V6).await
            } else {
                None
            }
        });

        let state = PublicIpState::new(IpAddresses::new(v4, v6));
        debug!(
            "Public IP poll complete: v4={:?} v6={:?}",
            state.public_ip_addresses.v4, state.public_ip_addresses.v6
        );

        for subscriber in &self.subscribers {
            subscriber.on_public_ip(&state);
        }

        state
    }

    /// Poll forever, starting immediately
    pub async fn run(&self) {
        info!(
            "Public IP poller started (interval {:?}, IPv6 {})",
            self.interval,
            if self.ipv6_enabled { "enabled" } else { "disabled" }
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    /// Run the poller on its own task
    ///
    /// The task only ends when aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn lookup_family(&self, version: IpVersion) -> Option<String> {
        match timeout(self.lookup_timeout, self.lookup.lookup(version)).await {
            Ok(Ok(address)) if version.matches(&address) => Some(address.to_string()),
            Ok(Ok(address)) => {
                warn!(
                    "Public {} lookup returned {} address {}, ignoring",
                    version,
                    address_family(&address),
                    address
                );
                None
            }
            Ok(Err(e)) => {
                warn!("Public {} lookup failed: {}", version, e);
                None
            }
            Err(_) => {
                warn!(
                    "Public {} lookup timed out after {:?}",
                    version, self.lookup_timeout
                );
                None
            }
        }
    }
}

fn address_family(address: &std::net::IpAddr) -> &'static str {
    if address.is_ipv4() { "an IPv4" } else { "an IPv6" }
}
