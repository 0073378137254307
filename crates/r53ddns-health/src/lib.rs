// # Health Reporter
//
// Keeps the latest public IP observation and the latest record view, and
// serves them as JSON on every GET path.
//
// ## Snapshot
//
// ```json
// {
//   "publicIpAddresses": { "v4": "10.10.10.10", "v6": null },
//   "lastPublicIpDateTime": "2024-01-01T00:00:00Z",
//   "dnsRecords": [{ "name": "sub.test.tld.", "type": "A", "value": "10.10.10.10" }],
//   "lastUpdateDateTime": null
// }
// ```
//
// `lastUpdateDateTime` only moves when a reconciliation cycle merged records,
// not when records were merely fetched.

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use chrono::{DateTime, Utc};
use r53ddns_core::records::{DnsAddressRecord, DnsAddressRecordState, IpAddresses, PublicIpState};
use r53ddns_core::traits::{PublicIpSubscriber, RecordStateSubscriber};
use r53ddns_core::Result;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Health snapshot served to clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub public_ip_addresses: IpAddresses,
    pub last_public_ip_date_time: Option<DateTime<Utc>>,
    pub dns_records: Vec<DnsAddressRecord>,
    pub last_update_date_time: Option<DateTime<Utc>>,
}

/// Shared health state; a subscriber of both the poller and the record source
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    inner: Arc<RwLock<HealthSnapshot>>,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> HealthSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut HealthSnapshot)) {
        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut snapshot);
    }
}

impl PublicIpSubscriber for HealthState {
    fn on_public_ip(&self, state: &PublicIpState) {
        self.update(|snapshot| {
            snapshot.public_ip_addresses = state.public_ip_addresses.clone();
            snapshot.last_public_ip_date_time = Some(state.observed_at);
        });
    }
}

impl RecordStateSubscriber for HealthState {
    fn on_records_retrieved(&self, state: &DnsAddressRecordState) {
        self.update(|snapshot| snapshot.dns_records = state.dns_records.clone());
    }

    fn on_records_updated(&self, state: &DnsAddressRecordState) {
        self.update(|snapshot| {
            snapshot.dns_records = state.dns_records.clone();
            snapshot.last_update_date_time = Some(state.last_change);
        });
    }
}

/// Router answering every GET with the snapshot
pub fn router(state: HealthState) -> Router {
    Router::new().fallback(health_handler).with_state(state)
}

async fn health_handler(State(state): State<HealthState>) -> Json<HealthSnapshot> {
    debug!("Serving health snapshot");
    Json(state.snapshot())
}

/// Running health endpoint
#[derive(Debug)]
pub struct HealthServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl HealthServer {
    /// Bind `host:port` and serve the snapshot in the background
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(state: HealthState, host: &str, port: u16) -> Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let local_addr = listener.local_addr()?;
        info!("Health endpoint listening on http://{}", local_addr);

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router(state)).await {
                error!("Health endpoint stopped: {}", e);
            }
        });

        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop serving
    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::TimeZone;
    use http_body_util::BodyExt;
    use r53ddns_core::records::RecordType;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn records_state(value: &str, minute: u32) -> DnsAddressRecordState {
        DnsAddressRecordState {
            dns_records: vec![DnsAddressRecord {
                name: "test.host.tld".to_string(),
                record_type: RecordType::A,
                value: value.to_string(),
            }],
            last_change: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
        }
    }

    async fn get_json(state: &HealthState, uri: &str) -> Value {
        let response = router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_empty() {
        let state = HealthState::new();

        let json = get_json(&state, "/").await;

        assert_eq!(
            json,
            json!({
                "publicIpAddresses": { "v4": null, "v6": null },
                "lastPublicIpDateTime": null,
                "dnsRecords": [],
                "lastUpdateDateTime": null,
            })
        );
    }

    #[tokio::test]
    async fn test_retrieved_records_do_not_set_update_time() {
        let state = HealthState::new();
        state.on_records_retrieved(&records_state("10.10.10.10", 0));

        let json = get_json(&state, "/any/path").await;

        assert_eq!(
            json["dnsRecords"],
            json!([{ "name": "test.host.tld", "type": "A", "value": "10.10.10.10" }])
        );
        assert!(json["lastUpdateDateTime"].is_null());
    }

    #[tokio::test]
    async fn test_updated_records_set_update_time() {
        let state = HealthState::new();
        state.on_records_retrieved(&records_state("10.10.10.10", 0));
        state.on_records_updated(&records_state("10.10.10.11", 5));

        let json = get_json(&state, "/").await;

        assert_eq!(json["dnsRecords"][0]["value"], "10.10.10.11");
        assert_eq!(json["lastUpdateDateTime"], "2024-01-01T00:05:00Z");
    }

    #[tokio::test]
    async fn test_public_ip_event_recorded() {
        let state = HealthState::new();
        let observed_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        state.on_public_ip(&PublicIpState {
            public_ip_addresses: IpAddresses::new(Some("10.10.10.10".to_string()), None),
            observed_at,
        });

        let json = get_json(&state, "/health").await;

        assert_eq!(json["publicIpAddresses"], json!({ "v4": "10.10.10.10", "v6": null }));
        assert_eq!(json["lastPublicIpDateTime"], "2024-01-01T00:01:00Z");
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = HealthServer::start(HealthState::new(), "127.0.0.1", 0)
            .await
            .unwrap();

        assert_ne!(server.local_addr().port(), 0);
        server.shutdown();
    }
}
