//! Reconciler
//!
//! The Reconciler turns public IP snapshots into at most one zone-update
//! submission at a time.
//!
//! ## State Machine
//!
//! ```text
//!              handle_public_ip_update
//!   ┌──────┐ ─────────────────────────▶ ┌─────────┐
//!   │ Idle │                            │ Running │ ◀─┐
//!   └──────┘ ◀───────────────────────── └─────────┘   │ cycle done,
//!              cycle done, no deferred       │        │ take deferred
//!                                            │ handle_public_ip_update
//!                                            ▼        │
//!                                     ┌──────────────────┐
//!                                     │ Deferred(latest) │
//!                                     └──────────────────┘
//! ```
//!
//! IP notifications are not a queue. The deferred cell holds only the
//! freshest snapshot; any older deferred snapshot is overwritten.
//!
//! ## Cycle
//!
//! 1. Get current record sets from the [`RecordSetSource`]
//! 2. Build the minimal update batch ([`diff::build_update_batch`])
//! 3. If empty, stop without calling the client
//! 4. Submit, then merge the per-zone outcome back into the source
//!
//! Every cycle diffs against the current cache. There is no shortcut on
//! "last applied IP": the cache may have been corrected since.
//!
//! ## Failures
//!
//! Each cycle runs as its own task. A cycle that errors or panics counts as
//! failed and the chain moves on to any deferred snapshot. A fatal error
//! (no matching records on the very first fetch) is also published through
//! [`Reconciler::wait_for_fatal`] so the process can stop.

pub mod diff;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::records::{PublicIpState, ZoneUpdateStatus};
use crate::source::RecordSetSource;
use crate::traits::{DnsRecordClient, PublicIpSubscriber};

/// Result of one reconciliation cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every record already matched; the client was not called
    UpToDate,
    /// An update batch was submitted
    Submitted {
        /// Per-zone success as reported by the client
        status: ZoneUpdateStatus,
    },
}

/// Single cell holding the reconciler's state
#[derive(Debug)]
enum CycleState {
    Idle,
    Running,
    Deferred(PublicIpState),
}

struct Shared {
    client: Arc<dyn DnsRecordClient>,
    source: Arc<RecordSetSource>,
    cell: Mutex<CycleState>,
    /// `true` while a cycle (or a chain of deferred cycles) is in flight
    busy: watch::Sender<bool>,
    /// First fatal cycle error, if any
    fatal: watch::Sender<Option<Arc<Error>>>,
}

/// Serializing reconciler for public IP updates
///
/// Cloning yields another handle to the same state machine.
#[derive(Clone)]
pub struct Reconciler {
    shared: Arc<Shared>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `client`: DNS record client used for submissions
    /// - `source`: Record set source holding the cached view
    pub fn new(client: Arc<dyn DnsRecordClient>, source: Arc<RecordSetSource>) -> Self {
        let (busy, _) = watch::channel(false);
        let (fatal, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                client,
                source,
                cell: Mutex::new(CycleState::Idle),
                busy,
                fatal,
            }),
        }
    }

    /// Accept a public IP snapshot
    ///
    /// Starts a cycle when idle; otherwise stores the snapshot as the one to
    /// run next, replacing any snapshot already waiting. Never blocks on the
    /// cycle itself. Must be called from within a Tokio runtime.
    pub fn handle_public_ip_update(&self, state: PublicIpState) {
        let mut cell = self.shared.lock_cell();
        if matches!(*cell, CycleState::Idle) {
            *cell = CycleState::Running;
            self.shared.busy.send_replace(true);
            drop(cell);

            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move { shared.run_chain(state).await });
        } else {
            debug!("Reconciliation in flight, deferring public IP update");
            *cell = CycleState::Deferred(state);
        }
    }

    /// Run one cycle directly, bypassing the state machine
    ///
    /// # Errors
    ///
    /// Propagates record fetch errors, including the fatal zero-match error
    /// on a first fetch. Per-zone update failures are not errors.
    pub async fn reconcile(&self, state: &PublicIpState) -> Result<CycleOutcome> {
        self.shared.reconcile(state).await
    }

    /// Wait until the running cycle and any deferred follow-up finish
    pub async fn drain(&self) {
        let mut busy = self.shared.busy.subscribe();
        // The sender lives in `shared`, so this can only fail after drop
        let _ = busy.wait_for(|busy| !*busy).await;
    }

    /// Resolve once a cycle fails with a fatal error
    ///
    /// Pending forever if no fatal error ever occurs.
    pub async fn wait_for_fatal(&self) -> Arc<Error> {
        let mut fatal = self.shared.fatal.subscribe();
        let found = fatal
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|error| (*error).clone());

        match found {
            Some(error) => error,
            None => std::future::pending().await,
        }
    }

    /// Whether no cycle is running or pending
    pub fn is_idle(&self) -> bool {
        matches!(*self.shared.lock_cell(), CycleState::Idle)
    }
}

impl PublicIpSubscriber for Reconciler {
    fn on_public_ip(&self, state: &PublicIpState) {
        self.handle_public_ip_update(state.clone());
    }
}

impl Shared {
    fn lock_cell(&self) -> MutexGuard<'_, CycleState> {
        // The cell is only ever assigned whole, a poisoned guard is still consistent
        self.cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_chain(self: Arc<Self>, mut state: PublicIpState) {
        loop {
            let shared = Arc::clone(&self);
            let cycle = tokio::spawn(async move { shared.reconcile(&state).await });

            match cycle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) if e.is_fatal() => {
                    error!("Reconciliation cannot proceed: {}", e);
                    self.fatal.send_if_modified(|fatal| {
                        let first = fatal.is_none();
                        if first {
                            *fatal = Some(Arc::new(e));
                        }
                        first
                    });
                }
                Ok(Err(e)) => {
                    error!("Reconciliation cycle failed, will retry next poll: {}", e);
                }
                Err(e) => {
                    error!("Reconciliation cycle aborted, will retry next poll: {}", e);
                }
            }

            let next = {
                let mut cell = self.lock_cell();
                match std::mem::replace(&mut *cell, CycleState::Idle) {
                    CycleState::Deferred(next) => {
                        *cell = CycleState::Running;
                        Some(next)
                    }
                    _ => {
                        // Flipped under the cell lock so drain() never sees a stale `false`
                        self.busy.send_replace(false);
                        None
                    }
                }
            };

            match next {
                Some(next) => {
                    debug!("Starting deferred reconciliation");
                    state = next;
                }
                None => return,
            }
        }
    }

    async fn reconcile(&self, state: &PublicIpState) -> Result<CycleOutcome> {
        let target = &state.public_ip_addresses;
        debug!(
            "Reconciling against public IPs v4={:?} v6={:?} (observed {})",
            target.v4, target.v6, state.observed_at
        );

        let sets = self.source.get_records().await?;
        let batch = diff::build_update_batch(&sets, target);

        if batch.is_empty() {
            info!("All DNS records up to date, no update needed");
            return Ok(CycleOutcome::UpToDate);
        }

        info!(
            "Submitting updates for {} zone(s) via {}",
            batch.len(),
            self.client.provider_name()
        );

        let status = match self.client.update_zone_records(&batch).await {
            Ok(status) => status,
            Err(e) => {
                error!("Zone update submission failed: {}", e);
                batch
                    .iter()
                    .map(|set| (set.zone_id.clone(), false))
                    .collect()
            }
        };

        for (zone_id, synced) in &status {
            if *synced {
                info!("Zone {} updated and in sync", zone_id);
            }
        }

        self.source.update_records_after_sync(&batch, &status).await;

        Ok(CycleOutcome::Submitted { status })
    }
}
