//! Pending operator decisions
//!
//! Each incident waiting on an operator owns one registry entry holding the
//! sending half of a oneshot channel. Whoever removes the entry from the
//! store owns the resolution: `resolve` delivers the operator's decision,
//! the waiter's deadline delivers TIMEOUT. Removal is a single locked
//! operation, so exactly one side wins and the other sees the entry gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use laneguard_core::{Decision, IncidentId, LaneguardError, LaneguardResult};

/// Default wait for an operator verdict
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(30);

/// One registered wait
pub struct PendingEntry {
    ticket: u64,
    deadline: Instant,
    sender: oneshot::Sender<Decision>,
}

impl PendingEntry {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Hand the decision to the waiter; false if it already went away
    pub fn deliver(self, decision: Decision) -> bool {
        self.sender.send(decision).is_ok()
    }
}

impl std::fmt::Debug for PendingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingEntry")
            .field("ticket", &self.ticket)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Registry of pending decisions keyed by incident id.
///
/// Implementations must make `claim` and `claim_ticket` atomic
/// remove-and-return operations.
pub trait PendingStore: Send + Sync {
    /// Insert unless the id is already pending; the entry is handed back on conflict
    fn insert(&self, id: IncidentId, entry: PendingEntry) -> Result<(), PendingEntry>;

    /// Remove whatever entry is registered for `id`
    fn claim(&self, id: &IncidentId) -> Option<PendingEntry>;

    /// Remove the entry only if it is still the one with `ticket`
    fn claim_ticket(&self, id: &IncidentId, ticket: u64) -> Option<PendingEntry>;

    fn contains(&self, id: &IncidentId) -> bool;

    fn ids(&self) -> Vec<IncidentId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local registry
#[derive(Debug, Default)]
pub struct InMemoryPendingStore {
    entries: Mutex<HashMap<IncidentId, PendingEntry>>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PendingStore for InMemoryPendingStore {
    fn insert(&self, id: IncidentId, entry: PendingEntry) -> Result<(), PendingEntry> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return Err(entry);
        }
        entries.insert(id, entry);
        Ok(())
    }

    fn claim(&self, id: &IncidentId) -> Option<PendingEntry> {
        self.entries.lock().remove(id)
    }

    fn claim_ticket(&self, id: &IncidentId, ticket: u64) -> Option<PendingEntry> {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(entry) if entry.ticket == ticket => entries.remove(id),
            _ => None,
        }
    }

    fn contains(&self, id: &IncidentId) -> bool {
        self.entries.lock().contains_key(id)
    }

    fn ids(&self) -> Vec<IncidentId> {
        self.entries.lock().keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Correlates incidents with operator decisions
pub struct DecisionCoordinator {
    store: Arc<dyn PendingStore>,
    next_ticket: AtomicU64,
    default_timeout: Duration,
}

impl DecisionCoordinator {
    /// Coordinator over a process-local registry
    pub fn new(default_timeout: Duration) -> Self {
        Self::with_store(Arc::new(InMemoryPendingStore::new()), default_timeout)
    }

    pub fn with_store(store: Arc<dyn PendingStore>, default_timeout: Duration) -> Self {
        DecisionCoordinator {
            store,
            next_ticket: AtomicU64::new(1),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Register a wait for `id`. The entry exists as soon as this returns,
    /// so a decision submitted before the caller starts awaiting is kept.
    pub fn register(&self, id: IncidentId, timeout: Duration) -> LaneguardResult<DecisionWaiter> {
        let (sender, receiver) = oneshot::channel();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;

        let entry = PendingEntry {
            ticket,
            deadline,
            sender,
        };
        if self.store.insert(id.clone(), entry).is_err() {
            return Err(LaneguardError::DuplicatePending(id));
        }
        debug!(incident_id = %id, timeout_ms = timeout.as_millis() as u64, "awaiting operator decision");

        Ok(DecisionWaiter {
            id,
            ticket,
            deadline,
            receiver,
            store: Arc::clone(&self.store),
            finished: false,
        })
    }

    /// Register and wait in one step
    pub async fn await_decision(
        &self,
        id: IncidentId,
        timeout: Duration,
    ) -> LaneguardResult<Decision> {
        Ok(self.register(id, timeout)?.wait().await)
    }

    /// Deliver an operator decision. Fails with `DuplicateResolution` when
    /// nothing is pending for `id` (already resolved, timed out, or unknown).
    pub fn resolve(&self, id: &IncidentId, decision: Decision) -> LaneguardResult<()> {
        let Some(entry) = self.store.claim(id) else {
            warn!(incident_id = %id, "no pending decision; resolve ignored");
            return Err(LaneguardError::DuplicateResolution(id.clone()));
        };

        let status = decision.status;
        if entry.deliver(decision) {
            info!(incident_id = %id, %status, "operator decision delivered");
        } else {
            debug!(incident_id = %id, "waiter dropped before decision arrived");
        }
        Ok(())
    }

    pub fn is_pending(&self, id: &IncidentId) -> bool {
        self.store.contains(id)
    }

    pub fn pending_ids(&self) -> Vec<IncidentId> {
        self.store.ids()
    }

    pub fn pending_count(&self) -> usize {
        self.store.len()
    }

    /// Drop every pending entry. Waiters see a closed channel and resolve
    /// as TIMEOUT. Used at shutdown.
    pub fn close_all(&self) -> usize {
        let closed = self
            .store
            .ids()
            .iter()
            .filter(|id| self.store.claim(id).is_some())
            .count();
        if closed > 0 {
            info!(closed, "pending decisions closed");
        }
        closed
    }
}

impl Default for DecisionCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_DECISION_TIMEOUT)
    }
}

/// The waiting side of one registered incident
pub struct DecisionWaiter {
    id: IncidentId,
    ticket: u64,
    deadline: Instant,
    receiver: oneshot::Receiver<Decision>,
    store: Arc<dyn PendingStore>,
    finished: bool,
}

impl DecisionWaiter {
    pub fn incident_id(&self) -> &IncidentId {
        &self.id
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Suspend until the operator decides or the deadline passes
    pub async fn wait(mut self) -> Decision {
        let decision = match tokio::time::timeout_at(self.deadline, &mut self.receiver).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => {
                warn!(incident_id = %self.id, "decision channel closed; treating as timeout");
                Decision::timed_out()
            }
            Err(_) => {
                if self.store.claim_ticket(&self.id, self.ticket).is_some() {
                    warn!(incident_id = %self.id, "no operator decision before deadline; incident unresolved");
                    Decision::timed_out()
                } else {
                    // resolve() claimed the entry first and is sending
                    (&mut self.receiver)
                        .await
                        .unwrap_or_else(|_| Decision::timed_out())
                }
            }
        };
        self.finished = true;
        decision
    }
}

impl Drop for DecisionWaiter {
    fn drop(&mut self) {
        if !self.finished && self.store.claim_ticket(&self.id, self.ticket).is_some() {
            debug!(incident_id = %self.id, "waiter abandoned; pending entry removed");
        }
    }
}
