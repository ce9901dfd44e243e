//! Duplicate notification suppression
//!
//! laneguard and a cooperating incident system notify each other about
//! accidents. Without suppression, a report we send comes straight back as
//! an inbound report, gets relayed, is sent again, and loops forever. Every
//! outbound notification leaves a marker keyed by rounded position and node;
//! an inbound report that hits a fresh marker is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use laneguard_core::{Coordinates, NodeId};

/// How long a marker suppresses echoes
pub const SUPPRESSION_TTL: Duration = Duration::from_secs(15);

/// Coordinates are compared at 4 decimal places (~11 m)
const COORDINATE_SCALE: f64 = 10_000.0;

/// (lat, lng) rounded to 4 decimals, plus the node or a wildcard
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    lat_e4: i64,
    lng_e4: i64,
    node: Option<NodeId>,
}

impl MarkerKey {
    pub fn new(coordinates: Coordinates, node: Option<&NodeId>) -> Self {
        MarkerKey {
            lat_e4: (coordinates.lat * COORDINATE_SCALE).round() as i64,
            lng_e4: (coordinates.lng * COORDINATE_SCALE).round() as i64,
            node: node.cloned(),
        }
    }

    pub fn wildcard(coordinates: Coordinates) -> Self {
        Self::new(coordinates, None)
    }

    pub fn is_wildcard(&self) -> bool {
        self.node.is_none()
    }
}

/// Marker cache with lazy expiry.
///
/// `check_and_mark` must be atomic per key.
pub trait MarkerStore: Send + Sync {
    fn mark(&self, key: MarkerKey, at: Instant);

    /// Whether `key` was marked within `ttl` of `now`; stale markers are evicted
    fn is_fresh(&self, key: &MarkerKey, now: Instant, ttl: Duration) -> bool;

    /// Returns true and marks `key` if no fresh marker exists, false otherwise
    fn check_and_mark(&self, key: MarkerKey, now: Instant, ttl: Duration) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local marker cache
#[derive(Debug, Default)]
pub struct InMemoryMarkerStore {
    markers: Mutex<HashMap<MarkerKey, Instant>>,
}

impl InMemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn fresh(marked_at: Instant, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(marked_at) < ttl
}

impl MarkerStore for InMemoryMarkerStore {
    fn mark(&self, key: MarkerKey, at: Instant) {
        self.markers.lock().insert(key, at);
    }

    fn is_fresh(&self, key: &MarkerKey, now: Instant, ttl: Duration) -> bool {
        let mut markers = self.markers.lock();
        match markers.get(key) {
            Some(&at) if fresh(at, now, ttl) => true,
            Some(_) => {
                markers.remove(key);
                false
            }
            None => false,
        }
    }

    fn check_and_mark(&self, key: MarkerKey, now: Instant, ttl: Duration) -> bool {
        let mut markers = self.markers.lock();
        if let Some(&at) = markers.get(&key) {
            if fresh(at, now, ttl) {
                return false;
            }
        }
        markers.insert(key, now);
        true
    }

    fn len(&self) -> usize {
        self.markers.lock().len()
    }
}

/// Guards the relay path between laneguard and the cooperating system
pub struct NotificationSuppressor {
    store: Arc<dyn MarkerStore>,
    ttl: Duration,
}

impl NotificationSuppressor {
    pub fn new(ttl: Duration) -> Self {
        Self::with_store(Arc::new(InMemoryMarkerStore::new()), ttl)
    }

    pub fn with_store(store: Arc<dyn MarkerStore>, ttl: Duration) -> Self {
        NotificationSuppressor { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record an outbound notification under both the node key and the
    /// wildcard key, so echoes that lost the node id still match.
    pub fn mark_outbound(&self, coordinates: Coordinates, node: Option<&NodeId>) {
        let now = Instant::now();
        if node.is_some() {
            self.store.mark(MarkerKey::new(coordinates, node), now);
        }
        self.store.mark(MarkerKey::wildcard(coordinates), now);
        debug!(lat = coordinates.lat, lng = coordinates.lng, "outbound notification marked");
    }

    /// Whether an inbound report matches a fresh marker
    pub fn is_echo(&self, coordinates: Coordinates, node: Option<&NodeId>) -> bool {
        self.store
            .is_fresh(&MarkerKey::new(coordinates, node), Instant::now(), self.ttl)
    }

    /// Atomic check-and-mark for an inbound report. Returns false when the
    /// report must be dropped.
    pub fn should_relay(&self, coordinates: Coordinates, node: Option<&NodeId>) -> bool {
        let relay = self
            .store
            .check_and_mark(MarkerKey::new(coordinates, node), Instant::now(), self.ttl);
        if !relay {
            info!(
                lat = coordinates.lat,
                lng = coordinates.lng,
                node = node.map(NodeId::as_str).unwrap_or("*"),
                "suppressed duplicate incident notification"
            );
        }
        relay
    }

    pub fn marker_count(&self) -> usize {
        self.store.len()
    }
}

impl Default for NotificationSuppressor {
    fn default() -> Self {
        Self::new(SUPPRESSION_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> Coordinates {
        Coordinates::new(37.566_512, 126.978_011)
    }

    #[test]
    fn test_key_rounding() {
        let a = MarkerKey::new(Coordinates::new(37.566_51, 126.978_01), None);
        let b = MarkerKey::new(Coordinates::new(37.566_54, 126.978_04), None);
        let c = MarkerKey::new(Coordinates::new(37.566_56, 126.978_01), None);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_wildcard());
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_within_ttl_is_suppressed() {
        let suppressor = NotificationSuppressor::default();
        let node = NodeId::new("N1");
        suppressor.mark_outbound(here(), Some(&node));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(suppressor.is_echo(here(), Some(&node)));
        assert!(suppressor.is_echo(here(), None));
        assert!(!suppressor.should_relay(here(), Some(&node)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_after_ttl_is_relayed() {
        let suppressor = NotificationSuppressor::default();
        let node = NodeId::new("N1");
        suppressor.mark_outbound(here(), Some(&node));

        tokio::time::advance(SUPPRESSION_TTL + Duration::from_millis(1)).await;
        assert!(!suppressor.is_echo(here(), None));
        assert!(suppressor.should_relay(here(), Some(&node)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_inbound_collapses() {
        let suppressor = NotificationSuppressor::default();

        assert!(suppressor.should_relay(here(), None));
        assert!(!suppressor.should_relay(here(), None));

        tokio::time::advance(Duration::from_secs(16)).await;
        assert!(suppressor.should_relay(here(), None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_node_not_suppressed() {
        let suppressor = NotificationSuppressor::default();
        suppressor.mark_outbound(here(), Some(&NodeId::new("N1")));
        assert!(suppressor.should_relay(here(), Some(&NodeId::new("N2"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_marker_evicted_on_lookup() {
        let store = Arc::new(InMemoryMarkerStore::new());
        let suppressor = NotificationSuppressor::with_store(store.clone(), SUPPRESSION_TTL);
        suppressor.mark_outbound(here(), None);
        assert_eq!(store.len(), 1);

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(!suppressor.is_echo(here(), None));
        assert!(store.is_empty());
    }
}
