//! Heartbeat-driven liveness
//!
//! Two states per node. A heartbeat reporting `online` moves a node to
//! ONLINE and refreshes its timestamp. The stored timestamp is the sender's
//! clock capped at arrival time, so a node whose clock runs ahead cannot
//! stay ONLINE past the threshold. Staleness is checked whenever the
//! node list is read, and by the runtime's periodic sweep; an ONLINE node
//! whose last heartbeat is older than the threshold goes OFFLINE. Nodes
//! that never sent a heartbeat keep their registered status.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use laneguard_core::{
    Heartbeat, LaneguardError, LaneguardResult, Node, NodeId, NodeStatus, ReportedStatus,
};

use crate::{InMemoryNodeStore, NodeStore};

/// Heartbeat age after which an ONLINE node is considered gone
pub const LIVENESS_THRESHOLD: Duration = Duration::from_secs(60);

/// A status change caused by a heartbeat or a sweep
#[derive(Clone, Debug, PartialEq)]
pub struct LivenessTransition {
    pub node_id: NodeId,
    pub from: NodeStatus,
    pub to: NodeStatus,
    pub at: DateTime<Utc>,
}

impl LivenessTransition {
    pub fn is_connect(&self) -> bool {
        self.to == NodeStatus::Online
    }
}

/// Result of ingesting one heartbeat
#[derive(Clone, Debug)]
pub struct HeartbeatOutcome {
    /// Node state after the heartbeat
    pub node: Node,
    /// False when the heartbeat was older than the stored one
    pub applied: bool,
    pub transition: Option<LivenessTransition>,
}

fn is_stale(node: &Node, now: DateTime<Utc>, threshold: Duration) -> bool {
    match node.last_heartbeat {
        // stored times never exceed arrival; a sweep clock behind them is not stale
        Some(last) => (now - last)
            .to_std()
            .map(|age| age > threshold)
            .unwrap_or(false),
        None => false,
    }
}

pub struct LivenessMonitor {
    store: Arc<dyn NodeStore>,
    threshold: Duration,
}

impl LivenessMonitor {
    pub fn new(threshold: Duration) -> Self {
        Self::with_store(Arc::new(InMemoryNodeStore::new()), threshold)
    }

    pub fn with_store(store: Arc<dyn NodeStore>, threshold: Duration) -> Self {
        LivenessMonitor { store, threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn register(&self, node: Node) -> LaneguardResult<Node> {
        if node.id.is_empty() {
            return Err(LaneguardError::validation("node id is required"));
        }
        self.store.insert(node.clone())?;
        info!(node_id = %node.id, status = ?node.status, "node registered");
        Ok(node)
    }

    /// Remove a node for good
    pub fn deregister(&self, id: &NodeId) -> LaneguardResult<Node> {
        let node = self
            .store
            .remove(id)
            .ok_or_else(|| LaneguardError::node_not_found(id.as_str()))?;
        info!(node_id = %id, "node deregistered");
        Ok(node)
    }

    pub fn get(&self, id: &NodeId) -> LaneguardResult<Node> {
        self.store
            .get(id)
            .ok_or_else(|| LaneguardError::node_not_found(id.as_str()))
    }

    /// Apply `f` to a node under its lock and return the updated record
    pub fn update<F>(&self, id: &NodeId, mut f: F) -> LaneguardResult<Node>
    where
        F: FnMut(&mut Node),
    {
        self.store.update(id, &mut f)
    }

    /// Ingest a heartbeat that arrived at `received_at`. Last write wins by
    /// the heartbeat's own timestamp, capped at `received_at`.
    pub fn heartbeat(
        &self,
        heartbeat: &Heartbeat,
        received_at: DateTime<Utc>,
    ) -> LaneguardResult<HeartbeatOutcome> {
        let mut applied = false;
        let mut transition = None;

        let at = heartbeat.timestamp.min(received_at);
        if at < heartbeat.timestamp {
            debug!(
                node_id = %heartbeat.node_id,
                sent = %heartbeat.timestamp,
                received = %received_at,
                "heartbeat from the future; using arrival time"
            );
        }

        let node = self.store.update(&heartbeat.node_id, &mut |node| {
            if let Some(last) = node.last_heartbeat {
                if at < last {
                    return;
                }
            }
            applied = true;

            // "offline" is acknowledged but does not prove liveness
            if heartbeat.status == ReportedStatus::Offline {
                return;
            }

            node.last_heartbeat = Some(at);
            if node.status != NodeStatus::Online {
                transition = Some(LivenessTransition {
                    node_id: node.id.clone(),
                    from: node.status,
                    to: NodeStatus::Online,
                    at,
                });
                node.status = NodeStatus::Online;
            }
        })?;

        if !applied {
            debug!(
                node_id = %heartbeat.node_id,
                timestamp = %heartbeat.timestamp,
                "ignored out-of-order heartbeat"
            );
        } else if heartbeat.status == ReportedStatus::Offline {
            debug!(node_id = %heartbeat.node_id, "node reported offline");
        }
        if transition.is_some() {
            info!(node_id = %heartbeat.node_id, "node online");
        }

        Ok(HeartbeatOutcome {
            node,
            applied,
            transition,
        })
    }

    /// Move every stale ONLINE node to OFFLINE
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<LivenessTransition> {
        let threshold = self.threshold;
        let mut transitions = Vec::new();

        self.store.for_each(&mut |node| {
            if node.status == NodeStatus::Online && is_stale(node, now, threshold) {
                node.status = NodeStatus::Offline;
                transitions.push(LivenessTransition {
                    node_id: node.id.clone(),
                    from: NodeStatus::Online,
                    to: NodeStatus::Offline,
                    at: now,
                });
            }
        });

        for t in &transitions {
            info!(node_id = %t.node_id, "node offline: heartbeat stale");
        }
        transitions
    }

    /// Sweep, then return every node sorted by id
    pub fn list(&self, now: DateTime<Utc>) -> (Vec<Node>, Vec<LivenessTransition>) {
        let transitions = self.sweep(now);
        let mut nodes = Vec::with_capacity(self.store.len());
        self.store.for_each(&mut |node| nodes.push(node.clone()));
        nodes.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        (nodes, transitions)
    }

    pub fn node_count(&self) -> usize {
        self.store.len()
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new(LIVENESS_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn beat(id: &str, status: ReportedStatus, at: DateTime<Utc>) -> Heartbeat {
        Heartbeat {
            node_id: NodeId::new(id),
            status,
            timestamp: at,
        }
    }

    /// Heartbeat received the instant it was sent
    fn send(monitor: &LivenessMonitor, hb: Heartbeat) -> LaneguardResult<HeartbeatOutcome> {
        let at = hb.timestamp;
        monitor.heartbeat(&hb, at)
    }

    fn monitor_with(id: &str) -> LivenessMonitor {
        let monitor = LivenessMonitor::default();
        monitor.register(Node::new(id, 100)).unwrap();
        monitor
    }

    #[test]
    fn test_first_heartbeat_goes_online() {
        let monitor = monitor_with("N1");
        let outcome = send(&monitor, beat("N1", ReportedStatus::Online, t(0))).unwrap();

        assert!(outcome.applied);
        assert!(outcome.node.is_online());
        let transition = outcome.transition.unwrap();
        assert_eq!(transition.from, NodeStatus::Offline);
        assert!(transition.is_connect());

        // still online right up to the threshold
        let (nodes, transitions) = monitor.list(t(60));
        assert!(nodes[0].is_online());
        assert!(transitions.is_empty());
    }

    #[test]
    fn test_stale_node_goes_offline_on_read() {
        let monitor = monitor_with("N1");
        send(&monitor, beat("N1", ReportedStatus::Online, t(0))).unwrap();

        let (nodes, transitions) = monitor.list(t(61));
        assert_eq!(nodes[0].status, NodeStatus::Offline);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to, NodeStatus::Offline);

        // second read reports nothing new
        assert!(monitor.sweep(t(120)).is_empty());
    }

    #[test]
    fn test_heartbeat_revives_offline_node() {
        let monitor = monitor_with("N1");
        send(&monitor, beat("N1", ReportedStatus::Online, t(0))).unwrap();
        monitor.sweep(t(90));

        let outcome = send(&monitor, beat("N1", ReportedStatus::Online, t(95))).unwrap();
        assert!(outcome.node.is_online());
        assert!(outcome.transition.is_some());
    }

    #[test]
    fn test_never_heartbeated_node_keeps_status() {
        let monitor = LivenessMonitor::default();
        monitor
            .register(Node::new("N1", 100).with_status(NodeStatus::Online))
            .unwrap();

        let (nodes, transitions) = monitor.list(t(100_000));
        assert!(nodes[0].is_online());
        assert!(transitions.is_empty());
    }

    #[test]
    fn test_older_heartbeat_ignored() {
        let monitor = monitor_with("N1");
        send(&monitor, beat("N1", ReportedStatus::Online, t(30))).unwrap();

        let outcome = send(&monitor, beat("N1", ReportedStatus::Online, t(10))).unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.node.last_heartbeat, Some(t(30)));
    }

    #[test]
    fn test_offline_report_does_not_change_status() {
        let monitor = monitor_with("N1");
        send(&monitor, beat("N1", ReportedStatus::Online, t(0))).unwrap();

        let outcome = send(&monitor, beat("N1", ReportedStatus::Offline, t(5))).unwrap();
        assert!(outcome.node.is_online());
        assert!(outcome.transition.is_none());
        assert_eq!(outcome.node.last_heartbeat, Some(t(0)));
    }

    #[test]
    fn test_unknown_node_heartbeat() {
        let monitor = LivenessMonitor::default();
        let result = send(&monitor, beat("ghost", ReportedStatus::Online, t(0)));
        assert!(matches!(result, Err(LaneguardError::NotFound { .. })));
    }

    #[test]
    fn test_deregister_is_terminal() {
        let monitor = monitor_with("N1");
        monitor.deregister(&NodeId::new("N1")).unwrap();

        assert!(monitor.get(&NodeId::new("N1")).is_err());
        assert!(send(&monitor, beat("N1", ReportedStatus::Online, t(0))).is_err());
        assert!(monitor.deregister(&NodeId::new("N1")).is_err());
    }

    #[test]
    fn test_register_twice_fails() {
        let monitor = monitor_with("N1");
        assert!(matches!(
            monitor.register(Node::new("N1", 80)),
            Err(LaneguardError::AlreadyExists { kind: "node", .. })
        ));
        assert!(matches!(
            monitor.register(Node::new("", 80)),
            Err(LaneguardError::Validation(_))
        ));
        assert_eq!(monitor.node_count(), 1);
    }

    #[test]
    fn test_future_timestamp_capped_at_arrival() {
        let monitor = monitor_with("N1");
        // sender clock an hour ahead
        let outcome = monitor
            .heartbeat(&beat("N1", ReportedStatus::Online, t(3600)), t(0))
            .unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.node.last_heartbeat, Some(t(0)));

        // silent for ten minutes: offline despite the future timestamp
        let (nodes, transitions) = monitor.list(t(600));
        assert_eq!(nodes[0].status, NodeStatus::Offline);
        assert_eq!(transitions.len(), 1);

        // a correctly timed heartbeat is still accepted afterwards
        let outcome = send(&monitor, beat("N1", ReportedStatus::Online, t(660))).unwrap();
        assert!(outcome.applied);
        assert!(outcome.node.is_online());
        assert_eq!(outcome.node.last_heartbeat, Some(t(660)));
    }

    #[test]
    fn test_concurrent_heartbeats_newest_wins() {
        let monitor = Arc::new(LivenessMonitor::default());
        for id in ["N0", "N1", "N2", "N3"] {
            monitor.register(Node::new(id, 100)).unwrap();
        }

        // 8 threads: even ones hammer N0, odd ones their own node, with
        // timestamps interleaved so arrival order differs from send order
        let handles: Vec<_> = (0..8u32)
            .map(|worker| {
                let monitor = Arc::clone(&monitor);
                std::thread::spawn(move || {
                    let id = if worker % 2 == 0 {
                        "N0".to_string()
                    } else {
                        format!("N{}", 1 + worker / 2 % 3)
                    };
                    for step in (0..500i64).rev() {
                        let secs = step * 8 + worker as i64;
                        monitor
                            .heartbeat(&beat(&id, ReportedStatus::Online, t(secs)), t(10_000))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        fn newest(workers: &[u32]) -> Option<DateTime<Utc>> {
            workers.iter().map(|w| t(499 * 8 + *w as i64)).max()
        }
        let n0 = monitor.get(&NodeId::new("N0")).unwrap();
        assert_eq!(n0.last_heartbeat, newest(&[0, 2, 4, 6]));
        assert!(n0.is_online());

        for id in ["N1", "N2", "N3"] {
            let workers: Vec<u32> = (0..8u32)
                .filter(|w| w % 2 == 1 && format!("N{}", 1 + w / 2 % 3) == id)
                .collect();
            let node = monitor.get(&NodeId::new(id)).unwrap();
            assert_eq!(node.last_heartbeat, newest(&workers));
        }
    }

    #[test]
    fn test_list_sorted() {
        let monitor = LivenessMonitor::default();
        for id in ["N3", "N1", "N2"] {
            monitor.register(Node::new(id, 100)).unwrap();
        }
        let (nodes, _) = monitor.list(t(0));
        let ids: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["N1", "N2", "N3"]);
    }
}
