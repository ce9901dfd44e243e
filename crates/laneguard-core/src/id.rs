//! Identity types for laneguard
//!
//! Identifiers are opaque strings on the wire. Edge nodes pick their own
//! ids; incident ids are minted here from the reporting node, the
//! detection time and random entropy so that two detections from the same
//! node in the same millisecond still differ.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Edge sensor node identity
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Incident identity - globally unique per detection
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncidentId(pub String);

impl IncidentId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        IncidentId(id.into())
    }

    /// Mint a fresh id: `{node}-{unix_millis}-{8 hex}`
    pub fn generate(source: &NodeId, at: DateTime<Utc>) -> Self {
        let entropy: u32 = rand::thread_rng().gen();
        IncidentId(format!(
            "{}-{}-{:08x}",
            source.0,
            at.timestamp_millis(),
            entropy
        ))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Incident({})", self.0)
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IncidentId {
    fn from(s: &str) -> Self {
        IncidentId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_incident_id_embeds_source_and_time() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let id = IncidentId::generate(&NodeId::new("N1"), at);

        assert!(id.as_str().starts_with("N1-1700000000123-"));
        let suffix = id.as_str().rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
    }

    #[test]
    fn test_incident_ids_differ_within_same_millisecond() {
        let at = Utc.timestamp_millis_opt(42).unwrap();
        let node = NodeId::new("N1");
        let ids: std::collections::HashSet<_> =
            (0..64).map(|_| IncidentId::generate(&node, at)).collect();
        assert!(ids.len() > 60);
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let json = serde_json::to_string(&NodeId::new("cam-7")).unwrap();
        assert_eq!(json, "\"cam-7\"");
    }
}
