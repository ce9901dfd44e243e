//! Incidents under active processing
//!
//! Not a ledger: an incident is kept from ingestion until its resolution
//! has been applied and notified, then dropped.

use std::collections::HashMap;

use parking_lot::RwLock;

use laneguard_core::{DecisionStatus, Incident, IncidentId, LaneguardError, LaneguardResult};

pub trait IncidentStore: Send + Sync {
    fn insert(&self, incident: Incident) -> LaneguardResult<()>;

    fn get(&self, id: &IncidentId) -> Option<Incident>;

    /// Move a PENDING incident to a terminal status, exactly once
    fn set_status(&self, id: &IncidentId, status: DecisionStatus) -> LaneguardResult<Incident>;

    fn remove(&self, id: &IncidentId) -> Option<Incident>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryIncidentStore {
    incidents: RwLock<HashMap<IncidentId, Incident>>,
}

impl InMemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IncidentStore for InMemoryIncidentStore {
    fn insert(&self, incident: Incident) -> LaneguardResult<()> {
        let mut incidents = self.incidents.write();
        if incidents.contains_key(&incident.id) {
            return Err(LaneguardError::DuplicatePending(incident.id));
        }
        incidents.insert(incident.id.clone(), incident);
        Ok(())
    }

    fn get(&self, id: &IncidentId) -> Option<Incident> {
        self.incidents.read().get(id).cloned()
    }

    fn set_status(&self, id: &IncidentId, status: DecisionStatus) -> LaneguardResult<Incident> {
        if !status.is_terminal() {
            return Err(LaneguardError::validation("incident can only move to a terminal status"));
        }
        let mut incidents = self.incidents.write();
        let incident = incidents
            .get_mut(id)
            .ok_or_else(|| LaneguardError::incident_not_found(id.as_str()))?;
        if incident.status.is_terminal() {
            return Err(LaneguardError::DuplicateResolution(id.clone()));
        }
        incident.status = status;
        Ok(incident.clone())
    }

    fn remove(&self, id: &IncidentId) -> Option<Incident> {
        self.incidents.write().remove(id)
    }

    fn len(&self) -> usize {
        self.incidents.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use laneguard_core::{Coordinates, IncidentReport};

    fn incident() -> Incident {
        let report = IncidentReport::new("N1", Coordinates::new(1.0, 2.0));
        Incident::from_report(&report, Coordinates::new(1.0, 2.0), Utc::now())
    }

    #[test]
    fn test_status_changes_once() {
        let store = InMemoryIncidentStore::new();
        let incident = incident();
        let id = incident.id.clone();
        store.insert(incident).unwrap();

        let updated = store.set_status(&id, DecisionStatus::Confirmed).unwrap();
        assert_eq!(updated.status, DecisionStatus::Confirmed);

        assert_eq!(
            store.set_status(&id, DecisionStatus::Timeout),
            Err(LaneguardError::DuplicateResolution(id.clone()))
        );
        assert_eq!(store.get(&id).unwrap().status, DecisionStatus::Confirmed);
    }

    #[test]
    fn test_pending_is_not_a_resolution() {
        let store = InMemoryIncidentStore::new();
        let incident = incident();
        let id = incident.id.clone();
        store.insert(incident).unwrap();
        assert!(store.set_status(&id, DecisionStatus::Pending).is_err());
    }

    #[test]
    fn test_unknown_incident() {
        let store = InMemoryIncidentStore::new();
        assert!(matches!(
            store.set_status(&IncidentId::new("nope"), DecisionStatus::Rejected),
            Err(LaneguardError::NotFound { kind: "incident", .. })
        ));
    }

    #[test]
    fn test_duplicate_insert_rejected_and_remove() {
        let store = InMemoryIncidentStore::new();
        let incident = incident();
        let id = incident.id.clone();
        store.insert(incident.clone()).unwrap();
        assert!(store.insert(incident).is_err());

        assert!(store.remove(&id).is_some());
        assert!(store.is_empty());
    }
}
