//! Node storage
//!
//! The map is only write-locked to add or remove nodes. Each node sits
//! behind its own mutex, so heartbeats for different nodes never contend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use laneguard_core::{LaneguardError, LaneguardResult, Node, NodeId};

pub trait NodeStore: Send + Sync {
    /// Add a node; fails if the id is taken
    fn insert(&self, node: Node) -> LaneguardResult<()>;

    fn get(&self, id: &NodeId) -> Option<Node>;

    /// Run `f` on the node under its lock
    fn update(&self, id: &NodeId, f: &mut dyn FnMut(&mut Node)) -> LaneguardResult<Node>;

    /// Run `f` on every node, each under its own lock
    fn for_each(&self, f: &mut dyn FnMut(&mut Node));

    fn remove(&self, id: &NodeId) -> Option<Node>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    nodes: RwLock<HashMap<NodeId, Arc<Mutex<Node>>>>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: &NodeId) -> Option<Arc<Mutex<Node>>> {
        self.nodes.read().get(id).cloned()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn insert(&self, node: Node) -> LaneguardResult<()> {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&node.id) {
            return Err(LaneguardError::node_exists(node.id.as_str()));
        }
        nodes.insert(node.id.clone(), Arc::new(Mutex::new(node)));
        Ok(())
    }

    fn get(&self, id: &NodeId) -> Option<Node> {
        self.slot(id).map(|slot| slot.lock().clone())
    }

    fn update(&self, id: &NodeId, f: &mut dyn FnMut(&mut Node)) -> LaneguardResult<Node> {
        let slot = self
            .slot(id)
            .ok_or_else(|| LaneguardError::node_not_found(id.as_str()))?;
        let mut node = slot.lock();
        f(&mut node);
        Ok(node.clone())
    }

    fn for_each(&self, f: &mut dyn FnMut(&mut Node)) {
        let slots: Vec<Arc<Mutex<Node>>> = self.nodes.read().values().cloned().collect();
        for slot in slots {
            f(&mut slot.lock());
        }
    }

    fn remove(&self, id: &NodeId) -> Option<Node> {
        let slot = self.nodes.write().remove(id)?;
        let node = slot.lock().clone();
        Some(node)
    }

    fn len(&self) -> usize {
        self.nodes.read().len()
    }
}
