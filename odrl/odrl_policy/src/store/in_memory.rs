//! In-memory policy store.
//!
//! This module provides an in-memory implementation of the policy store.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::PolicyStore;
use crate::error::EngineError;
use crate::id::PolicyHandle;
use crate::model::Policy;
use crate::vocab::Iri;

#[derive(Default)]
struct World {
    /// The policies, indexed by handle.
    by_handle: HashMap<PolicyHandle, Arc<Policy>>,

    /// Handles, indexed by policy uid.
    by_uid: HashMap<Iri, PolicyHandle>,
}

/// An in-memory policy store.
///
/// Clones share the same policies.
#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    world: Arc<RwLock<World>>,
}

impl InMemoryPolicyStore {
    /// Create a new in-memory policy store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyStore for InMemoryPolicyStore {
    fn insert(&self, policy: Policy) -> Result<PolicyHandle, EngineError> {
        let mut world = self.world.write();

        // Check if the uid is taken
        if world.by_uid.contains_key(&policy.uid) {
            return Err(EngineError::DuplicateUid { uid: policy.uid });
        }

        let handle = PolicyHandle::new();
        world.by_uid.insert(policy.uid.clone(), handle);
        world.by_handle.insert(handle, Arc::new(policy));

        Ok(handle)
    }

    fn get(&self, handle: &PolicyHandle) -> Option<Arc<Policy>> {
        self.world.read().by_handle.get(handle).cloned()
    }

    fn get_by_uid(&self, uid: &str) -> Option<(PolicyHandle, Arc<Policy>)> {
        let world = self.world.read();
        let handle = *world.by_uid.get(uid)?;
        let policy = world.by_handle.get(&handle)?.clone();
        Some((handle, policy))
    }

    fn remove(&self, handle: &PolicyHandle) -> Result<Arc<Policy>, EngineError> {
        let mut world = self.world.write();

        let policy = world
            .by_handle
            .remove(handle)
            .ok_or(EngineError::UnknownHandle(*handle))?;
        world.by_uid.remove(&policy.uid);

        Ok(policy)
    }

    fn list(&self) -> Vec<(PolicyHandle, Arc<Policy>)> {
        self.world
            .read()
            .by_handle
            .iter()
            .map(|(handle, policy)| (*handle, policy.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.world.read().by_handle.len()
    }

    fn clear(&self) {
        let mut world = self.world.write();
        world.by_handle.clear();
        world.by_uid.clear();
    }
}
