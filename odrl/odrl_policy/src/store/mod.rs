//! Policy storage.
//!
//! This module provides storage for loaded policies: the "world" a
//! [`crate::PolicyEngine`] evaluates against.

mod in_memory;

pub use in_memory::InMemoryPolicyStore;

use std::sync::Arc;

use crate::error::EngineError;
use crate::id::PolicyHandle;
use crate::model::Policy;

/// Trait for policy storage.
///
/// A policy store owns loaded policies, indexed by handle and by uid. Reads
/// may run concurrently; inserts and removals are serialized.
pub trait PolicyStore: Send + Sync {
    /// Add a policy to the store.
    ///
    /// # Arguments
    ///
    /// * `policy` - The policy to add.
    ///
    /// # Returns
    ///
    /// * `Ok(PolicyHandle)` - The handle of the new policy.
    /// * `Err(EngineError::DuplicateUid)` - If a policy with the same uid is
    ///   already stored. The store is left unchanged.
    fn insert(&self, policy: Policy) -> Result<PolicyHandle, EngineError>;

    /// Get a policy by handle.
    fn get(&self, handle: &PolicyHandle) -> Option<Arc<Policy>>;

    /// Get a policy and its handle by uid.
    ///
    /// # Arguments
    ///
    /// * `uid` - The policy uid.
    ///
    /// # Returns
    ///
    /// The handle and the policy, or `None` if no policy has this uid.
    fn get_by_uid(&self, uid: &str) -> Option<(PolicyHandle, Arc<Policy>)>;

    /// Remove a policy from the store.
    ///
    /// # Arguments
    ///
    /// * `handle` - The handle of the policy to remove.
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<Policy>)` - The removed policy.
    /// * `Err(EngineError::UnknownHandle)` - If the handle is not stored.
    fn remove(&self, handle: &PolicyHandle) -> Result<Arc<Policy>, EngineError>;

    /// List all stored policies with their handles.
    fn list(&self) -> Vec<(PolicyHandle, Arc<Policy>)>;

    /// Get the number of stored policies.
    fn len(&self) -> usize;

    /// Check whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all policies from the store.
    fn clear(&self);
}
