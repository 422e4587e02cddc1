//! Policy handles.
//!
//! A [`PolicyHandle`] is the opaque reference returned when a policy is
//! loaded into a [`crate::PolicyEngine`]. It stays valid until the policy is
//! unloaded.
//!
//! # Examples
//!
//! ```
//! use odrl_policy::PolicyHandle;
//! use std::str::FromStr;
//!
//! let handle = PolicyHandle::new();
//! let parsed = PolicyHandle::from_str(&handle.to_string()).unwrap();
//! assert_eq!(handle, parsed);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// An opaque handle to a loaded policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PolicyHandle(Uuid);

impl PolicyHandle {
    /// Create a new random handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a handle from a specific UUID.
    ///
    /// # Arguments
    ///
    /// * `uuid` - The UUID to wrap.
    ///
    /// # Returns
    ///
    /// A handle wrapping `uuid`.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PolicyHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PolicyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PolicyHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}
