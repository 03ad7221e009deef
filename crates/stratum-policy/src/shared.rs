//! Shared ownership of nested policies.
//!
//! Nested policies live behind a reference-counted lock so that a shallow
//! copy of the parent, the parent itself, and any handle returned by
//! [`Policy::get_policy`](crate::Policy::get_policy) all observe the same
//! node. A node is released when its last handle is dropped.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Policy;

/// Aliasing handle to a nested [`Policy`].
///
/// Cloning the handle aliases the node; [`SharedPolicy::deep_copy`] clones
/// the whole subtree into a new, independently owned node.
///
/// Reads of a parent path lock every nested node along the way. Do not hold a
/// [`write`](Self::write) guard on a node while reading or writing through a
/// path that traverses that same node, and do not store a node inside its own
/// subtree.
///
/// # Example
///
/// ```rust
/// use stratum_policy::Policy;
///
/// let mut policy = Policy::new();
/// policy.set("server.port", 8080).unwrap();
///
/// let server = policy.get_policy("server").unwrap();
/// server.write().set("host", "localhost").unwrap();
///
/// assert_eq!(policy.get_string("server.host").unwrap(), "localhost");
/// ```
#[derive(Clone, Default)]
pub struct SharedPolicy(Arc<RwLock<Policy>>);

impl SharedPolicy {
    /// Wraps `policy` in a new shared node.
    #[must_use]
    pub fn new(policy: Policy) -> Self {
        Self(Arc::new(RwLock::new(policy)))
    }

    /// Locks the node for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Policy> {
        self.0.read()
    }

    /// Locks the node for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Policy> {
        self.0.write()
    }

    /// Returns `true` if both handles refer to the same node.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles to this node.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Clones the subtree into a new node that shares nothing with this one.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self::new(self.read().deep_copy())
    }

    /// Takes the policy out if this is the last handle.
    pub fn try_unwrap(self) -> Result<Policy, Self> {
        Arc::try_unwrap(self.0)
            .map(RwLock::into_inner)
            .map_err(Self)
    }
}

impl From<Policy> for SharedPolicy {
    fn from(policy: Policy) -> Self {
        Self::new(policy)
    }
}

impl fmt::Debug for SharedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Some(policy) => f.debug_tuple("SharedPolicy").field(&*policy).finish(),
            None => f.write_str("SharedPolicy(<locked>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_aliases_node() {
        let a = SharedPolicy::default();
        let b = a.clone();
        a.write().set("x", 1).unwrap();

        assert!(a.ptr_eq(&b));
        assert_eq!(b.read().get_int("x").unwrap(), 1);
        assert_eq!(a.handle_count(), 2);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let a = SharedPolicy::default();
        a.write().set("x", 1).unwrap();
        let b = a.deep_copy();
        a.write().set("x", 2).unwrap();

        assert!(!a.ptr_eq(&b));
        assert_eq!(b.read().get_int("x").unwrap(), 1);
    }

    #[test]
    fn test_try_unwrap_last_handle() {
        let a = SharedPolicy::default();
        let b = a.clone();
        let a = a.try_unwrap().unwrap_err();
        drop(b);
        assert!(a.try_unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_debug_while_locked() {
        let a = SharedPolicy::default();
        let _guard = a.write();
        assert_eq!(format!("{a:?}"), "SharedPolicy(<locked>)");
    }
}
