//! # Owner handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Global counter for owner handle allocation.
static OWNER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Opaque identity under which subscriptions are grouped.
///
/// An `Owner` is the key for bulk teardown: every subscription created
/// through [`EventBus::register`](crate::EventBus::register) with this handle
/// is cancelled by one [`unregister`](crate::EventBus::unregister) call.
/// Typically a component holds one `Owner` for its own lifetime, registers
/// with it, and unregisters in its shutdown path.
///
/// ### Notes
/// - Handles are process-unique and `Copy`; cloning a handle does not clone
///   any subscriptions.
/// - The bus cannot observe a handle being dropped: forgetting to unregister
///   leaks the owner's group and queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Owner(u64);

impl Owner {
    /// Allocates a fresh, process-unique owner handle.
    ///
    /// # Example
    /// ```
    /// use typebus::Owner;
    ///
    /// let a = Owner::new();
    /// let b = Owner::new();
    /// assert_ne!(a, b);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Owner(OWNER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl Default for Owner {
    /// Allocates a fresh handle; same as [`Owner::new`].
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_handles_are_unique() {
        let handles: HashSet<Owner> = (0..100).map(|_| Owner::new()).collect();
        assert_eq!(handles.len(), 100);
    }

    #[test]
    fn test_display_is_stable() {
        let owner = Owner(42);
        assert_eq!(owner.to_string(), "owner-42");
    }
}
