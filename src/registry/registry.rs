//! # Owner-scoped cancellation groups.
//!
//! [`SubscriptionRegistry`] maps an [`Owner`] to its cancellation group:
//! every live subscription the owner created holds a child of the owner's
//! parent token, so one [`unregister`](SubscriptionRegistry::unregister)
//! call tears all of them down at once.
//!
//! ## Rules
//! - **One group per owner**: [`ensure_group`](SubscriptionRegistry::ensure_group)
//!   is idempotent; concurrent registrations for the same owner converge on
//!   one group.
//! - **Bulk teardown**: `unregister` cancels the parent token; members observe
//!   it through their child tokens, in no particular order, infallibly.
//! - **Idempotent unregister**: unknown owners are a no-op.
//! - **Sharded storage**: unrelated owners never contend on a single lock.
//! - **Stale members are inert**: a subscription that already terminated on
//!   its own stays counted until the owner unregisters; cancelling it again
//!   has no effect.

use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::registry::Owner;

/// Cancellation group for one owner.
struct Group {
    /// Parent token; every member subscription holds a child of it.
    token: CancellationToken,
    /// Number of members ever added to this group.
    members: AtomicUsize,
}

impl Group {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            members: AtomicUsize::new(0),
        }
    }
}

/// Registry of owner cancellation groups.
///
/// ### Properties
/// - **Thread-safe**: all operations take `&self` and may race freely.
/// - **No await points**: usable from sync and async code alike.
pub struct SubscriptionRegistry {
    groups: DashMap<Owner, Group>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Ensures a cancellation group exists for `owner`.
    ///
    /// Idempotent: an existing group is left untouched.
    pub fn ensure_group(&self, owner: Owner) {
        self.groups.entry(owner).or_insert_with(Group::new);
    }

    /// Adds a member to `owner`'s group (creating the group if absent) and
    /// returns the member's cancellation token.
    ///
    /// The returned token is a child of the group token: it fires when the
    /// owner unregisters, and cancelling it individually affects no other
    /// member.
    pub fn add_to_group(&self, owner: Owner) -> CancellationToken {
        let group = self.groups.entry(owner).or_insert_with(Group::new);
        group.members.fetch_add(1, AtomicOrdering::Relaxed);
        group.token.child_token()
    }

    /// Cancels and removes `owner`'s group.
    ///
    /// Every member token fires; the owner key is forgotten, so a later
    /// registration starts a fresh group. Unknown owners are a no-op.
    pub fn unregister(&self, owner: Owner) {
        if let Some((_, group)) = self.groups.remove(&owner) {
            let members = group.members.load(AtomicOrdering::Relaxed);
            group.token.cancel();
            tracing::debug!(owner = %owner, members, "owner unregistered");
        }
    }

    /// True if `owner` currently has a group.
    #[inline]
    pub fn is_registered(&self, owner: Owner) -> bool {
        self.groups.contains_key(&owner)
    }

    /// Number of owners with a live group.
    #[inline]
    pub fn owner_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of members ever added to `owner`'s live group.
    ///
    /// Self-terminated members remain counted until the owner unregisters;
    /// unknown owners count 0.
    pub fn subscription_count(&self, owner: Owner) -> usize {
        self.groups
            .get(&owner)
            .map(|group| group.members.load(AtomicOrdering::Relaxed))
            .unwrap_or(0)
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
