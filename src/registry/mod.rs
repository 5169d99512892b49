//! Owner-scoped subscription lifecycle.
//!
//! ## Contents
//! - [`Owner`] opaque handle under which subscriptions are grouped
//! - [`SubscriptionRegistry`] owner → cancellation-group map
//!
//! A subscription joins its owner's group at terminal-subscribe time and
//! holds a child of the group token; `unregister` cancels the parent and
//! forgets the owner. See the crate docs for the wiring diagram.

mod owner;
mod registry;

pub use owner::Owner;
pub use registry::SubscriptionRegistry;
