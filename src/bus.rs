//! # Bus facade: channel, registry, configuration.
//!
//! [`EventBus`] ties the delivery channel and the owner registry together
//! behind the public producer/consumer surface. Handles are cheap to clone
//! and share one underlying bus. A process-wide instance is available through
//! [`EventBus::global`]; explicit instances work identically and keep tests
//! and embedded uses isolated.

use std::sync::{Arc, OnceLock};

use crate::config::BusConfig;
use crate::events::{Event, EventChannel, EventStream};
use crate::registry::{Owner, SubscriptionRegistry};
use crate::source::Registration;

/// Process-wide bus storage for [`EventBus::global`].
static GLOBAL: OnceLock<EventBus> = OnceLock::new();

/// State shared by cloned bus handles.
struct Shared {
    channel: EventChannel,
    registry: SubscriptionRegistry,
}

/// Typed in-process event bus.
///
/// ### Properties
/// - **Cloneable**: handles share one bus (internally `Arc`-backed).
/// - **Thread-safe**: posting and registration are callable from any thread.
/// - **Runtime-independent posting**: `post` needs no Tokio runtime; only
///   terminal subscribes spawn workers.
#[derive(Clone)]
pub struct EventBus {
    shared: Arc<Shared>,
}

impl EventBus {
    /// Creates a bus with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Creates a bus with the given configuration.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                channel: EventChannel::new(&config),
                registry: SubscriptionRegistry::new(),
            }),
        }
    }

    /// Returns the process-wide bus, creating it on first access.
    ///
    /// Initialization happens at most once; every call returns the same bus.
    /// Prefer passing an explicit `EventBus` where a wiring seam exists; the
    /// global is for call sites that have none.
    pub fn global() -> &'static EventBus {
        GLOBAL.get_or_init(EventBus::new)
    }

    /// Posts an event to every live subscription whose type matches.
    ///
    /// - Never blocks, never fails; with no matching subscription the event
    ///   is dropped.
    /// - Callable from any thread, with or without a runtime.
    /// - Concurrent posts are totally ordered; every subscription observes
    ///   the same relative order.
    pub fn post<E: Event>(&self, event: E) {
        self.shared.channel.post(event);
    }

    /// Posts a pre-shared event without re-allocating.
    ///
    /// Shorthand for hot paths that already hold an `Arc<E>`.
    pub fn post_arc<E: Event>(&self, event: Arc<E>) {
        self.shared.channel.post_arc(event);
    }

    /// Opens a registration scope for `owner`.
    ///
    /// Ensures the owner's cancellation group exists and returns the first
    /// pipeline stage. Everything registered under `owner` must eventually
    /// be released with [`unregister`](Self::unregister): the bus cannot
    /// observe the owner going away, so a forgotten owner leaks its group
    /// and queues.
    pub fn register(&self, owner: Owner) -> Registration {
        Registration::new(self.clone(), owner)
    }

    /// Cancels and forgets every subscription registered under `owner`.
    ///
    /// Idempotent: unknown owners are a no-op. After this returns, no new
    /// handler invocation begins for the owner (one already running may
    /// finish), queued undelivered events are discarded, and the owner key
    /// is free for a fresh registration.
    pub fn unregister(&self, owner: Owner) {
        self.shared.registry.unregister(owner);
    }

    /// Opens a direct, registry-independent subscription to events of `T`.
    ///
    /// The stream buffers matching events unboundedly and releases its
    /// channel slot when dropped.
    pub fn stream<T: Event>(&self) -> EventStream<T> {
        self.shared.channel.subscribe_filtered::<T>()
    }

    /// True if `owner` currently has a cancellation group.
    #[inline]
    pub fn is_registered(&self, owner: Owner) -> bool {
        self.shared.registry.is_registered(owner)
    }

    /// Number of owners with a live group.
    #[inline]
    pub fn owner_count(&self) -> usize {
        self.shared.registry.owner_count()
    }

    /// Number of subscriptions ever added under `owner`'s live group.
    #[inline]
    pub fn subscription_count(&self, owner: Owner) -> usize {
        self.shared.registry.subscription_count(owner)
    }

    /// Number of live subscriptions attached to the delivery channel.
    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.shared.channel.subscriber_count()
    }

    pub(crate) fn channel(&self) -> &EventChannel {
        &self.shared.channel
    }

    pub(crate) fn registry(&self) -> &SubscriptionRegistry {
        &self.shared.registry
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping {
        seq: u64,
    }
    impl Event for Ping {}

    #[test]
    fn test_global_is_one_instance() {
        let a = EventBus::global();
        let b = EventBus::global();
        assert!(Arc::ptr_eq(&a.shared, &b.shared));

        let from_thread = std::thread::spawn(|| EventBus::global().clone())
            .join()
            .unwrap();
        assert!(Arc::ptr_eq(&a.shared, &from_thread.shared));
    }

    #[test]
    fn test_clones_share_state() {
        let bus = EventBus::new();
        let clone = bus.clone();
        let owner = Owner::new();

        let _registration = bus.register(owner);
        assert!(clone.is_registered(owner));

        clone.unregister(owner);
        assert!(!bus.is_registered(owner));
    }

    #[test]
    fn test_instances_are_isolated() {
        let a = EventBus::new();
        let b = EventBus::new();

        let mut stream = a.stream::<Ping>();
        b.post(Ping { seq: 1 });
        assert!(stream.try_recv().is_none());

        a.post(Ping { seq: 2 });
        assert_eq!(stream.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_post_without_matching_subscription_is_silent() {
        let bus = EventBus::new();
        bus.post(Ping { seq: 1 });
        bus.post_arc(Arc::new(Ping { seq: 2 }));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_owner_counts() {
        let bus = EventBus::new();
        let a = Owner::new();
        let b = Owner::new();

        let _scope_a = bus.register(a);
        let _scope_b = bus.register(b);
        assert_eq!(bus.owner_count(), 2);

        bus.unregister(a);
        assert_eq!(bus.owner_count(), 1);
        assert!(bus.is_registered(b));
    }
}
