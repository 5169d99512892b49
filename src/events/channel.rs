//! # Serialized broadcast with per-subscription buffering.
//!
//! [`EventChannel`] is the delivery core of the bus: producers post from any
//! thread, every post passes through one serialization point, and each live
//! subscription receives matching events through its own unbounded queue.
//!
//! ## Architecture
//! ```text
//! post(event)                [slot table lock = total order]
//!     │
//!     ├──► slot A (tag: Login)  ──► [unbounded queue] ──► worker / stream A
//!     ├──► slot B (tag: Login)  ──► [unbounded queue] ──► worker / stream B
//!     └──► slot C (tag: Logout) ─x  type mismatch, skipped
//! ```
//!
//! ## Rules
//! - **Never blocks**: `post` is one short lock acquisition plus queue pushes;
//!   it needs no async runtime and never fails.
//! - **Total order**: concurrent posts are serialized by the slot-table lock;
//!   every subscription observes the same relative order for the events it
//!   matches.
//! - **Per-subscription FIFO**: each queue preserves post order.
//! - **No drops, no stalls**: queues are unbounded; a slow subscriber grows
//!   its own queue and affects neither producers nor other subscribers.
//! - **Type filtering at the source**: an event is enqueued only into slots
//!   whose type tag matches, so mismatches cost nothing downstream.
//!
//! ## Slot hygiene
//! A slot is dead once its receiver was dropped or its cancellation token
//! fired; dead slots are pruned in-line on every post and by
//! [`subscriber_count`](EventChannel::subscriber_count).
//!
//! ## Backlog visibility
//! Each slot carries a depth gauge. When the configured threshold is reached
//! the channel logs a warning naming the slot; delivery is unaffected.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::BusConfig;
use crate::events::event::{Event, Payload};

/// Global counter for slot identifiers (used in logs).
static SINK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Sending half of one subscription, as stored in the slot table.
struct Sink {
    id: u64,
    tag: TypeId,
    type_label: &'static str,
    tx: mpsc::UnboundedSender<Payload>,
    token: CancellationToken,
    depth: Arc<AtomicUsize>,
}

impl Sink {
    fn is_dead(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }
}

/// Serialized broadcast point with one unbounded queue per subscription.
///
/// ### Properties
/// - **Multi-producer**: `post` takes `&self` and may race freely.
/// - **Runtime-independent**: posting and attaching need no Tokio runtime;
///   only `recv` does.
/// - **Isolation**: consumption speed of one subscription never affects
///   another.
pub struct EventChannel {
    slots: Mutex<Vec<Sink>>,
    backlog_warn: usize,
}

impl EventChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new(config: &BusConfig) -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            backlog_warn: config.backlog_warn,
        }
    }

    /// Posts an event to every live subscription whose type tag matches.
    ///
    /// - Takes ownership; the value is shared (`Arc`) across subscriptions.
    /// - With no matching subscription the event is dropped.
    pub fn post<E: Event>(&self, event: E) {
        self.post_arc(Arc::new(event));
    }

    /// Posts a pre-shared event without re-allocating.
    ///
    /// Shorthand for hot paths that already hold an `Arc<E>`.
    pub fn post_arc<E: Event>(&self, event: Arc<E>) {
        let tag = TypeId::of::<E>();
        let payload: Payload = event;
        self.dispatch(tag, payload);
    }

    /// Fans one payload out under the slot-table lock.
    ///
    /// Holding the lock across the whole fan-out is what makes the order
    /// identical for every subscription; pushes are non-blocking so the
    /// critical section stays short. Dead slots are pruned on the way.
    fn dispatch(&self, tag: TypeId, payload: Payload) {
        let mut slots = self.slots.lock();
        slots.retain(|slot| {
            if slot.is_dead() {
                return false;
            }
            if slot.tag != tag {
                return true;
            }
            match slot.tx.send(Arc::clone(&payload)) {
                Ok(()) => {
                    let depth = slot.depth.fetch_add(1, AtomicOrdering::Relaxed) + 1;
                    if self.backlog_warn != 0 && depth == self.backlog_warn {
                        tracing::warn!(
                            sink = slot.id,
                            ty = slot.type_label,
                            depth,
                            "subscription backlog reached threshold"
                        );
                    }
                    true
                }
                Err(_) => false,
            }
        });
    }

    /// Opens a live, type-filtered subscription on this channel.
    ///
    /// The stream buffers every matching event posted after this call
    /// (nothing is replayed) and releases its slot when dropped.
    pub fn subscribe_filtered<T: Event>(&self) -> EventStream<T> {
        let raw = self.attach_raw(
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
            CancellationToken::new(),
        );
        EventStream {
            raw,
            _marker: PhantomData,
        }
    }

    /// Attaches a new slot and returns its receiving half.
    ///
    /// `token` is stored in the slot: once it fires, `post` stops enqueueing
    /// and the slot is pruned. Dropping the returned stream has the same
    /// pruning effect through the closed queue.
    pub(crate) fn attach_raw(
        &self,
        tag: TypeId,
        type_label: &'static str,
        token: CancellationToken,
    ) -> RawStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        let sink = Sink {
            id: SINK_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            tag,
            type_label,
            tx,
            token,
            depth: Arc::clone(&depth),
        };
        self.slots.lock().push(sink);
        RawStream { rx, depth }
    }

    /// Number of live subscriptions attached to the channel.
    ///
    /// Prunes dead slots as a side effect.
    pub fn subscriber_count(&self) -> usize {
        let mut slots = self.slots.lock();
        slots.retain(|slot| !slot.is_dead());
        slots.len()
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(&BusConfig::default())
    }
}

/// Receiving half of one slot, untyped.
///
/// Backs both [`EventStream`] and the pipeline workers. Pruning relies on
/// queue closure: dropping this closes the queue, and the slot is discarded
/// on the next post.
pub(crate) struct RawStream {
    rx: mpsc::UnboundedReceiver<Payload>,
    depth: Arc<AtomicUsize>,
}

impl RawStream {
    /// Receives the next payload; `None` once every sender is gone and the
    /// backlog is drained.
    pub(crate) async fn recv(&mut self) -> Option<Payload> {
        let payload = self.rx.recv().await?;
        self.depth.fetch_sub(1, AtomicOrdering::Relaxed);
        Some(payload)
    }

    /// Non-blocking receive; `None` when the queue is empty or closed.
    pub(crate) fn try_recv(&mut self) -> Option<Payload> {
        let payload = self.rx.try_recv().ok()?;
        self.depth.fetch_sub(1, AtomicOrdering::Relaxed);
        Some(payload)
    }

    /// Number of buffered, not-yet-received payloads.
    pub(crate) fn len(&self) -> usize {
        self.depth.load(AtomicOrdering::Relaxed)
    }
}

/// Live, type-filtered view of a channel.
///
/// Created by [`EventChannel::subscribe_filtered`] (or
/// [`EventBus::stream`](crate::EventBus::stream)). Matching events are
/// buffered unboundedly from the moment of creation; dropping the stream
/// releases its channel slot.
pub struct EventStream<T: Event> {
    raw: RawStream,
    _marker: PhantomData<T>,
}

impl<T: Event> EventStream<T> {
    /// Receives the next matching event.
    ///
    /// Returns `None` once every producer handle is gone and the buffered
    /// backlog is drained.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        loop {
            let payload = self.raw.recv().await?;
            // post() only enqueues matching payloads; skip anything else
            if let Ok(event) = payload.downcast::<T>() {
                return Some(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv); `None` when nothing is
    /// buffered.
    pub fn try_recv(&mut self) -> Option<Arc<T>> {
        loop {
            let payload = self.raw.try_recv()?;
            if let Ok(event) = payload.downcast::<T>() {
                return Some(event);
            }
        }
    }

    /// Number of buffered, not-yet-received events.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// True if nothing is buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping {
        seq: u64,
    }
    impl Event for Ping {}

    struct Login {
        user: &'static str,
    }
    impl Event for Login {}

    fn channel() -> EventChannel {
        EventChannel::default()
    }

    #[test]
    fn test_stream_sees_only_matching_type() {
        let ch = channel();
        let mut pings = ch.subscribe_filtered::<Ping>();
        let mut logins = ch.subscribe_filtered::<Login>();

        ch.post(Ping { seq: 1 });
        ch.post(Login { user: "ada" });
        ch.post(Ping { seq: 2 });

        assert_eq!(pings.try_recv().unwrap().seq, 1);
        assert_eq!(pings.try_recv().unwrap().seq, 2);
        assert!(pings.try_recv().is_none());

        assert_eq!(logins.try_recv().unwrap().user, "ada");
        assert!(logins.try_recv().is_none());
    }

    #[test]
    fn test_no_replay_before_subscribe() {
        let ch = channel();
        ch.post(Ping { seq: 1 });

        let mut pings = ch.subscribe_filtered::<Ping>();
        assert!(pings.try_recv().is_none());

        ch.post(Ping { seq: 2 });
        assert_eq!(pings.try_recv().unwrap().seq, 2);
    }

    #[test]
    fn test_post_without_subscribers_is_silent() {
        let ch = channel();
        ch.post(Ping { seq: 1 });
        assert_eq!(ch.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_fifo_per_subscription() {
        let ch = channel();
        let mut pings = ch.subscribe_filtered::<Ping>();

        for seq in 0..100 {
            ch.post(Ping { seq });
        }
        for seq in 0..100 {
            assert_eq!(pings.recv().await.unwrap().seq, seq);
        }
    }

    #[test]
    fn test_slow_subscriber_grows_own_queue_only() {
        let ch = channel();
        let slow = ch.subscribe_filtered::<Ping>();
        let mut fast = ch.subscribe_filtered::<Ping>();

        for seq in 0..1000 {
            ch.post(Ping { seq });
        }

        assert_eq!(slow.len(), 1000);
        for seq in 0..1000 {
            assert_eq!(fast.try_recv().unwrap().seq, seq);
        }
        assert!(fast.is_empty());
        assert_eq!(slow.len(), 1000, "unread queue must be untouched");
    }

    #[test]
    fn test_dropping_stream_releases_slot() {
        let ch = channel();
        let pings = ch.subscribe_filtered::<Ping>();
        assert_eq!(ch.subscriber_count(), 1);

        drop(pings);
        assert_eq!(ch.subscriber_count(), 0);
    }

    #[test]
    fn test_depth_gauge_tracks_backlog() {
        let ch = channel();
        let mut pings = ch.subscribe_filtered::<Ping>();

        for seq in 0..50 {
            ch.post(Ping { seq });
        }
        assert_eq!(pings.len(), 50);

        for _ in 0..10 {
            pings.try_recv().unwrap();
        }
        assert_eq!(pings.len(), 40);
    }

    #[test]
    fn test_identical_order_across_subscriptions_under_contention() {
        let ch = Arc::new(channel());
        let mut a = ch.subscribe_filtered::<Ping>();
        let mut b = ch.subscribe_filtered::<Ping>();

        let mut posters = Vec::new();
        for p in 0..4u64 {
            let ch = Arc::clone(&ch);
            posters.push(std::thread::spawn(move || {
                for i in 0..250u64 {
                    ch.post(Ping { seq: p * 1000 + i });
                }
            }));
        }
        for h in posters {
            h.join().unwrap();
        }

        let drain = |s: &mut EventStream<Ping>| {
            let mut seen = Vec::new();
            while let Some(ev) = s.try_recv() {
                seen.push(ev.seq);
            }
            seen
        };
        let seen_a = drain(&mut a);
        let seen_b = drain(&mut b);

        assert_eq!(seen_a.len(), 1000);
        assert_eq!(seen_a, seen_b, "all subscriptions must observe one total order");
    }

    #[tokio::test]
    async fn test_recv_completes_when_channel_dropped() {
        let ch = channel();
        let mut pings = ch.subscribe_filtered::<Ping>();
        ch.post(Ping { seq: 7 });
        drop(ch);

        // backlog first, then end of stream
        assert_eq!(pings.recv().await.unwrap().seq, 7);
        assert!(pings.recv().await.is_none());
    }
}
