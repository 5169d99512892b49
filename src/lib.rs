//! # typebus
//!
//! **typebus** is a typed in-process event bus for Tokio applications.
//!
//! Producers post plain values from any thread; consumers register
//! type-filtered, optionally transformed subscriptions under an owner handle
//! and tear them all down with one call. The crate is designed as a
//! decoupling seam between components that should not know about each other.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  post(event) ── any thread ──┐        register(owner)
//!                              │            │ .of_type::<T>()
//!                              ▼            │ .map(..) / .observe_on(..)
//! ┌────────────────────────────────────┐    │ .subscribe(handler)
//! │  EventChannel                      │    ▼
//! │  - one serialization point        ┌┴────────────────────────────┐
//! │    (total order for all posts)    │  SubscriptionRegistry       │
//! │  - per-subscription unbounded     │  - owner → cancellation     │
//! │    queues, pruned when dead       │    group (parent token)     │
//! └───┬──────────┬──────────┬─────────┘  - member = child token     │
//!     │          │          │           └──────────────┬────────────┘
//!  [queue 1]  [queue 2]  [queue N]                     │
//!     ▼          ▼          ▼                          │ unregister(owner)
//!  worker 1   worker 2   worker N  ◄── cancel ─────────┘
//!     ▼          ▼          ▼
//!  handler1   handler2   handlerN      (panic → on_error, subscription ends)
//! ```
//!
//! ### Subscription lifecycle
//! ```text
//! register(owner) ──► of_type::<T>() ──► map/filter/compose ──► subscribe(f)
//!    (group ensured)     (pure)              (pure)                │
//!                                                                  ├─► member token  = registry.add_to_group(owner)
//!                                                                  ├─► channel slot  = queue + type tag
//!                                                                  └─► worker task(s) on subscribe_on / observe_on
//!
//! worker loop {
//!   ├─► owner unregistered?  ─► stop, discard queued, no callbacks
//!   ├─► producers gone?      ─► drain backlog, on_complete, stop
//!   └─► next event ─► transforms ─► on_next(value)
//!           └─ panic ─► on_error (or default log reporter), stop;
//!                       owner group and sibling subscriptions unaffected
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                       | Key types / traits                  |
//! |-------------------|-------------------------------------------------------------------|-------------------------------------|
//! | **Posting**       | Non-blocking, runtime-independent, totally ordered broadcast.     | [`EventBus::post`], [`Event`]       |
//! | **Pipelines**     | Type filter, transforms, and scheduling, inert until subscribed.  | [`Registration`], [`EventSource`]   |
//! | **Lifecycle**     | Owner-scoped bulk cancellation of subscriptions.                  | [`Owner`], [`SubscriptionRegistry`] |
//! | **Streams**       | Direct pull-style consumption without the registry.               | [`EventStream`]                     |
//! | **Scheduling**    | Per-subscription runtime selection for workers and handlers.      | [`ExecutionContext`]                |
//! | **Errors**        | Faults caught at the subscription boundary, typed for callbacks.  | [`HandlerError`], [`Stage`]         |
//! | **Configuration** | Per-bus settings with documented sentinels.                       | [`BusConfig`]                       |
//!
//! ## Example
//! ```rust
//! use typebus::{Event, EventBus, Owner};
//!
//! struct Greeting { text: &'static str }
//! impl Event for Greeting {}
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let bus = EventBus::new();
//!     let owner = Owner::new();
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     bus.register(owner)
//!         .of_type::<Greeting>()
//!         .map(|greeting| greeting.text)
//!         .subscribe(move |text| {
//!             let tx = tx.clone();
//!             async move { let _ = tx.send(text); }
//!         });
//!
//!     bus.post(Greeting { text: "hello" });
//!     assert_eq!(rx.recv().await, Some("hello"));
//!
//!     bus.unregister(owner);
//! }
//! ```

mod bus;
mod config;
mod error;
mod events;
mod registry;
mod source;

// ---- Public re-exports ----

pub use bus::EventBus;
pub use config::BusConfig;
pub use error::{HandlerError, Stage};
pub use events::{Event, EventChannel, EventStream};
pub use registry::{Owner, SubscriptionRegistry};
pub use source::{EventHandler, EventSource, ExecutionContext, Registration};
