//! Event model and the delivery channel.
//!
//! This module groups the event **capability marker** and the **channel**
//! that broadcasts posted events to per-subscription queues.
//!
//! ## Contents
//! - [`Event`] marker trait admitting a type to the bus
//! - [`EventChannel`] serialized fan-out with unbounded per-subscription buffering
//! - [`EventStream`] typed, registry-independent consumption handle
//!
//! ## Quick reference
//! - **Producers**: [`EventChannel::post`] / [`post_arc`](EventChannel::post_arc),
//!   usually via the [`EventBus`](crate::EventBus) facade.
//! - **Consumers**: pipeline workers attached by a terminal subscribe, or an
//!   [`EventStream`] obtained directly.

mod channel;
mod event;

pub use channel::{EventChannel, EventStream};
pub use event::Event;

pub(crate) use channel::RawStream;
pub(crate) use event::Payload;
