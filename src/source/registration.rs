//! # Registration entry point (owner scope).

use std::sync::Arc;

use crate::bus::EventBus;
use crate::events::Event;
use crate::registry::Owner;
use crate::source::EventSource;

/// First pipeline stage: an owner scope with no event type selected yet.
///
/// Created by [`EventBus::register`]. Creating it ensures the owner's
/// cancellation group exists, so the owner is tracked (and must eventually
/// be unregistered) even if no terminal subscribe ever happens. Otherwise
/// the value is inert until [`of_type`](Registration::of_type) narrows it
/// to an event type.
#[must_use = "a registration delivers nothing until of_type() and a terminal subscribe"]
pub struct Registration {
    bus: EventBus,
    owner: Owner,
}

impl Registration {
    pub(crate) fn new(bus: EventBus, owner: Owner) -> Self {
        bus.registry().ensure_group(owner);
        Self { bus, owner }
    }

    /// Narrows the registration to events of type `T`.
    ///
    /// Pure value step: no queue is attached and nothing is buffered yet;
    /// events posted before the terminal subscribe are missed, not replayed.
    pub fn of_type<T: Event>(self) -> EventSource<Arc<T>> {
        EventSource::typed(self.bus, self.owner)
    }

    /// The owner this registration is scoped to.
    #[inline]
    pub fn owner(&self) -> Owner {
        self.owner
    }
}
