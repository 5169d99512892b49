//! Fluent subscription pipeline.
//!
//! Three stages, the first two pure:
//!
//! ```text
//! EventBus::register(owner)      ─► Registration        (owner scope)
//!     .of_type::<T>()            ─► EventSource<Arc<T>> (type filter)
//!     .map / .filter / .compose  ─► EventSource<V>      (transforms)
//!     .subscribe_on / .observe_on                       (scheduling)
//!     .on_error / .on_complete                          (staged callbacks)
//!     .subscribe(..)             ─► live subscription   (the only side effect)
//! ```
//!
//! ## Contents
//! - [`Registration`] stage 1, owner scope
//! - [`EventSource`] stages 2 and 3, recipe and terminal calls
//! - [`ExecutionContext`] runtime selection for workers
//! - [`EventHandler`] trait form of a terminal subscriber

mod context;
mod handler;
mod registration;
mod source;

pub use context::ExecutionContext;
pub use handler::EventHandler;
pub use registration::Registration;
pub use source::EventSource;
