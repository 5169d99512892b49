//! # Subscriber handler trait and callback storage.
//!
//! [`EventHandler`] is the trait form of a terminal subscriber: one object
//! supplying the value callback plus optional error/completion hooks. The
//! closure form ([`EventSource::subscribe`](crate::EventSource::subscribe))
//! and the trait form share the boxed callback slots defined here.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::HandlerError;

/// Boxed value callback.
pub(crate) type NextFn<V> = Box<dyn Fn(V) -> BoxFuture<'static, ()> + Send + Sync>;
/// Boxed error callback.
pub(crate) type ErrorFn = Box<dyn Fn(HandlerError) -> BoxFuture<'static, ()> + Send + Sync>;
/// Boxed completion callback.
pub(crate) type CompleteFn = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Trait form of a terminal subscriber.
///
/// Driven by the subscription's dedicated worker, one event at a time
/// (per-subscription FIFO); callbacks of one subscription never run
/// concurrently with each other. Stateful handlers use interior mutability.
///
/// ## Contract
/// - [`on_next`](Self::on_next) may be slow: it delays only this
///   subscription's own queue.
/// - A panic in `on_next` is caught, routed to [`on_error`](Self::on_error),
///   and terminates the subscription; the owner's other subscriptions keep
///   running.
/// - [`on_complete`](Self::on_complete) fires once when the producer side
///   shuts down; never after an error, never after the owner unregistered.
#[async_trait]
pub trait EventHandler<V: Send + 'static>: Send + Sync + 'static {
    /// Handles one delivered value.
    async fn on_next(&self, value: V);

    /// Handles the subscription's terminal error.
    ///
    /// Default: reports through the process-wide log reporter.
    async fn on_error(&self, error: HandlerError) {
        tracing::error!(
            handler = self.name(),
            code = error.as_label(),
            "unhandled subscription error: {}",
            error.as_message()
        );
    }

    /// Runs once when the stream completes normally.
    async fn on_complete(&self) {}

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
