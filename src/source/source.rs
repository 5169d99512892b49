//! # Lazy subscription pipelines.
//!
//! [`EventSource`] is a recipe for one subscription: a type filter plus a
//! chain of transforms and scheduling choices, built up by value and inert
//! until a terminal call. The terminal call is the only step with side
//! effects: it takes a member token from the owner's group, attaches a queue
//! to the channel, and spawns the delivery worker(s).
//!
//! ## Architecture
//! ```text
//! bus.register(owner)                 ensure owner group
//!     .of_type::<Ping>()              type filter        (pure)
//!     .map(|p| p.seq)                 transform          (pure)
//!     .observe_on(ctx)                handler placement  (pure)
//!     .subscribe(|seq| async { .. })  token + queue + worker(s)
//!
//! post(Ping) ──► [queue] ──► pipeline worker ── extract / transform
//!                                 │                  │ panic → on_error, stop
//!                                 │ observe_on set   ▼
//!                                 └────────► [hop queue] ──► handler worker
//!                                                              on_next(value)
//! ```
//!
//! ## Rules
//! - **Pure until terminal**: `map` / `filter` / `compose` / `subscribe_on` /
//!   `observe_on` / `on_error` / `on_complete` only rebuild the recipe.
//! - **Per-subscription FIFO**: one worker per subscription; values are
//!   handled one at a time in post order.
//! - **Fault isolation**: a panic in a transform or callback terminates this
//!   subscription only; `post` callers and other subscriptions never see it.
//! - **Self-termination leaves the group**: an errored subscription becomes
//!   an inert member; the owner stays registered until `unregister`.
//! - **Cancellation wins**: when the owner unregisters, queued undelivered
//!   values are discarded and neither `on_error` nor `on_complete` fires.
//! - **Completion drains**: when the producer side shuts down, buffered
//!   values are delivered before `on_complete`.

use std::any::TypeId;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::bus::EventBus;
use crate::error::{HandlerError, Stage};
use crate::events::{Event, Payload, RawStream};
use crate::registry::Owner;
use crate::source::context::ExecutionContext;
use crate::source::handler::{CompleteFn, ErrorFn, EventHandler, NextFn};

/// Composed payload-to-value extraction (type filter plus transforms).
type ExtractFn<V> = Box<dyn Fn(Payload) -> Option<V> + Send + Sync>;

/// Signals crossing the `observe_on` hop, in delivery order.
enum Signal<V> {
    Next(V),
    Error(HandlerError),
    Complete,
}

/// How a delivery worker ended.
enum Outcome {
    Cancelled,
    Completed,
    Failed(HandlerError),
}

/// A lazily-built subscription recipe for values of type `V`.
///
/// Produced by [`Registration::of_type`](crate::Registration::of_type) and
/// rebuilt by every combinator; consumed by the terminal
/// [`subscribe`](Self::subscribe) / [`subscribe_handler`](Self::subscribe_handler).
/// A source that is dropped without a terminal call subscribes nothing.
#[must_use = "an event source delivers nothing until a terminal subscribe"]
pub struct EventSource<V> {
    bus: EventBus,
    owner: Owner,
    tag: TypeId,
    label: &'static str,
    extract: ExtractFn<V>,
    subscribe_on: ExecutionContext,
    observe_on: Option<ExecutionContext>,
    error_fn: Option<ErrorFn>,
    complete_fn: Option<CompleteFn>,
}

impl<T: Event> EventSource<Arc<T>> {
    /// Entry stage: matches events of runtime type `T`, delivered as `Arc<T>`.
    pub(crate) fn typed(bus: EventBus, owner: Owner) -> Self {
        Self {
            bus,
            owner,
            tag: TypeId::of::<T>(),
            label: std::any::type_name::<T>(),
            extract: Box::new(|payload| payload.downcast::<T>().ok()),
            subscribe_on: ExecutionContext::Inherit,
            observe_on: None,
            error_fn: None,
            complete_fn: None,
        }
    }
}

impl<V: Send + 'static> EventSource<V> {
    /// Transforms each value, changing the element type.
    ///
    /// Runs on the pipeline worker, before the `observe_on` hop (if any).
    pub fn map<U, F>(self, transform: F) -> EventSource<U>
    where
        U: Send + 'static,
        F: Fn(V) -> U + Send + Sync + 'static,
    {
        let extract = self.extract;
        EventSource {
            bus: self.bus,
            owner: self.owner,
            tag: self.tag,
            label: self.label,
            extract: Box::new(move |payload| extract(payload).map(&transform)),
            subscribe_on: self.subscribe_on,
            observe_on: self.observe_on,
            error_fn: self.error_fn,
            complete_fn: self.complete_fn,
        }
    }

    /// Keeps only values matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&V) -> bool + Send + Sync + 'static,
    {
        let extract = self.extract;
        self.extract = Box::new(move |payload| extract(payload).filter(|value| predicate(value)));
        self
    }

    /// Applies a reusable, named transformation to the source as a whole.
    ///
    /// `transform` runs immediately and returns the rebuilt source; nothing
    /// is subscribed. Useful for packaging an operator chain once and
    /// applying it to many pipelines.
    pub fn compose<U, F>(self, transform: F) -> EventSource<U>
    where
        U: Send + 'static,
        F: FnOnce(EventSource<V>) -> EventSource<U>,
    {
        transform(self)
    }

    /// Selects the runtime the pipeline worker runs on (queue receive plus
    /// transforms, and the handler too unless [`observe_on`](Self::observe_on)
    /// adds a hop).
    ///
    /// Production is unaffected: `post` always runs on the caller's thread.
    pub fn subscribe_on(mut self, context: ExecutionContext) -> Self {
        self.subscribe_on = context;
        self
    }

    /// Routes handler callbacks through a second queue onto the given
    /// runtime, leaving upstream transforms where
    /// [`subscribe_on`](Self::subscribe_on) put them.
    pub fn observe_on(mut self, context: ExecutionContext) -> Self {
        self.observe_on = Some(context);
        self
    }

    /// Stages an error callback for the terminal subscribe.
    ///
    /// Invoked at most once, with the fault that terminated the
    /// subscription. Without one, terminal faults go to the default log
    /// reporter; either way the subscription ends.
    pub fn on_error<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(HandlerError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.error_fn = Some(Box::new(move |error| callback(error).boxed()));
        self
    }

    /// Stages a completion callback for the terminal subscribe.
    ///
    /// Fires once when the producer side shuts down, after the buffered
    /// backlog is delivered. Never fires after an error or after the owner
    /// unregistered.
    pub fn on_complete<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.complete_fn = Some(Box::new(move || callback().boxed()));
        self
    }

    /// Activates the subscription with a value handler.
    ///
    /// This is the only stage with side effects: it takes a member token
    /// from the owner's group, attaches a queue to the channel, and spawns
    /// the delivery worker(s) on the selected contexts. Each `on_next`
    /// future runs to completion before the next value is taken.
    ///
    /// Unless an explicit runtime was chosen via
    /// [`subscribe_on`](Self::subscribe_on) (and
    /// [`observe_on`](Self::observe_on), when set), this call must happen
    /// inside a Tokio runtime context.
    pub fn subscribe<F, Fut>(self, on_next: F)
    where
        F: Fn(V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.activate(Box::new(move |value| on_next(value).boxed()));
    }

    /// Activates the subscription with a handler object supplying all three
    /// callbacks ([`EventHandler::on_next`] / `on_error` / `on_complete`).
    ///
    /// Replaces callbacks staged earlier via [`on_error`](Self::on_error) /
    /// [`on_complete`](Self::on_complete).
    pub fn subscribe_handler<H>(self, handler: H)
    where
        H: EventHandler<V>,
    {
        let handler = Arc::new(handler);
        let for_error = Arc::clone(&handler);
        let for_complete = Arc::clone(&handler);
        self.on_error(move |error| {
            let handler = Arc::clone(&for_error);
            async move { handler.on_error(error).await }
        })
        .on_complete(move || {
            let handler = Arc::clone(&for_complete);
            async move { handler.on_complete().await }
        })
        .subscribe(move |value| {
            let handler = Arc::clone(&handler);
            async move { handler.on_next(value).await }
        });
    }

    fn activate(self, on_next: NextFn<V>) {
        let EventSource {
            bus,
            owner,
            tag,
            label,
            extract,
            subscribe_on,
            observe_on,
            error_fn,
            complete_fn,
        } = self;

        let token = bus.registry().add_to_group(owner);
        let mut stream = bus.channel().attach_raw(tag, label, token.clone());
        tracing::debug!(owner = %owner, ty = label, "subscription activated");

        match observe_on {
            // Single worker: receive, transform, handle.
            None => {
                subscribe_on.spawn(async move {
                    let outcome = loop {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => break Outcome::Cancelled,
                            payload = stream.recv() => match payload {
                                None => break Outcome::Completed,
                                Some(payload) => match extract_value(&extract, payload) {
                                    Ok(None) => continue,
                                    Ok(Some(value)) => {
                                        if let Err(err) =
                                            run_guarded(Stage::OnNext, || on_next(value)).await
                                        {
                                            break Outcome::Failed(err);
                                        }
                                    }
                                    Err(err) => break Outcome::Failed(err),
                                },
                            },
                        }
                    };
                    finish(outcome, owner, label, error_fn, complete_fn).await;
                });
            }
            // Two workers: upstream extracts and forwards, downstream handles.
            Some(observe_context) => {
                let (hop_tx, mut hop_rx) = mpsc::unbounded_channel::<Signal<V>>();
                let hop_token = token.clone();

                subscribe_on.spawn(async move {
                    let outcome = loop {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => break Outcome::Cancelled,
                            payload = stream.recv() => match payload {
                                None => break Outcome::Completed,
                                Some(payload) => match extract_value(&extract, payload) {
                                    Ok(None) => continue,
                                    Ok(Some(value)) => {
                                        if hop_tx.send(Signal::Next(value)).is_err() {
                                            // handler side already terminated
                                            break Outcome::Cancelled;
                                        }
                                    }
                                    Err(err) => break Outcome::Failed(err),
                                },
                            },
                        }
                    };
                    match outcome {
                        Outcome::Cancelled => {}
                        Outcome::Completed => {
                            let _ = hop_tx.send(Signal::Complete);
                        }
                        Outcome::Failed(err) => {
                            let _ = hop_tx.send(Signal::Error(err));
                        }
                    }
                });

                observe_context.spawn(async move {
                    let outcome = loop {
                        tokio::select! {
                            biased;
                            _ = hop_token.cancelled() => break Outcome::Cancelled,
                            signal = hop_rx.recv() => match signal {
                                None => break Outcome::Cancelled,
                                Some(Signal::Next(value)) => {
                                    if let Err(err) =
                                        run_guarded(Stage::OnNext, || on_next(value)).await
                                    {
                                        break Outcome::Failed(err);
                                    }
                                }
                                Some(Signal::Error(err)) => break Outcome::Failed(err),
                                Some(Signal::Complete) => break Outcome::Completed,
                            },
                        }
                    };
                    finish(outcome, owner, label, error_fn, complete_fn).await;
                });
            }
        }
    }
}

/// Runs the composed extraction, catching panics from user transforms.
fn extract_value<V>(extract: &ExtractFn<V>, payload: Payload) -> Result<Option<V>, HandlerError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| extract(payload)))
        .map_err(|panic| HandlerError::from_panic(Stage::Transform, &*panic))
}

/// Builds and awaits one callback future, catching panics on both the
/// synchronous call and the await.
async fn run_guarded<F>(stage: Stage, make: F) -> Result<(), HandlerError>
where
    F: FnOnce() -> BoxFuture<'static, ()>,
{
    let fut = std::panic::catch_unwind(AssertUnwindSafe(make))
        .map_err(|panic| HandlerError::from_panic(stage, &*panic))?;
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .map_err(|panic| HandlerError::from_panic(stage, &*panic))
}

/// Runs the terminal callback matching `outcome`.
///
/// Cancellation is not a stream terminal: it runs nothing.
async fn finish(
    outcome: Outcome,
    owner: Owner,
    label: &'static str,
    error_fn: Option<ErrorFn>,
    complete_fn: Option<CompleteFn>,
) {
    match outcome {
        Outcome::Cancelled => {
            tracing::debug!(owner = %owner, ty = label, "subscription cancelled");
        }
        Outcome::Completed => {
            tracing::debug!(owner = %owner, ty = label, "subscription completed");
            if let Some(complete) = complete_fn {
                if let Err(fault) = run_guarded(Stage::OnComplete, complete).await {
                    report_default(owner, label, &fault);
                }
            }
        }
        Outcome::Failed(err) => match error_fn {
            Some(callback) => {
                if let Err(fault) = run_guarded(Stage::OnError, move || callback(err)).await {
                    report_default(owner, label, &fault);
                }
            }
            None => report_default(owner, label, &err),
        },
    }
}

/// Default reporter for faults no error callback was staged for.
fn report_default(owner: Owner, label: &'static str, error: &HandlerError) {
    tracing::error!(
        owner = %owner,
        ty = label,
        code = error.as_label(),
        "unhandled subscription error: {}",
        error.as_message()
    );
}
