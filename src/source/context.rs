//! # Execution context selection.
//!
//! [`ExecutionContext`] names the Tokio runtime a subscription's workers run
//! on. The default inherits whatever runtime is ambient at subscribe time;
//! an explicit [`Handle`] pins work elsewhere, which isolates heavier
//! handlers and lets a bus shared across runtimes deliver where the
//! subscriber wants.

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Where a subscription's pipeline or handler work runs.
///
/// Chosen independently for the upstream pipeline
/// ([`subscribe_on`](crate::EventSource::subscribe_on)) and the handler side
/// ([`observe_on`](crate::EventSource::observe_on)).
///
/// ### Notes
/// - `Inherit` requires the terminal subscribe call to happen inside a Tokio
///   runtime context.
/// - With an explicit handle, subscribing works from any thread, runtime or
///   not.
#[derive(Clone, Debug, Default)]
pub enum ExecutionContext {
    /// Spawn onto the runtime that is current at subscribe time.
    #[default]
    Inherit,
    /// Spawn onto the given runtime handle.
    Runtime(Handle),
}

impl ExecutionContext {
    /// Spawns `future` on the selected runtime.
    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match self {
            ExecutionContext::Inherit => tokio::spawn(future),
            ExecutionContext::Runtime(handle) => handle.spawn(future),
        }
    }
}
