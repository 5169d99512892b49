//! # Example: pipeline
//!
//! Demonstrates the transform and scheduling stages of a subscription:
//! `map` changes the delivered value, `compose` packages a reusable
//! operator chain, and `observe_on` moves handler callbacks to a
//! dedicated runtime while the pipeline worker stays on the main one.
//!
//! Shows how to:
//! - Chain `filter` / `map` into a type-changing pipeline.
//! - Package an operator chain once and `compose` it into a source.
//! - Route handler callbacks through [`ExecutionContext::Runtime`].
//! - Stage an `on_error` callback for faults inside the pipeline.
//!
//! ## Flow
//! ```text
//! post(Measurement) ──► [queue] ──► worker (main runtime)
//!                                      │ filter: valid readings only
//!                                      │ map:    Measurement → celsius
//!                                      ▼
//!                                  [hop queue] ──► handler (worker runtime)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example pipeline
//! ```

use std::sync::Arc;
use std::time::Duration;

use typebus::{Event, EventBus, EventSource, ExecutionContext, Owner};

struct Measurement {
    sensor: &'static str,
    millikelvin: u64,
}
impl Event for Measurement {}

/// Reusable operator chain: drop implausible readings, convert to celsius.
fn plausible_celsius(source: EventSource<Arc<Measurement>>) -> EventSource<(&'static str, f64)> {
    source
        .filter(|m| m.millikelvin > 0 && m.millikelvin < 1_000_000)
        .map(|m| (m.sensor, m.millikelvin as f64 / 1000.0 - 273.15))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "typebus=debug".into()),
        )
        .init();

    let handler_rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("handler")
        .enable_all()
        .build()
        .expect("handler runtime");

    let bus = EventBus::new();
    let owner = Owner::new();

    bus.register(owner)
        .of_type::<Measurement>()
        .compose(plausible_celsius)
        .observe_on(ExecutionContext::Runtime(handler_rt.handle().clone()))
        .on_error(|err| async move {
            eprintln!("[pipeline] terminated: {err}");
        })
        .subscribe(|(sensor, celsius)| async move {
            let thread = std::thread::current();
            println!(
                "[{}] {sensor}: {celsius:.2} °C",
                thread.name().unwrap_or("?")
            );
        });

    bus.post(Measurement { sensor: "intake", millikelvin: 293_150 });
    bus.post(Measurement { sensor: "exhaust", millikelvin: 0 }); // filtered out
    bus.post(Measurement { sensor: "core", millikelvin: 310_650 });

    tokio::time::sleep(Duration::from_millis(200)).await;
    bus.unregister(owner);
}
