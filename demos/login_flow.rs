//! # Example: login_flow
//!
//! Demonstrates the owner lifecycle: two screens subscribe to different
//! event types, a session component posts events, and one screen tears
//! down all of its subscriptions with a single `unregister` call.
//!
//! Shows how to:
//! - Mark plain structs as bus events with [`Event`].
//! - Register type-filtered subscriptions under an [`Owner`].
//! - Release every subscription of a screen at once via `unregister`.
//!
//! ## Flow
//! ```text
//! session ──► bus.post(Login / Logout)
//!     ├─► home screen   (owner A): of_type::<Login>()  ──► greet
//!     ├─► status screen (owner B): of_type::<Logout>() ──► farewell
//!     └─► bus.unregister(A) ──► later Login events reach nobody
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example login_flow
//! ```

use std::time::Duration;

use typebus::{Event, EventBus, Owner};

struct Login {
    user: &'static str,
}
impl Event for Login {}

struct Logout {
    user: &'static str,
}
impl Event for Logout {}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "typebus=debug".into()),
        )
        .init();

    let bus = EventBus::new();

    // Each screen owns its subscriptions through its own handle.
    let home_screen = Owner::new();
    let status_screen = Owner::new();

    bus.register(home_screen)
        .of_type::<Login>()
        .subscribe(|login: std::sync::Arc<Login>| async move {
            println!("[home]   welcome, {}", login.user);
        });

    bus.register(status_screen)
        .of_type::<Logout>()
        .subscribe(|logout: std::sync::Arc<Logout>| async move {
            println!("[status] goodbye, {}", logout.user);
        });

    println!("--- session posts a login and a logout ---");
    bus.post(Login { user: "ada" });
    bus.post(Logout { user: "ada" });
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("--- home screen closes: unregister(home_screen) ---");
    bus.unregister(home_screen);

    bus.post(Login { user: "bob" }); // reaches nobody now
    bus.post(Logout { user: "bob" });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // idempotent: already-gone owners are a no-op
    bus.unregister(home_screen);
    bus.unregister(status_screen);
    println!("--- done: {} owners left ---", bus.owner_count());
}
