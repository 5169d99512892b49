//! End-to-end bus behavior: delivery, ordering, lifecycle, isolation.
//!
//! Everything here goes through the public surface only: post events, build
//! pipelines, unregister owners, and observe what handlers actually saw.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use typebus::{Event, EventBus, ExecutionContext, HandlerError, Owner, Stage};

struct Login {
    user: String,
}
impl Event for Login {}

struct Logout {
    user: String,
}
impl Event for Logout {}

struct Ping {
    seq: u64,
}
impl Event for Ping {}

/// Handler that forwards each delivered value into a collector channel.
fn forward<T: Send + 'static>(
    tx: &mpsc::UnboundedSender<T>,
) -> impl Fn(T) -> BoxFuture<'static, ()> + Send + Sync + 'static {
    let tx = tx.clone();
    move |value| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(value);
        }
        .boxed()
    }
}

async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("collector closed")
}

/// Polls `check` from sync code until it passes or the deadline hits.
fn wait_until(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !check() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[tokio::test]
async fn login_logout_owner_scenario() {
    let bus = EventBus::new();
    let screen = Owner::new();
    let (login_tx, mut login_rx) = mpsc::unbounded_channel();
    let (logout_tx, mut logout_rx) = mpsc::unbounded_channel();

    bus.register(screen)
        .of_type::<Login>()
        .map(|login| login.user.clone())
        .subscribe(forward(&login_tx));
    bus.register(screen)
        .of_type::<Logout>()
        .map(|logout| logout.user.clone())
        .subscribe(forward(&logout_tx));

    bus.post(Login { user: "ada".into() });
    bus.post(Logout { user: "ada".into() });

    assert_eq!(next(&mut login_rx).await, "ada");
    assert_eq!(next(&mut logout_rx).await, "ada");
    assert_eq!(bus.subscription_count(screen), 2);

    bus.unregister(screen);
    bus.post(Login { user: "bob".into() });
    bus.post(Logout { user: "bob".into() });

    sleep(Duration::from_millis(100)).await;
    assert!(login_rx.try_recv().is_err(), "unregistered owner saw a login");
    assert!(logout_rx.try_recv().is_err(), "unregistered owner saw a logout");

    // second unregister is a no-op
    bus.unregister(screen);
    assert!(!bus.is_registered(screen));
}

#[tokio::test]
async fn map_delivers_derived_value() {
    let bus = EventBus::new();
    let owner = Owner::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    bus.register(owner)
        .of_type::<Ping>()
        .map(|ping| ping.seq)
        .subscribe(forward(&tx));

    bus.post(Ping { seq: 7 });
    assert_eq!(next(&mut rx).await, 7);
    bus.unregister(owner);
}

#[tokio::test]
async fn unregister_is_terminal_even_for_queued_events() {
    let bus = EventBus::new();
    let owner = Owner::new();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    let (gate_tx, mut gate_rx) = mpsc::unbounded_channel::<()>();

    bus.register(owner).of_type::<Ping>().subscribe(move |_ping: Arc<Ping>| {
        let counter = Arc::clone(&counter);
        let gate_tx = gate_tx.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = gate_tx.send(());
            // hold the worker so later posts stay queued
            sleep(Duration::from_millis(200)).await;
        }
    });

    bus.post(Ping { seq: 0 });
    next(&mut gate_rx).await;

    // queue more while the worker is held, then cancel
    for seq in 1..50 {
        bus.post(Ping { seq });
    }
    bus.unregister(owner);

    sleep(Duration::from_millis(400)).await;
    assert_eq!(
        handled.load(Ordering::SeqCst),
        1,
        "queued events must be discarded on unregister"
    );
}

#[tokio::test]
async fn busy_subscriber_does_not_block_siblings() {
    let bus = EventBus::new();
    let stuck_owner = Owner::new();
    let live_owner = Owner::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    bus.register(stuck_owner)
        .of_type::<Ping>()
        .subscribe(|_ping: Arc<Ping>| async {
            futures::future::pending::<()>().await;
        });
    bus.register(live_owner)
        .of_type::<Ping>()
        .map(|ping| ping.seq)
        .subscribe(forward(&tx));

    for seq in 0..50 {
        bus.post(Ping { seq });
    }
    for seq in 0..50 {
        assert_eq!(next(&mut rx).await, seq);
    }

    bus.unregister(stuck_owner);
    bus.unregister(live_owner);
}

#[tokio::test]
async fn faulted_subscription_leaves_owner_and_siblings_intact() {
    let bus = EventBus::new();
    let owner = Owner::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // no on_error staged: the fault goes to the default reporter
    bus.register(owner).of_type::<Ping>().subscribe(|ping: Arc<Ping>| {
        let seq = ping.seq;
        async move {
            assert!(seq > 0, "rejects seq zero");
        }
    });
    bus.register(owner)
        .of_type::<Ping>()
        .map(|ping| ping.seq)
        .subscribe(forward(&tx));

    bus.post(Ping { seq: 0 });
    bus.post(Ping { seq: 1 });

    assert_eq!(next(&mut rx).await, 0);
    assert_eq!(next(&mut rx).await, 1);
    assert!(bus.is_registered(owner), "fault must not unregister the owner");
    assert_eq!(bus.subscription_count(owner), 2, "inert member stays counted");

    bus.unregister(owner);
}

#[tokio::test]
async fn error_callback_sees_the_fault_once() {
    let bus = EventBus::new();
    let owner = Owner::new();
    let (err_tx, mut err_rx) = mpsc::unbounded_channel::<HandlerError>();

    bus.register(owner)
        .of_type::<Ping>()
        .on_error(forward(&err_tx))
        .subscribe(|_ping: Arc<Ping>| async {
            panic!("handler exploded");
        });

    bus.post(Ping { seq: 1 });
    bus.post(Ping { seq: 2 });

    let err = next(&mut err_rx).await;
    assert_eq!(err.stage(), Stage::OnNext);
    assert!(err.as_message().contains("handler exploded"));

    sleep(Duration::from_millis(100)).await;
    assert!(err_rx.try_recv().is_err(), "on_error fires at most once");
    bus.unregister(owner);
}

#[tokio::test]
async fn completion_fires_after_backlog_drained() {
    let bus = EventBus::new();
    let owner = Owner::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let complete_tx = tx.clone();

    bus.register(owner)
        .of_type::<Ping>()
        .map(|ping| ping.seq)
        .on_complete(move || {
            let tx = complete_tx.clone();
            async move {
                let _ = tx.send("complete".into());
            }
        })
        .subscribe(move |seq| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(format!("next:{seq}"));
            }
        });

    for seq in 0..3 {
        bus.post(Ping { seq });
    }
    drop(bus);

    assert_eq!(next(&mut rx).await, "next:0");
    assert_eq!(next(&mut rx).await, "next:1");
    assert_eq!(next(&mut rx).await, "next:2");
    assert_eq!(next(&mut rx).await, "complete");
}

#[tokio::test]
async fn unregister_fires_no_terminal_callbacks() {
    let bus = EventBus::new();
    let owner = Owner::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<&'static str>();
    let err_tx = tx.clone();
    let complete_tx = tx.clone();

    bus.register(owner)
        .of_type::<Ping>()
        .on_error(move |_err| {
            let tx = err_tx.clone();
            async move {
                let _ = tx.send("error");
            }
        })
        .on_complete(move || {
            let tx = complete_tx.clone();
            async move {
                let _ = tx.send("complete");
            }
        })
        .subscribe(move |_ping: Arc<Ping>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send("next");
            }
        });

    bus.post(Ping { seq: 1 });
    assert_eq!(next(&mut rx).await, "next");

    bus.unregister(owner);
    sleep(Duration::from_millis(100)).await;
    assert!(
        rx.try_recv().is_err(),
        "disposal is not a stream terminal: no error, no complete"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_posts_keep_one_total_order() {
    let bus = EventBus::new();
    let owner = Owner::new();
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();

    bus.register(owner)
        .of_type::<Ping>()
        .map(|ping| ping.seq)
        .subscribe(forward(&tx_a));
    bus.register(owner)
        .of_type::<Ping>()
        .map(|ping| ping.seq)
        .subscribe(forward(&tx_b));

    // plain threads, no runtime on the posting side
    let posters: Vec<_> = (0..4u64)
        .map(|p| {
            let bus = bus.clone();
            std::thread::spawn(move || {
                for i in 0..250u64 {
                    bus.post(Ping { seq: p * 1000 + i });
                }
            })
        })
        .collect();
    for poster in posters {
        poster.join().unwrap();
    }

    let mut seen_a = Vec::with_capacity(1000);
    let mut seen_b = Vec::with_capacity(1000);
    for _ in 0..1000 {
        seen_a.push(next(&mut rx_a).await);
        seen_b.push(next(&mut rx_b).await);
    }
    assert_eq!(seen_a, seen_b, "subscriptions disagree on the post order");

    // per-producer FIFO inside the total order
    for p in 0..4u64 {
        let per_producer: Vec<_> = seen_a
            .iter()
            .copied()
            .filter(|seq| seq / 1000 == p)
            .collect();
        let mut sorted = per_producer.clone();
        sorted.sort_unstable();
        assert_eq!(per_producer, sorted, "producer {p} was reordered");
    }

    bus.unregister(owner);
}

#[tokio::test]
async fn stream_supports_pull_consumption() {
    let bus = EventBus::new();
    let mut pings = bus.stream::<Ping>();

    bus.post(Ping { seq: 1 });
    bus.post(Login { user: "ada".into() });
    bus.post(Ping { seq: 2 });

    assert_eq!(pings.recv().await.unwrap().seq, 1);
    assert_eq!(pings.recv().await.unwrap().seq, 2);
    assert_eq!(bus.subscriber_count(), 1);

    drop(pings);
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn explicit_contexts_work_without_ambient_runtime() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("pipeline-side")
        .enable_all()
        .build()
        .unwrap();

    let bus = EventBus::new();
    let owner = Owner::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    // no runtime is entered on this thread at any point
    bus.register(owner)
        .of_type::<Ping>()
        .map(|ping| {
            let worker = std::thread::current().name().unwrap_or("").to_string();
            (worker, ping.seq)
        })
        .subscribe_on(ExecutionContext::Runtime(rt.handle().clone()))
        .subscribe(forward(&tx));

    bus.post(Ping { seq: 9 });

    let mut delivered = None;
    wait_until("explicit-context delivery", || match rx.try_recv() {
        Ok(value) => {
            delivered = Some(value);
            true
        }
        Err(_) => false,
    });
    let (worker, seq) = delivered.unwrap();
    assert_eq!(seq, 9);
    assert!(
        worker.contains("pipeline-side"),
        "transform ran on {worker:?} instead of the chosen runtime"
    );

    bus.unregister(owner);
}

#[test]
fn observe_on_moves_handler_to_chosen_runtime() {
    let upstream_rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("upstream-side")
        .enable_all()
        .build()
        .unwrap();
    let handler_rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("observe-side")
        .enable_all()
        .build()
        .unwrap();

    let bus = EventBus::new();
    let owner = Owner::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    bus.register(owner)
        .of_type::<Ping>()
        .map(|ping| {
            let transform_thread = std::thread::current().name().unwrap_or("").to_string();
            (transform_thread, ping.seq)
        })
        .subscribe_on(ExecutionContext::Runtime(upstream_rt.handle().clone()))
        .observe_on(ExecutionContext::Runtime(handler_rt.handle().clone()))
        .subscribe(move |(transform_thread, seq)| {
            let tx = tx.clone();
            async move {
                let handler_thread = std::thread::current().name().unwrap_or("").to_string();
                let _ = tx.send((transform_thread, handler_thread, seq));
            }
        });

    bus.post(Ping { seq: 3 });

    let mut delivered = None;
    wait_until("observe_on delivery", || match rx.try_recv() {
        Ok(value) => {
            delivered = Some(value);
            true
        }
        Err(_) => false,
    });
    let (transform_thread, handler_thread, seq) = delivered.unwrap();
    assert_eq!(seq, 3);
    assert!(transform_thread.contains("upstream-side"), "transform on {transform_thread:?}");
    assert!(handler_thread.contains("observe-side"), "handler on {handler_thread:?}");

    bus.unregister(owner);
}

#[tokio::test]
async fn post_arc_shares_one_allocation() {
    let bus = EventBus::new();
    let owner = Owner::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    bus.register(owner)
        .of_type::<Ping>()
        .subscribe(forward(&tx));

    let ping = Arc::new(Ping { seq: 11 });
    bus.post_arc(Arc::clone(&ping));

    let delivered = next(&mut rx).await;
    assert_eq!(delivered.seq, 11);
    assert!(Arc::ptr_eq(&delivered, &ping), "delivery must share the posted allocation");

    bus.unregister(owner);
}
