//! Architectural Contract Test: Run Loop & Scheduling
//!
//! Constraints verified:
//! - Single-run mode performs exactly one cycle and stops
//! - Periodic mode sleeps for the interval between cycles
//! - An interrupt wakes the loop early and starts a cycle immediately
//! - Shutdown takes effect at the next sleep, never mid-cycle
//! - A panic inside a cycle does not end the loop

mod common;

use async_trait::async_trait;
use common::*;
use ddns_core::{
    Address, AddressFamily, AddressLookup, DdnsEngine, EngineOptions, ExpectedName, RecordGraph,
    RecordSpec, Scheduler, TaskState, UpdateTarget, WakeReason,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

const INTERVAL: Duration = Duration::from_secs(3600);

fn graph(provider: &Arc<MockDnsProvider>) -> RecordGraph {
    let record = Arc::new(RecordSpec::local(AddressFamily::V6));
    RecordGraph::build(
        vec![("home".to_string(), Arc::clone(&record))],
        vec![UpdateTarget::new(
            "host.example.com",
            provider.clone(),
            "zone",
            "rec",
            record,
        )
        .with_expected_name(ExpectedName::DeriveFromTargetName)],
    )
}

fn start(
    lookup: Arc<dyn AddressLookup>,
    provider: &Arc<MockDnsProvider>,
    update_interval: Option<Duration>,
) -> (Scheduler<WakeReason>, JoinHandle<()>) {
    let engine = Arc::new(DdnsEngine::new(
        graph(provider),
        lookup,
        EngineOptions {
            server_name: "test-server".to_string(),
            update_interval,
            force_update: true,
        },
    ));
    let scheduler: Scheduler<WakeReason> = Scheduler::new("ddns");
    let handle = scheduler.start(move |s| engine.run(s)).unwrap();
    (scheduler, handle)
}

/// Let spawned tasks make progress without advancing the paused clock
async fn settle_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

fn provider() -> Arc<MockDnsProvider> {
    MockDnsProvider::new().with_record("rec", "host.example.com", "2001:db8::1")
}

#[tokio::test(start_paused = true)]
async fn single_run_mode_stops_after_one_cycle() {
    let provider = provider();
    let lookup = CountingLookup::new().answering("2001:db8::42");
    let (scheduler, handle) = start(lookup.clone(), &provider, None);

    handle.await.unwrap();

    assert_eq!(scheduler.state(), TaskState::Stopped);
    assert_eq!(lookup.call_count(), 1);
    assert_eq!(provider.put_call_count(), 1);
    assert_eq!(provider.remote("rec").unwrap().content, "2001:db8::42");
}

#[tokio::test(start_paused = true)]
async fn next_cycle_starts_when_the_interval_elapses() {
    let provider = provider();
    let lookup = CountingLookup::new().answering("2001:db8::42");
    let (scheduler, _handle) = start(lookup.clone(), &provider, Some(INTERVAL));

    settle_until(|| scheduler.is_sleeping()).await;
    assert_eq!(lookup.call_count(), 1);

    tokio::time::advance(INTERVAL / 2).await;
    settle().await;
    assert_eq!(lookup.call_count(), 1);

    tokio::time::advance(INTERVAL / 2 + Duration::from_millis(1)).await;
    settle_until(|| lookup.call_count() == 2).await;
}

#[tokio::test(start_paused = true)]
async fn run_now_wakes_the_loop_early() {
    let provider = provider();
    let lookup = CountingLookup::new().answering("2001:db8::42");
    let (scheduler, _handle) = start(lookup.clone(), &provider, Some(INTERVAL));

    settle_until(|| scheduler.is_sleeping()).await;
    lookup.set("2001:db8::43");
    scheduler.interrupt(WakeReason::RunNow).unwrap();

    settle_until(|| lookup.call_count() == 2).await;
    settle_until(|| scheduler.is_sleeping()).await;
    assert_eq!(provider.remote("rec").unwrap().content, "2001:db8::43");
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_a_sleeping_loop() {
    let provider = provider();
    let lookup = CountingLookup::new().answering("2001:db8::42");
    let (scheduler, handle) = start(lookup.clone(), &provider, Some(INTERVAL));

    settle_until(|| scheduler.is_sleeping()).await;
    scheduler.interrupt(WakeReason::Shutdown).unwrap();
    handle.await.unwrap();

    assert_eq!(scheduler.state(), TaskState::Stopped);
    assert_eq!(lookup.call_count(), 1);
    assert_eq!(
        scheduler.interrupt(WakeReason::RunNow),
        Err(ddns_core::SchedulerError::NotRunning)
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_raised_during_a_cycle_lets_it_finish() {
    let provider = provider();
    let lookup = CountingLookup::new().answering("2001:db8::42");
    let (scheduler, handle) = start(lookup.clone(), &provider, Some(INTERVAL));

    // the loop has not run yet; the request waits for its first sleep
    scheduler.interrupt(WakeReason::Shutdown).unwrap();
    handle.await.unwrap();

    assert_eq!(lookup.call_count(), 1);
    assert_eq!(provider.put_call_count(), 1);
}

/// Panics on its first lookup, answers afterwards
struct PanicOnceLookup {
    calls: AtomicUsize,
}

#[async_trait]
impl AddressLookup for PanicOnceLookup {
    async fn lookup(&self, _family: AddressFamily) -> ddns_core::Result<Address> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("lookup blew up");
        }
        Ok("2001:db8::7".parse().unwrap())
    }

    fn name(&self) -> &str {
        "panic-once"
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_cycle_does_not_end_the_loop() {
    let provider = provider();
    let lookup = Arc::new(PanicOnceLookup {
        calls: AtomicUsize::new(0),
    });
    let (scheduler, _handle) = start(lookup, &provider, Some(INTERVAL));

    settle_until(|| scheduler.is_sleeping()).await;
    assert_eq!(scheduler.state(), TaskState::Running);
    assert_eq!(provider.put_call_count(), 0);

    scheduler.interrupt(WakeReason::RunNow).unwrap();
    settle_until(|| provider.put_call_count() == 1).await;
    assert_eq!(provider.remote("rec").unwrap().content, "2001:db8::7");
}
