//! Integration tests for the request scheduler
//!
//! These drive the public scheduler API end to end against an in-process
//! transport, with tokio's clock paused so pacing runs instantly.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use comicwatch::domain::{Priority, Request};
use comicwatch::scheduler::{BreakReason, DispatchState, Scheduler, SchedulerConfig, SchedulerError};
use comicwatch::transport::{Transport, TransportError};
use proptest::prelude::*;
use serde_json::{Value, json};
use tokio::time::Instant;

/// Transport that answers from a script and records what it was asked
struct RecordingTransport {
    script: Mutex<VecDeque<Result<Value, TransportError>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl RecordingTransport {
    fn scripted(script: Vec<Result<Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn targets(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }

    fn starts(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, request: &Request) -> Result<Value, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.target().to_string(), Instant::now()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"target": request.target()})))
    }
}

fn unavailable() -> Result<Value, TransportError> {
    Err(TransportError::Status {
        status: 503,
        message: "unavailable".to_string(),
    })
}

// =============================================================================
// Dispatch order
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_user_request_overtakes_queued_scheduled_requests() {
    let transport = RecordingTransport::scripted(vec![]);
    let scheduler = Scheduler::new(SchedulerConfig::default(), transport.clone());

    let x = scheduler.submit(Request::get("X"), Priority::Scheduled);
    let y = scheduler.submit(Request::get("Y"), Priority::User);
    let z = scheduler.submit(Request::get("Z"), Priority::Scheduled);
    scheduler.start().unwrap();

    let (x, y, z) = tokio::join!(x.wait(), y.wait(), z.wait());
    assert!(x.is_ok() && y.is_ok() && z.is_ok());
    assert_eq!(transport.targets(), vec!["Y", "X", "Z"]);
}

#[tokio::test(start_paused = true)]
async fn test_user_request_does_not_preempt_running_request() {
    let transport = RecordingTransport::scripted(vec![]);
    let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), transport.clone()));
    scheduler.start().unwrap();

    let first = scheduler.submit(Request::get("background-1"), Priority::Scheduled);
    let second = scheduler.submit(Request::get("background-2"), Priority::Scheduled);

    // background-1 is mid-flight when the user request arrives
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(scheduler.queue_state().state, DispatchState::Executing);
    let user = scheduler.submit(Request::get("user"), Priority::User);

    let (a, b, c) = tokio::join!(first.wait(), second.wait(), user.wait());
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(transport.targets(), vec!["background-1", "user", "background-2"]);
}

// =============================================================================
// Retries and pacing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_two_failures_then_success_resolves() {
    let transport = RecordingTransport::scripted(vec![unavailable(), unavailable(), Ok(json!({"ok": true}))]);
    let scheduler = Scheduler::new(SchedulerConfig::default(), transport.clone());
    scheduler.start().unwrap();

    let value = scheduler.fetch("pools/1.json", Priority::User).await.unwrap();
    assert_eq!(value, json!({"ok": true}));
    assert_eq!(transport.targets().len(), 3);

    let stats = scheduler.stats();
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.total_retries, 2);
    assert_eq!(stats.total_fulfilled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_responses_are_retried_like_transport_failures() {
    let transport = RecordingTransport::scripted(vec![
        Err(TransportError::Malformed("expected value".to_string())),
        Ok(json!([1, 2])),
    ]);
    let scheduler = Scheduler::new(SchedulerConfig::default(), transport.clone());
    scheduler.start().unwrap();

    let value = scheduler.fetch("pools.json", Priority::User).await.unwrap();
    assert_eq!(value, json!([1, 2]));
    assert_eq!(transport.targets().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_breaks_after_max_attempts_and_loop_survives() {
    let transport = RecordingTransport::scripted(vec![unavailable(), unavailable(), unavailable()]);
    let scheduler = Scheduler::new(SchedulerConfig::default(), transport.clone());
    scheduler.start().unwrap();

    let err = scheduler.fetch("broken", Priority::User).await.unwrap_err();
    match err {
        SchedulerError::BrokenPromise(BreakReason::RetriesExhausted { attempts, last_error }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("503"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Script is now empty, so the next request succeeds on the same loop
    assert!(scheduler.fetch("healthy", Priority::User).await.is_ok());
    assert_eq!(transport.targets(), vec!["broken", "broken", "broken", "healthy"]);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_starts_are_paced() {
    let transport = RecordingTransport::scripted(vec![unavailable()]);
    let config = SchedulerConfig::default();
    let pacing = config.pacing_interval();
    assert_eq!(pacing, Duration::from_millis(510));

    let scheduler = Scheduler::new(config, transport.clone());
    let pending: Vec<_> = (0..4)
        .map(|i| scheduler.submit(Request::get(format!("r{i}")), Priority::Scheduled))
        .collect();
    scheduler.start().unwrap();
    for p in pending {
        p.wait().await.unwrap();
    }

    let starts = transport.starts();
    assert_eq!(starts.len(), 5);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= pacing, "gap {:?} under {:?}", pair[1] - pair[0], pacing);
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_each_get_their_own_result() {
    let transport = RecordingTransport::scripted(vec![]);
    let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), transport.clone()));
    scheduler.start().unwrap();

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.fetch(format!("post/{i}"), Priority::User).await })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let value = handle.await.unwrap().unwrap();
        assert_eq!(value, json!({"target": format!("post/{i}")}));
    }
    assert_eq!(scheduler.stats().total_fulfilled, 5);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_breaks_queued_and_rejects_new_requests() {
    let transport = RecordingTransport::scripted(vec![]);
    let scheduler = Scheduler::new(SchedulerConfig::default(), transport.clone());

    let queued = scheduler.submit(Request::get("queued"), Priority::User);
    assert_eq!(scheduler.shutdown(), 1);

    assert_eq!(
        queued.wait().await.unwrap_err().break_reason(),
        Some(&BreakReason::Shutdown)
    );
    let late = scheduler.fetch("late", Priority::User).await.unwrap_err();
    assert_eq!(late.break_reason(), Some(&BreakReason::Shutdown));
    assert!(transport.targets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_request_never_reaches_transport() {
    let transport = RecordingTransport::scripted(vec![]);
    let scheduler = Scheduler::new(SchedulerConfig::default(), transport.clone());

    let keep = scheduler.submit(Request::get("keep"), Priority::Scheduled);
    let drop_me = scheduler.submit(Request::get("cancel"), Priority::Scheduled);
    assert!(scheduler.cancel(drop_me.request_id()));
    assert!(!scheduler.cancel(drop_me.request_id()));

    scheduler.start().unwrap();
    keep.wait().await.unwrap();
    assert_eq!(
        drop_me.wait().await.unwrap_err().break_reason(),
        Some(&BreakReason::Cancelled)
    );
    assert_eq!(transport.targets(), vec!["keep"]);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Requests queued before start dispatch by priority, then submission order
    #[test]
    fn prop_dispatch_order_is_priority_then_fifo(users in proptest::collection::vec(any::<bool>(), 1..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let dispatched = runtime.block_on(async {
            let transport = RecordingTransport::scripted(vec![]);
            let scheduler = Scheduler::new(SchedulerConfig::default(), transport.clone());
            let pending: Vec<_> = users
                .iter()
                .enumerate()
                .map(|(i, &user)| {
                    let priority = if user { Priority::User } else { Priority::Scheduled };
                    scheduler.submit(Request::get(i.to_string()), priority)
                })
                .collect();
            scheduler.start().unwrap();
            for p in pending {
                p.wait().await.unwrap();
            }
            transport.targets()
        });

        let mut expected: Vec<(bool, usize)> = users.iter().copied().enumerate().map(|(i, u)| (u, i)).collect();
        expected.sort_by_key(|&(user, i)| (!user, i));
        let expected: Vec<String> = expected.into_iter().map(|(_, i)| i.to_string()).collect();
        prop_assert_eq!(dispatched, expected);
    }
}
