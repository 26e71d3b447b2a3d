#![allow(clippy::unwrap_used)]
// Busy-retry behaviour of `CommandSubmitter` against wiremock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use botlink_core::{
    ClientConfig, CommandRequest, CommandSubmitter, CoreError, RetryState, SubmitBackoff,
    SubmitOutcome, SubmitPolicy, SyncConfig, SyncCoordinator, SyncEvent,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn setup(server: &MockServer, policy: SubmitPolicy) -> (CommandSubmitter, SyncCoordinator) {
    let client = ClientConfig::new(Url::parse(&server.uri()).unwrap())
        .build_client()
        .unwrap();
    let client = Arc::new(ArcSwap::from_pointee(client));
    let coordinator = SyncCoordinator::new(Arc::clone(&client), SyncConfig::default());
    let submitter = CommandSubmitter::new(client, coordinator.clone(), policy);
    (submitter, coordinator)
}

fn quick_policy(max_attempts: u32) -> SubmitPolicy {
    SubmitPolicy {
        backoff: SubmitBackoff::new(10, 20, 0.0),
        max_attempts,
        max_wait: Duration::from_secs(5),
    }
}

fn busy() -> ResponseTemplate {
    ResponseTemplate::new(409).set_body_json(json!({ "detail": "command in progress" }))
}

async fn post_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap().len()
}

fn drain(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Busy retry ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_busy_then_accepted_waits_for_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command"))
        .respond_with(busy())
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/command"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "request_id": "r2" })))
        .mount(&server)
        .await;

    let (submitter, coordinator) = setup(&server, SubmitPolicy::default());
    let mut events = coordinator.subscribe();

    let started = Instant::now();
    let request_id = submitter
        .submit(&CommandRequest::new("go home"))
        .await
        .unwrap();

    assert_eq!(request_id, "r2");
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(post_count(&server).await, 2);

    let notices: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SyncEvent::Notice(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].starts_with("System busy, retrying in "), "{}", notices[0]);
}

#[tokio::test]
async fn test_single_attempt_reports_busy_and_advances_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command"))
        .respond_with(busy())
        .mount(&server)
        .await;

    let (submitter, _coordinator) = setup(&server, SubmitPolicy::default());
    let mut state = RetryState::default();

    let outcome = submitter
        .submit_once(&CommandRequest::new("wave"), &mut state)
        .await
        .unwrap();
    let SubmitOutcome::Busy { retry_in, attempt } = outcome else {
        panic!("expected Busy, got: {outcome:?}");
    };
    assert_eq!(attempt, 1);
    assert!(retry_in >= Duration::from_millis(500));
    assert!(retry_in <= Duration::from_millis(625));
    assert_eq!(state.attempt, 1);
    assert_eq!(state.next_delay, Some(retry_in));

    let outcome = submitter
        .submit_once(&CommandRequest::new("wave"), &mut state)
        .await
        .unwrap();
    let SubmitOutcome::Busy { retry_in, .. } = outcome else {
        panic!("expected Busy, got: {outcome:?}");
    };
    assert!(retry_in >= Duration::from_millis(1_000));
    assert!(retry_in <= Duration::from_millis(1_250));
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command"))
        .respond_with(busy())
        .mount(&server)
        .await;

    let (submitter, coordinator) = setup(&server, quick_policy(3));
    let mut events = coordinator.subscribe();

    let result = submitter.submit(&CommandRequest::new("dance")).await;
    assert!(
        matches!(result, Err(CoreError::Busy { attempts: 3 })),
        "got: {result:?}"
    );
    assert_eq!(post_count(&server).await, 3);

    let errors = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, SyncEvent::Error(_)))
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn test_gives_up_when_wait_budget_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command"))
        .respond_with(busy())
        .mount(&server)
        .await;

    let policy = SubmitPolicy {
        backoff: SubmitBackoff::new(100, 100, 0.0),
        max_attempts: 50,
        max_wait: Duration::from_millis(250),
    };
    let (submitter, _coordinator) = setup(&server, policy);

    let result = submitter.submit(&CommandRequest::new("spin")).await;
    assert!(matches!(result, Err(CoreError::Busy { attempts: 3 })), "got: {result:?}");
}

#[tokio::test]
async fn test_cancel_interrupts_pending_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command"))
        .respond_with(busy())
        .mount(&server)
        .await;

    let policy = SubmitPolicy {
        backoff: SubmitBackoff::new(5_000, 5_000, 0.0),
        ..SubmitPolicy::default()
    };
    let (submitter, _coordinator) = setup(&server, policy);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = submitter
        .submit_cancellable(&CommandRequest::new("sit"), &cancel)
        .await;

    assert!(matches!(result, Err(CoreError::Cancelled)), "got: {result:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(post_count(&server).await, 1);
}

// ── Non-busy failures ───────────────────────────────────────────────

#[tokio::test]
async fn test_bad_request_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "prompt is empty" })),
        )
        .mount(&server)
        .await;

    let (submitter, coordinator) = setup(&server, SubmitPolicy::default());
    let mut events = coordinator.subscribe();
    let mut state = RetryState {
        attempt: 2,
        next_delay: Some(Duration::from_millis(2_000)),
    };

    let result = submitter
        .submit_once(&CommandRequest::new(""), &mut state)
        .await;

    match result {
        Err(CoreError::Rejected { message }) => assert_eq!(message, "prompt is empty"),
        other => panic!("expected Rejected, got: {other:?}"),
    }
    assert_eq!(state, RetryState::default());
    assert_eq!(post_count(&server).await, 1);
    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, SyncEvent::Error(m) if m.contains("prompt is empty")))
    );
}

#[tokio::test]
async fn test_server_error_surfaces_generic_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/command"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string("Traceback: KeyError 'arm_state' at planner.py:88"),
        )
        .mount(&server)
        .await;

    let (submitter, coordinator) = setup(&server, SubmitPolicy::default());
    let mut events = coordinator.subscribe();
    let result = submitter.submit(&CommandRequest::new("go home")).await;

    let err = result.unwrap_err();
    assert!(matches!(err, CoreError::SubmissionFailed { .. }), "{err:?}");
    assert_eq!(err.to_string(), "Command submission failed: HTTP 500");
    assert_eq!(post_count(&server).await, 1);

    // Server internals never reach consumers.
    let errors: Vec<String> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            SyncEvent::Error(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(errors, vec!["Command submission failed: HTTP 500".to_owned()]);
}
