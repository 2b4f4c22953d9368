// Status poller integration tests
//
// Drives the polling state machine against scripted status sequences:
// - terminal success and failure classification
// - timeout at the attempt ceiling with no further polls afterwards
// - transient-error retry with a bounded budget
// - the file-list completion fallback of the long-running variant
// - cancellation stopping only the local loop

use dqp_common::api::{FileRecord, JobStatus, JobStatusReport};
use dqp_wizard::services::{DqBackend, MockBackend};
use dqp_wizard::wizard::{PollOutcome, StatusPoller, WizardEvent};
use dqp_wizard::{PollState, PollerConfig, WizardError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn fast_config() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(1),
        timeout: Duration::from_secs(10),
        max_attempts: 50,
        retry_budget: 3,
        retry_backoff: Duration::from_millis(1),
        list_fallback: false,
        fallback_after_polls: 0,
        success_linger: Duration::from_millis(5),
    }
}

fn poller(backend: Arc<MockBackend>, config: PollerConfig) -> StatusPoller {
    let (event_tx, _) = broadcast::channel::<WizardEvent>(32);
    StatusPoller::new(backend, config, event_tx)
}

/// Scenario: QUEUED, DQ_RUNNING, DQ_RUNNING, DQ_FIXED ends in success with
/// progress 100.
#[tokio::test]
async fn success_sequence_reaches_progress_100() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status(upload_id, JobStatus::Queued);
    backend.queue_status(upload_id, JobStatus::DqRunning);
    backend.queue_status(upload_id, JobStatus::DqRunning);
    backend.queue_status(upload_id, JobStatus::DqFixed);

    let mut config = fast_config();
    config.success_linger = Duration::from_secs(60); // keep Success visible
    let poller = poller(Arc::clone(&backend), config);
    let snapshots = poller.subscribe();

    let outcome = poller.run(upload_id, CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, PollOutcome::Completed(_)));

    let snapshot = snapshots.borrow().clone();
    assert_eq!(snapshot.state, PollState::Success);
    assert_eq!(snapshot.progress, 100);
    assert_eq!(backend.status_call_count(), 4);
}

/// Scenario: a job that never leaves QUEUED hits the attempt ceiling, ends
/// in a timeout-specific error, and issues no further polls.
#[tokio::test]
async fn never_terminal_job_times_out_and_stops_polling() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status(upload_id, JobStatus::Queued); // repeats once exhausted

    let mut config = fast_config();
    config.max_attempts = 5;
    let poller = poller(Arc::clone(&backend), config);
    let snapshots = poller.subscribe();

    let result = poller.run(upload_id, CancellationToken::new()).await;
    match result {
        Err(WizardError::Timeout { attempts, .. }) => assert_eq!(attempts, 5),
        other => panic!("expected timeout, got {:?}", other.map(|_| ())),
    }
    assert_eq!(snapshots.borrow().state, PollState::Error);
    assert_eq!(backend.status_call_count(), 5);

    // Terminal state reached: no poll loop is left running
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(backend.status_call_count(), 5);
}

#[tokio::test]
async fn transient_errors_retry_within_budget() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status(upload_id, JobStatus::Queued);
    backend.queue_status_network_error("connection reset");
    backend.queue_status_network_error("connection reset");
    backend.queue_status(upload_id, JobStatus::DqFixed);

    let poller = poller(Arc::clone(&backend), fast_config());
    let outcome = poller.run(upload_id, CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, PollOutcome::Completed(_)));
    assert_eq!(backend.status_call_count(), 4);
}

#[tokio::test]
async fn exhausted_retry_budget_surfaces_the_network_error() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    for _ in 0..5 {
        backend.queue_status_network_error("connection reset");
    }

    let poller = poller(Arc::clone(&backend), fast_config());
    let result = poller.run(upload_id, CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(WizardError::Backend(dqp_common::Error::Network(_)))
    ));
    // 3 retried failures plus the one that exhausted the budget
    assert_eq!(backend.status_call_count(), 4);
}

#[tokio::test]
async fn api_errors_are_not_retried() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status(upload_id, JobStatus::Queued);
    backend.queue_status_api_error(500, "boom");

    let poller = poller(Arc::clone(&backend), fast_config());
    let snapshots = poller.subscribe();
    let result = poller.run(upload_id, CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(WizardError::Backend(dqp_common::Error::Api { .. }))
    ));
    assert_eq!(snapshots.borrow().state, PollState::Error);
    assert_eq!(backend.status_call_count(), 2);
}

#[tokio::test]
async fn terminal_failure_surfaces_the_backend_reason() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status_report(JobStatusReport {
        upload_id,
        status: JobStatus::DqFailed,
        total_rows: Some(1000),
        clean_rows: None,
        quarantined_rows: None,
        dq_score: None,
        error_message: Some("unparseable delimiter on line 7".to_string()),
        started_at: None,
        finished_at: None,
    });

    let poller = poller(Arc::clone(&backend), fast_config());
    let result = poller.run(upload_id, CancellationToken::new()).await;
    match result {
        Err(WizardError::JobFailed(reason)) => {
            assert!(reason.contains("unparseable delimiter"))
        }
        other => panic!("expected job failure, got {:?}", other.map(|_| ())),
    }
}

/// Long-running variant: the list endpoint already shows terminal success
/// while the direct status query still reports QUEUED.
#[tokio::test]
async fn list_fallback_detects_stale_status_endpoint() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status(upload_id, JobStatus::Queued); // repeats forever
    backend.set_file_records(vec![FileRecord {
        upload_id,
        file_name: "orders.csv".to_string(),
        status: JobStatus::DqFixed,
        uploaded_at: None,
    }]);

    let mut config = fast_config();
    config.list_fallback = true;
    config.fallback_after_polls = 3;
    let poller = poller(Arc::clone(&backend), config);

    let outcome = poller.run(upload_id, CancellationToken::new()).await.unwrap();
    match outcome {
        PollOutcome::Completed(report) => assert_eq!(report.status, JobStatus::DqFixed),
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(backend.status_call_count(), 3);
    assert_eq!(backend.list_call_count(), 1);
}

/// The fallback fires again as a last resort at the attempt ceiling.
#[tokio::test]
async fn list_fallback_last_resort_at_the_ceiling() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status(upload_id, JobStatus::DqRunning);

    let mut config = fast_config();
    config.list_fallback = true;
    config.fallback_after_polls = 2;
    config.max_attempts = 4;
    let poller = poller(Arc::clone(&backend), config);

    // Completion appears in the list only after the threshold check passed
    let check_backend = Arc::clone(&backend);
    let seeder = tokio::spawn(async move {
        while check_backend.list_call_count() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        check_backend.set_file_records(vec![FileRecord {
            upload_id,
            file_name: "orders.csv".to_string(),
            status: JobStatus::Completed,
            uploaded_at: None,
        }]);
    });

    let outcome = poller.run(upload_id, CancellationToken::new()).await.unwrap();
    seeder.await.unwrap();
    assert!(matches!(outcome, PollOutcome::Completed(_)));
    assert_eq!(backend.list_call_count(), 2);
    assert_eq!(backend.status_call_count(), 4);
}

#[tokio::test]
async fn cancellation_stops_the_local_loop_only() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status(upload_id, JobStatus::DqRunning); // repeats forever

    let mut config = fast_config();
    config.interval = Duration::from_millis(5);
    let poller = Arc::new(poller(Arc::clone(&backend), config));
    let cancel = CancellationToken::new();

    let run_poller = Arc::clone(&poller);
    let run_cancel = cancel.clone();
    let handle =
        tokio::spawn(async move { run_poller.run(upload_id, run_cancel).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    let outcome = handle.await.unwrap().unwrap();
    assert!(matches!(outcome, PollOutcome::Cancelled));

    let polls_at_cancel = backend.status_call_count();
    assert!(polls_at_cancel >= 1);
    tokio::time::sleep(Duration::from_millis(25)).await;
    // No cancellation is sent to the backend and no local polls continue;
    // the job itself is still running server-side and can be re-observed
    assert_eq!(backend.status_call_count(), polls_at_cancel);
    let report = backend.job_status(upload_id).await.unwrap();
    assert_eq!(report.status, JobStatus::DqRunning);
}

#[tokio::test]
async fn success_snapshot_flips_to_closed_after_the_linger_window() {
    let backend = Arc::new(MockBackend::new());
    let upload_id = Uuid::new_v4();
    backend.queue_status(upload_id, JobStatus::DqFixed);

    let poller = poller(Arc::clone(&backend), fast_config());
    let mut snapshots = poller.subscribe();

    poller.run(upload_id, CancellationToken::new()).await.unwrap();
    assert_eq!(snapshots.borrow().state, PollState::Success);

    // success_linger is 5ms in the fast config
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        tokio::time::timeout_at(deadline, snapshots.changed())
            .await
            .expect("Closed must arrive within the deadline")
            .unwrap();
        if snapshots.borrow().state == PollState::Closed {
            break;
        }
    }
}
