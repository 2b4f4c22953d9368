//! Job status polling state machine
//!
//! Tracks a submitted job to a terminal outcome:
//! `Idle → Processing → {Success | Error}`, with `Error → Idle` on host
//! retry and `Success → Closed` after a short display window.
//!
//! Non-terminal statuses keep the loop going and advance a synthetic,
//! monotone progress value capped below 100. Transient network errors are
//! retried with linearly increasing backoff; authoritative errors and
//! terminal failure statuses end the loop immediately. Cancellation stops
//! the local loop only, the job itself keeps running server-side.

use crate::error::{WizardError, WizardResult};
use crate::services::backend::DqBackend;
use crate::wizard::events::WizardEvent;
use dqp_common::api::{JobStatus, JobStatusReport};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Synthetic progress never reaches 100 before a terminal status
const PRE_TERMINAL_PROGRESS_CAP: u8 = 95;

/// Poller state visible to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No job being tracked
    Idle,
    /// Polling an in-flight job
    Processing,
    /// Terminal success observed
    Success,
    /// Terminal failure, submission error, or timeout
    Error,
    /// Success display window elapsed
    Closed,
}

/// Snapshot published through the watch channel after every transition
#[derive(Debug, Clone)]
pub struct PollSnapshot {
    pub state: PollState,
    /// Last status the backend reported, when any
    pub status: Option<JobStatus>,
    /// Synthetic progress, 0 to 100, monotone within one run
    pub progress: u8,
    /// Human-readable description of the current situation
    pub message: String,
}

impl PollSnapshot {
    fn idle() -> Self {
        Self {
            state: PollState::Idle,
            status: None,
            progress: 0,
            message: "Idle".to_string(),
        }
    }
}

/// Tuning for one polling variant
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Pause between status polls
    pub interval: Duration,
    /// Wall-clock ceiling; breaching it forces a timeout error
    pub timeout: Duration,
    /// Poll-count ceiling; breaching it forces a timeout error
    pub max_attempts: u32,
    /// Consecutive transient failures tolerated before giving up
    pub retry_budget: u32,
    /// Base backoff delay; the n-th retry waits n times this
    pub retry_backoff: Duration,
    /// Cross-check the file-list endpoint for completion the direct status
    /// query has not caught up to yet
    pub list_fallback: bool,
    /// Non-terminal polls before the first cross-check
    pub fallback_after_polls: u32,
    /// How long a success snapshot stays up before Closed
    pub success_linger: Duration,
}

impl PollerConfig {
    /// Short-interval variant for interactive waits
    pub fn interactive() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(5 * 60),
            max_attempts: 150,
            retry_budget: 3,
            retry_backoff: Duration::from_secs(1),
            list_fallback: false,
            fallback_after_polls: 0,
            success_linger: Duration::from_secs(3),
        }
    }

    /// Long-interval variant for jobs expected to run for many minutes
    pub fn smart() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(30 * 60),
            max_attempts: 180,
            retry_budget: 3,
            retry_backoff: Duration::from_secs(2),
            list_fallback: true,
            fallback_after_polls: 18,
            success_linger: Duration::from_secs(5),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

/// How one polling run ended
#[derive(Debug)]
pub enum PollOutcome {
    /// A terminal-success status was observed
    Completed(JobStatusReport),
    /// The host stopped observing; the job continues server-side
    Cancelled,
}

/// Drives one job at a time to a terminal outcome
pub struct StatusPoller {
    backend: Arc<dyn DqBackend>,
    config: PollerConfig,
    snapshot_tx: Arc<watch::Sender<PollSnapshot>>,
    snapshot_rx: watch::Receiver<PollSnapshot>,
    event_tx: broadcast::Sender<WizardEvent>,
}

impl StatusPoller {
    pub fn new(
        backend: Arc<dyn DqBackend>,
        config: PollerConfig,
        event_tx: broadcast::Sender<WizardEvent>,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(PollSnapshot::idle());
        Self {
            backend,
            config,
            snapshot_tx: Arc::new(snapshot_tx),
            snapshot_rx,
            event_tx,
        }
    }

    /// Watch receiver for snapshot observers
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Current state
    pub fn state(&self) -> PollState {
        self.snapshot_rx.borrow().state
    }

    /// Return to idle so a failed submission can be retried
    pub fn reset_to_idle(&self) {
        self.publish(PollState::Idle, None, 0, "Idle");
    }

    /// Record a submission failure without having polled
    pub fn mark_submission_failed(&self, message: &str) {
        self.publish(PollState::Error, None, 0, message);
    }

    /// Poll the job to a terminal outcome.
    ///
    /// Returns the final report on success; a terminal failure, timeout, or
    /// authoritative backend error surfaces as `Err` with the snapshot left
    /// in the `Error` state.
    pub async fn run(
        &self,
        upload_id: Uuid,
        cancel: CancellationToken,
    ) -> WizardResult<PollOutcome> {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let mut retries: u32 = 0;
        let mut progress: u8 = 0;

        self.publish(
            PollState::Processing,
            None,
            0,
            "Job submitted, waiting for first status...",
        );

        loop {
            if attempts >= self.config.max_attempts || started.elapsed() >= self.config.timeout {
                // Last resort: the list endpoint may already show completion
                if self.config.list_fallback {
                    if let Some(report) = self.completed_per_file_list(upload_id).await {
                        return Ok(self.finish_success(upload_id, report));
                    }
                }
                return Err(self.fail(
                    upload_id,
                    None,
                    progress,
                    WizardError::Timeout {
                        elapsed: started.elapsed(),
                        attempts,
                    },
                ));
            }

            match self.backend.job_status(upload_id).await {
                Ok(report) => {
                    retries = 0;
                    attempts += 1;
                    let status = report.status;

                    if status.is_terminal_success() {
                        return Ok(self.finish_success(upload_id, report));
                    }
                    if status.is_terminal_failure() {
                        let reason = report.error_message.clone().unwrap_or_else(|| {
                            format!("job ended with status {:?}", status)
                        });
                        return Err(self.fail(
                            upload_id,
                            Some(status),
                            progress,
                            WizardError::JobFailed(reason),
                        ));
                    }

                    progress = next_progress(progress, status);
                    self.publish(
                        PollState::Processing,
                        Some(status),
                        progress,
                        status_message(status),
                    );
                    let _ = self.event_tx.send(WizardEvent::PollTick {
                        upload_id,
                        status,
                        progress,
                    });
                    tracing::debug!(
                        upload_id = %upload_id,
                        status = ?status,
                        progress = progress,
                        attempt = attempts,
                        "Job still in flight"
                    );

                    if self.config.list_fallback && attempts == self.config.fallback_after_polls
                    {
                        if let Some(report) = self.completed_per_file_list(upload_id).await {
                            return Ok(self.finish_success(upload_id, report));
                        }
                    }
                }
                Err(e) if e.is_transient() && retries < self.config.retry_budget => {
                    retries += 1;
                    let delay = self.config.retry_backoff * retries;
                    tracing::warn!(
                        upload_id = %upload_id,
                        error = %e,
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Transient polling error, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(self.cancelled(upload_id)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
                Err(e) => {
                    return Err(self.fail(upload_id, None, progress, WizardError::Backend(e)));
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(self.cancelled(upload_id)),
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
    }

    /// Check whether the file list already shows terminal success for this
    /// upload. Best effort; list errors only log.
    async fn completed_per_file_list(&self, upload_id: Uuid) -> Option<JobStatusReport> {
        match self.backend.list_files().await {
            Ok(records) => records
                .into_iter()
                .find(|r| r.upload_id == upload_id && r.status.is_terminal_success())
                .map(|r| {
                    tracing::info!(
                        upload_id = %upload_id,
                        status = ?r.status,
                        "File list shows completion ahead of the status endpoint"
                    );
                    JobStatusReport {
                        upload_id,
                        status: r.status,
                        total_rows: None,
                        clean_rows: None,
                        quarantined_rows: None,
                        dq_score: None,
                        error_message: None,
                        started_at: None,
                        finished_at: r.uploaded_at,
                    }
                }),
            Err(e) => {
                tracing::debug!(upload_id = %upload_id, error = %e, "File list cross-check failed");
                None
            }
        }
    }

    fn finish_success(&self, upload_id: Uuid, report: JobStatusReport) -> PollOutcome {
        tracing::info!(
            upload_id = %upload_id,
            status = ?report.status,
            dq_score = ?report.dq_score,
            "Processing completed"
        );
        self.publish(
            PollState::Success,
            Some(report.status),
            100,
            "Processing completed",
        );
        let _ = self.event_tx.send(WizardEvent::JobSucceeded { upload_id });

        // Flip to Closed once the success display window elapses
        let snapshot_tx = Arc::clone(&self.snapshot_tx);
        let event_tx = self.event_tx.clone();
        let linger = self.config.success_linger;
        let status = report.status;
        tokio::spawn(async move {
            tokio::time::sleep(linger).await;
            let _ = snapshot_tx.send(PollSnapshot {
                state: PollState::Closed,
                status: Some(status),
                progress: 100,
                message: "Closed".to_string(),
            });
            let _ = event_tx.send(WizardEvent::PollClosed { upload_id });
        });

        PollOutcome::Completed(report)
    }

    fn cancelled(&self, upload_id: Uuid) -> PollOutcome {
        tracing::info!(
            upload_id = %upload_id,
            "Polling stopped by host; the job continues server-side"
        );
        // Back to idle so the job can be re-observed or re-submitted later
        self.publish(
            PollState::Idle,
            None,
            0,
            "Observation stopped; the job continues server-side",
        );
        PollOutcome::Cancelled
    }

    fn fail(
        &self,
        upload_id: Uuid,
        status: Option<JobStatus>,
        progress: u8,
        error: WizardError,
    ) -> WizardError {
        tracing::warn!(upload_id = %upload_id, error = %error, "Polling ended in error");
        self.publish(PollState::Error, status, progress, &error.to_string());
        let _ = self.event_tx.send(WizardEvent::JobFailed {
            upload_id,
            error: error.to_string(),
        });
        error
    }

    fn publish(&self, state: PollState, status: Option<JobStatus>, progress: u8, message: &str) {
        let _ = self.snapshot_tx.send(PollSnapshot {
            state,
            status,
            progress,
            message: message.to_string(),
        });
    }
}

/// Advance the synthetic progress for a non-terminal status.
///
/// Never decreases, never exceeds the pre-terminal cap.
fn next_progress(current: u8, status: JobStatus) -> u8 {
    let floor = match status {
        JobStatus::Queued => 10,
        JobStatus::Dispatched => 25,
        JobStatus::Normalizing => 40,
        JobStatus::DqRunning => 65,
        _ => 50,
    };
    current
        .saturating_add(1)
        .max(floor)
        .min(PRE_TERMINAL_PROGRESS_CAP)
}

/// Display message for a non-terminal status
fn status_message(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "Waiting in the processing queue...",
        JobStatus::Dispatched => "Dispatched to a worker...",
        JobStatus::Normalizing => "Normalizing input data...",
        JobStatus::DqRunning => "Running data-quality rules...",
        _ => "Processing...",
    }
}
