//! Error types for dqp-wizard
//!
//! Failure classes are kept distinct so the host can render them
//! differently: local validation never reaches the network, fetch errors are
//! step-scoped and manually retryable, submission errors return the machine
//! to idle, and a timeout is distinguishable from a job the backend failed.

use std::time::Duration;
use thiserror::Error;

/// Wizard error type
#[derive(Debug, Error)]
pub enum WizardError {
    /// Local validation failure; no network call was attempted
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Column profiling fetch failed; cached profiles are preserved
    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Preset store call failed
    #[error("Preset store error: {0}")]
    PresetStore(String),

    /// Custom-rule suggestion call failed
    #[error("Rule suggestion failed: {0}")]
    Suggestion(String),

    /// Start-job call failed; retryable by returning to idle
    #[error("Job submission failed: {0}")]
    Submission(String),

    /// The backend reported a terminal failure status for the job
    #[error("Processing failed: {0}")]
    JobFailed(String),

    /// Polling exceeded its wall-clock or attempt ceiling
    #[error("Processing did not finish within {elapsed:?} ({attempts} polls)")]
    Timeout { elapsed: Duration, attempts: u32 },

    /// A second submission was attempted while one is in flight
    #[error("A processing job is already being tracked for this session")]
    AlreadyProcessing,

    /// Underlying backend transport or API error
    #[error(transparent)]
    Backend(#[from] dqp_common::Error),
}

/// Result type for wizard operations
pub type WizardResult<T> = Result<T, WizardError>;
