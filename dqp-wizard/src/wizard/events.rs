//! Wizard events broadcast to observers

use crate::models::session::WizardStep;
use dqp_common::api::JobStatus;
use serde::Serialize;
use uuid::Uuid;

/// Events emitted while a wizard session is driven
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardEvent {
    /// Session created or re-initialized
    SessionInitialized {
        upload_id: Uuid,
        file_name: String,
        column_count: usize,
    },

    /// Navigation between wizard steps
    StepChanged { from: WizardStep, to: WizardStep },

    /// Profiles fetched and merged into the cache
    ProfilesFetched {
        upload_id: Uuid,
        columns: Vec<String>,
    },

    /// Profile fetch failed; cached entries are untouched
    ProfileFetchFailed { upload_id: Uuid, error: String },

    /// A preset was selected ("none" clears the selection)
    PresetSelected { preset_id: Option<String> },

    /// Custom-rule suggestion requested
    SuggestionRequested { column: String },

    /// A candidate rule is held for approval
    SuggestionReady {
        column: String,
        rule_name: String,
        executable: bool,
    },

    /// The suggestion service returned an error
    SuggestionFailed { column: String, error: String },

    /// A pending suggestion was approved into the custom rules
    CustomRuleApproved { rule_id: String, column: String },

    /// A pending suggestion was discarded
    CustomRuleRejected { column: String },

    /// Submission refused locally before any network call
    SubmissionRejected { reason: String },

    /// The start-job call was accepted
    JobSubmitted { upload_id: Uuid },

    /// One status poll completed with a non-terminal status
    PollTick {
        upload_id: Uuid,
        status: JobStatus,
        progress: u8,
    },

    /// Polling finished with a successful terminal status
    JobSucceeded { upload_id: Uuid },

    /// Polling finished with a failure, timeout, or submission error
    JobFailed { upload_id: Uuid, error: String },

    /// The success display window elapsed
    PollClosed { upload_id: Uuid },
}
