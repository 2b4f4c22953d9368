//! Shared API request/response types
//!
//! Types exchanged with the external DQ pipeline backend: column profiles,
//! settings presets, processing requests, job status reports, and the
//! custom-rule suggestion contract. The backend owns all authoritative job
//! state; this client only submits requests and observes results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

// ========================================
// Column Profiles
// ========================================

/// Whether a suggested rule is pre-selected or requires user opt-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDecision {
    /// High-confidence check, pre-selected by default
    Auto,
    /// Check requiring explicit user opt-in
    Human,
}

/// One rule the profiler suggests for a column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedRule {
    /// Stable rule identifier (e.g. "R6", "NOT_NULL")
    pub rule_id: String,
    /// Selection default for this suggestion
    pub decision: RuleDecision,
    /// Which profiler heuristic produced the suggestion
    pub source: String,
}

/// Profiling result for a single column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    /// Best type guess (e.g. "integer", "date", "text")
    pub type_guess: String,
    /// Confidence in the type guess, 0.0 to 1.0
    pub type_confidence: f64,
    /// Fraction of sampled values that were null or empty
    pub null_rate: f64,
    /// Distinct values divided by sampled values
    pub unique_ratio: f64,
    /// Fraction of values parseable as numbers (numeric-ish columns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_parse_rate: Option<f64>,
    /// Fraction of values parseable as dates (date-ish columns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_parse_rate: Option<f64>,
    /// Shortest sampled value length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Longest sampled value length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Mean sampled value length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_length: Option<f64>,
    /// Rules the profiler suggests for this column, in suggestion order
    #[serde(default)]
    pub rules: Vec<SuggestedRule>,
}

/// Batch profiling request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileBatchRequest {
    /// Columns to profile
    pub columns: Vec<String>,
    /// Number of rows the profiler samples per column
    pub sample_size: usize,
}

/// Batch profiling response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileBatchResponse {
    /// Profiles keyed by column name; may be a subset of the request
    pub profiles: BTreeMap<String, ColumnProfile>,
}

/// Column discovery response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsResponse {
    /// Column names in file order
    pub columns: Vec<String>,
}

// ========================================
// Settings Presets
// ========================================

/// A named, reusable bundle of policy/lookup/threshold configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsPreset {
    /// Stable preset identifier
    pub preset_id: String,
    /// Display name
    pub preset_name: String,
    /// Raw configuration bundle; parsed client-side into a normalized shape
    pub config: Value,
    /// Whether this preset applies when the user picks none explicitly.
    /// Exactly one preset in a resolved list carries this flag.
    #[serde(default)]
    pub is_default: bool,
}

// ========================================
// Custom Rule Suggestions
// ========================================

/// Request body for a custom-rule suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    /// Column the rule should apply to
    pub column: String,
    /// Free-text description of the desired check
    pub prompt: String,
}

/// Candidate rule returned by the suggestion service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSuggestion {
    /// Identifier proposed by the service; a fallback is generated on
    /// approval when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Human-readable rule name
    pub rule_name: String,
    /// Rule template the pipeline executes
    pub template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Response body for a custom-rule suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
    /// The candidate, absent when the service could not produce one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<RuleSuggestion>,
    /// Whether the pipeline can actually execute the candidate.
    /// Non-executable candidates must not be approved.
    pub executable: bool,
    /// Service-side error message when no candidate was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A custom rule after user approval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRuleDefinition {
    /// Unique uppercase identifier, assigned at approval time
    pub rule_id: String,
    pub rule_name: String,
    pub template: String,
    /// Column the rule applies to
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

// ========================================
// Processing Requests
// ========================================

/// Start-job request compiled from one wizard session
///
/// Wire contract for `selected_columns`: the field is **omitted** to mean
/// "process all columns"; an enumerated list means exactly those columns.
/// The client never sends an empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingRequest {
    /// Columns to process; omitted means all columns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_columns: Option<Vec<String>>,

    /// Columns that must survive cleaning with no dropped values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_columns: Vec<String>,

    /// Rule ids disabled uniformly across all columns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_disabled_rules: Vec<String>,

    /// Per-column disabled rule ids; columns with no disabled ids are omitted
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub disable_rules: BTreeMap<String, Vec<String>>,

    /// Per-column full replacement of the suggested rule set; only columns
    /// with an active override appear
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_rules_override: BTreeMap<String, Vec<String>>,

    /// User-authored rules, always additive
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_rules: Vec<CustomRuleDefinition>,

    /// Selected settings preset, when any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<String>,

    /// Session-local edits layered over the preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset_overrides: Option<Value>,
}

/// Start-job acceptance response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAccepted {
    pub upload_id: Uuid,
    /// Initial job status, typically `QUEUED`
    pub status: JobStatus,
}

// ========================================
// Job Status
// ========================================

/// Pipeline job status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Accepted, waiting for a worker
    Queued,
    /// Handed to a worker, not yet running
    Dispatched,
    /// Input normalization in progress
    Normalizing,
    /// DQ rules executing
    DqRunning,
    /// Rules applied and fixes written
    DqFixed,
    /// Job finished, outputs published
    Completed,
    /// Rule execution failed
    DqFailed,
    /// Input rejected before rule execution
    Rejected,
    /// Any status this client version does not recognize; treated as
    /// non-terminal so newer backend states keep the loop going
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Statuses that end polling with a successful outcome
    pub fn is_terminal_success(self) -> bool {
        matches!(self, JobStatus::DqFixed | JobStatus::Completed)
    }

    /// Statuses that end polling with a failed outcome
    pub fn is_terminal_failure(self) -> bool {
        matches!(self, JobStatus::DqFailed | JobStatus::Rejected)
    }

    pub fn is_terminal(self) -> bool {
        self.is_terminal_success() || self.is_terminal_failure()
    }
}

/// Job status report from the direct status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub upload_id: Uuid,
    pub status: JobStatus,
    /// Rows in the input file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
    /// Rows in the clean output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clean_rows: Option<u64>,
    /// Rows excluded from the clean output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantined_rows: Option<u64>,
    /// Aggregate data-quality score, 0 to 100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dq_score: Option<f64>,
    /// Failure reason, when the backend supplies one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// One entry from the file-list endpoint
///
/// Used by the poller as a completion cross-check only; the list endpoint is
/// sometimes ahead of the direct status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub upload_id: Uuid,
    pub file_name: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&JobStatus::DqRunning).unwrap(),
            "\"DQ_RUNNING\""
        );
        assert_eq!(
            serde_json::from_str::<JobStatus>("\"DQ_FIXED\"").unwrap(),
            JobStatus::DqFixed
        );
    }

    #[test]
    fn unrecognized_status_maps_to_unknown() {
        let status: JobStatus = serde_json::from_str("\"SHINY_NEW_PHASE\"").unwrap();
        assert_eq!(status, JobStatus::Unknown);
        assert!(!status.is_terminal());
    }

    #[test]
    fn terminal_classification() {
        assert!(JobStatus::DqFixed.is_terminal_success());
        assert!(JobStatus::Completed.is_terminal_success());
        assert!(JobStatus::DqFailed.is_terminal_failure());
        assert!(JobStatus::Rejected.is_terminal_failure());
        for status in [
            JobStatus::Queued,
            JobStatus::Dispatched,
            JobStatus::Normalizing,
            JobStatus::DqRunning,
        ] {
            assert!(!status.is_terminal(), "{:?} must keep the loop going", status);
        }
    }

    #[test]
    fn processing_request_omits_empty_fields() {
        let request = ProcessingRequest::default();
        let json = serde_json::to_value(&request).unwrap();
        let obj = json.as_object().unwrap();
        // "All columns" is represented by omission, not an empty list
        assert!(!obj.contains_key("selected_columns"));
        assert!(!obj.contains_key("disable_rules"));
        assert!(!obj.contains_key("custom_rules"));
    }
}
