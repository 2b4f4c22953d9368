//! Backend seam for the DQ pipeline
//!
//! Everything the wizard consumes from the outside world goes through the
//! [`DqBackend`] trait: column discovery, profiling, the preset store, job
//! submission, job status, the file list, and custom-rule suggestions. The
//! production implementation is [`crate::services::HttpBackend`]; tests
//! inject [`MockBackend`] with scripted responses.

use async_trait::async_trait;
use dqp_common::api::{
    ColumnProfile, FileRecord, JobStatusReport, ProcessingRequest, SettingsPreset,
    SubmitAccepted, SuggestionRequest, SuggestionResponse,
};
use dqp_common::{Error, Result};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Trait over every external interface the wizard consumes.
#[async_trait]
pub trait DqBackend: Send + Sync {
    /// Ordered column names for an upload
    async fn discover_columns(&self, upload_id: Uuid) -> Result<Vec<String>>;

    /// Profile a subset of columns; the response may cover fewer columns
    /// than requested
    async fn profile_columns(
        &self,
        upload_id: Uuid,
        columns: &[String],
        sample_size: usize,
    ) -> Result<BTreeMap<String, ColumnProfile>>;

    /// All presets the store knows about
    async fn list_presets(&self) -> Result<Vec<SettingsPreset>>;

    async fn get_preset(&self, preset_id: &str) -> Result<SettingsPreset>;

    async fn create_preset(&self, preset: &SettingsPreset) -> Result<SettingsPreset>;

    async fn update_preset(&self, preset: &SettingsPreset) -> Result<SettingsPreset>;

    async fn delete_preset(&self, preset_id: &str) -> Result<()>;

    /// Start a processing job for an upload
    async fn submit_job(
        &self,
        upload_id: Uuid,
        request: &ProcessingRequest,
    ) -> Result<SubmitAccepted>;

    /// Direct job status query
    async fn job_status(&self, upload_id: Uuid) -> Result<JobStatusReport>;

    /// File list; used by the poller as a completion cross-check only
    async fn list_files(&self) -> Result<Vec<FileRecord>>;

    /// Request a custom-rule candidate for a column
    async fn suggest_rule(
        &self,
        upload_id: Uuid,
        request: &SuggestionRequest,
    ) -> Result<SuggestionResponse>;
}

// ============================================================================
// Mock backend for tests
// ============================================================================

use dqp_common::api::JobStatus;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Scripted status entry held by the mock
enum ScriptedStatus {
    Report(JobStatusReport),
    NetworkError(String),
    ApiError(u16, String),
}

/// Scripted backend for tests.
///
/// Status reports are consumed in order; once the script is exhausted the
/// last report repeats, which makes "job never finishes" scenarios a
/// one-liner. Call counters allow asserting that no further requests were
/// issued after a terminal state.
#[derive(Default)]
pub struct MockBackend {
    columns: Mutex<Vec<String>>,
    profiles: Mutex<BTreeMap<String, ColumnProfile>>,
    fail_next_profile_fetch: Mutex<Option<String>>,
    presets: Mutex<Vec<SettingsPreset>>,
    suggestions: Mutex<VecDeque<SuggestionResponse>>,
    status_script: Mutex<VecDeque<ScriptedStatus>>,
    last_status: Mutex<Option<JobStatusReport>>,
    file_records: Mutex<Vec<FileRecord>>,
    submit_failure: Mutex<Option<String>>,
    last_submitted: Mutex<Option<ProcessingRequest>>,
    profile_calls: AtomicUsize,
    status_calls: AtomicUsize,
    submit_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_columns(&self, columns: &[&str]) {
        *self.columns.lock().unwrap() = columns.iter().map(|s| s.to_string()).collect();
    }

    pub fn insert_profile(&self, column: &str, profile: ColumnProfile) {
        self.profiles
            .lock()
            .unwrap()
            .insert(column.to_string(), profile);
    }

    /// Make the next profile fetch fail with a network error
    pub fn fail_next_profile_fetch(&self, message: &str) {
        *self.fail_next_profile_fetch.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_presets(&self, presets: Vec<SettingsPreset>) {
        *self.presets.lock().unwrap() = presets;
    }

    pub fn queue_suggestion(&self, response: SuggestionResponse) {
        self.suggestions.lock().unwrap().push_back(response);
    }

    /// Queue a status report with the given status for an upload
    pub fn queue_status(&self, upload_id: Uuid, status: JobStatus) {
        self.queue_status_report(JobStatusReport {
            upload_id,
            status,
            total_rows: Some(1000),
            clean_rows: None,
            quarantined_rows: None,
            dq_score: None,
            error_message: None,
            started_at: None,
            finished_at: None,
        });
    }

    pub fn queue_status_report(&self, report: JobStatusReport) {
        self.status_script
            .lock()
            .unwrap()
            .push_back(ScriptedStatus::Report(report));
    }

    /// Queue a transient (network-class) status failure
    pub fn queue_status_network_error(&self, message: &str) {
        self.status_script
            .lock()
            .unwrap()
            .push_back(ScriptedStatus::NetworkError(message.to_string()));
    }

    /// Queue an authoritative (non-retryable) status failure
    pub fn queue_status_api_error(&self, status: u16, message: &str) {
        self.status_script
            .lock()
            .unwrap()
            .push_back(ScriptedStatus::ApiError(status, message.to_string()));
    }

    pub fn set_file_records(&self, records: Vec<FileRecord>) {
        *self.file_records.lock().unwrap() = records;
    }

    /// Make the next submit call fail
    pub fn fail_submit(&self, message: &str) {
        *self.submit_failure.lock().unwrap() = Some(message.to_string());
    }

    /// The most recent request passed to `submit_job`
    pub fn last_submitted(&self) -> Option<ProcessingRequest> {
        self.last_submitted.lock().unwrap().clone()
    }

    pub fn profile_call_count(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn status_call_count(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submit_call_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DqBackend for MockBackend {
    async fn discover_columns(&self, _upload_id: Uuid) -> Result<Vec<String>> {
        Ok(self.columns.lock().unwrap().clone())
    }

    async fn profile_columns(
        &self,
        _upload_id: Uuid,
        columns: &[String],
        _sample_size: usize,
    ) -> Result<BTreeMap<String, ColumnProfile>> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next_profile_fetch.lock().unwrap().take() {
            return Err(Error::Network(message));
        }
        let known = self.profiles.lock().unwrap();
        Ok(columns
            .iter()
            .filter_map(|c| known.get(c).map(|p| (c.clone(), p.clone())))
            .collect())
    }

    async fn list_presets(&self) -> Result<Vec<SettingsPreset>> {
        Ok(self.presets.lock().unwrap().clone())
    }

    async fn get_preset(&self, preset_id: &str) -> Result<SettingsPreset> {
        self.presets
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.preset_id == preset_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("preset {}", preset_id)))
    }

    async fn create_preset(&self, preset: &SettingsPreset) -> Result<SettingsPreset> {
        self.presets.lock().unwrap().push(preset.clone());
        Ok(preset.clone())
    }

    async fn update_preset(&self, preset: &SettingsPreset) -> Result<SettingsPreset> {
        let mut presets = self.presets.lock().unwrap();
        match presets.iter_mut().find(|p| p.preset_id == preset.preset_id) {
            Some(existing) => {
                *existing = preset.clone();
                Ok(preset.clone())
            }
            None => Err(Error::NotFound(format!("preset {}", preset.preset_id))),
        }
    }

    async fn delete_preset(&self, preset_id: &str) -> Result<()> {
        self.presets
            .lock()
            .unwrap()
            .retain(|p| p.preset_id != preset_id);
        Ok(())
    }

    async fn submit_job(
        &self,
        upload_id: Uuid,
        request: &ProcessingRequest,
    ) -> Result<SubmitAccepted> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.submit_failure.lock().unwrap().take() {
            return Err(Error::Api {
                status: 500,
                message,
            });
        }
        *self.last_submitted.lock().unwrap() = Some(request.clone());
        Ok(SubmitAccepted {
            upload_id,
            status: JobStatus::Queued,
        })
    }

    async fn job_status(&self, upload_id: Uuid) -> Result<JobStatusReport> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.status_script.lock().unwrap().pop_front();
        match next {
            Some(ScriptedStatus::Report(report)) => {
                *self.last_status.lock().unwrap() = Some(report.clone());
                Ok(report)
            }
            Some(ScriptedStatus::NetworkError(message)) => Err(Error::Network(message)),
            Some(ScriptedStatus::ApiError(status, message)) => {
                Err(Error::Api { status, message })
            }
            // Script exhausted: repeat the last report
            None => self
                .last_status
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| Error::NotFound(format!("job {}", upload_id))),
        }
    }

    async fn list_files(&self) -> Result<Vec<FileRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.file_records.lock().unwrap().clone())
    }

    async fn suggest_rule(
        &self,
        _upload_id: Uuid,
        request: &SuggestionRequest,
    ) -> Result<SuggestionResponse> {
        match self.suggestions.lock().unwrap().pop_front() {
            Some(response) => Ok(response),
            None => Ok(SuggestionResponse {
                suggestion: Some(dqp_common::api::RuleSuggestion {
                    rule_id: None,
                    rule_name: format!("check {}", request.column),
                    template: "expression".to_string(),
                    severity: Some("warning".to_string()),
                    confidence: Some(0.8),
                    explanation: None,
                    code: None,
                }),
                executable: true,
                error: None,
            }),
        }
    }
}
