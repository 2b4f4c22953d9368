//! Session-level wizard orchestration
//!
//! The controller owns one [`WizardSession`] and every stage operation on
//! it: column selection, profile fetching, preset resolution, rule
//! configuration, the custom-rule suggestion workflow, and the final
//! submit-then-poll handoff. The hosting UI is injected only through the
//! [`DqBackend`] seam and observes through the event broadcast and the
//! poller's watch snapshot.

use crate::error::{WizardError, WizardResult};
use crate::models::preset::{resolve_presets, PresetConfig};
use crate::models::rules::{assign_rule_id, compile_column_rules, RuleCategory, RuleState, SuggestionState};
use crate::models::session::{WizardSession, WizardStep};
use crate::services::backend::DqBackend;
use crate::wizard::events::WizardEvent;
use crate::wizard::poller::{PollOutcome, PollSnapshot, PollState, PollerConfig, StatusPoller};
use crate::wizard::submitter::compile_request;
use dqp_common::api::{CustomRuleDefinition, SettingsPreset, SuggestionRequest};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Broadcast capacity for wizard events
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Orchestrates one wizard session against an injected backend
pub struct WizardController {
    backend: Arc<dyn DqBackend>,
    session: WizardSession,
    /// Presets known from the last successful store fetch
    presets: Vec<SettingsPreset>,
    event_tx: broadcast::Sender<WizardEvent>,
    poller: StatusPoller,
    cancel: CancellationToken,
}

impl WizardController {
    /// Open a wizard for an upload whose columns are already known
    pub fn open(
        backend: Arc<dyn DqBackend>,
        poller_config: PollerConfig,
        upload_id: Uuid,
        file_name: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let poller = StatusPoller::new(Arc::clone(&backend), poller_config, event_tx.clone());
        let session = WizardSession::new(upload_id, file_name.into(), columns);

        let controller = Self {
            backend,
            session,
            presets: Vec::new(),
            event_tx,
            poller,
            cancel: CancellationToken::new(),
        };
        controller.emit_initialized();
        controller
    }

    /// Open a wizard, discovering columns from the backend
    pub async fn open_discovered(
        backend: Arc<dyn DqBackend>,
        poller_config: PollerConfig,
        upload_id: Uuid,
        file_name: impl Into<String>,
    ) -> WizardResult<Self> {
        let columns = backend.discover_columns(upload_id).await?;
        Ok(Self::open(backend, poller_config, upload_id, file_name, columns))
    }

    /// Re-initialize for an upload.
    ///
    /// Same upload id: the step survives and the selection is intersected
    /// with the refreshed column list. Different upload id: full reset.
    pub fn initialize_with_file(
        &mut self,
        upload_id: Uuid,
        file_name: impl Into<String>,
        columns: Vec<String>,
    ) {
        self.session.reinitialize(upload_id, file_name.into(), columns);
        self.emit_initialized();
    }

    fn emit_initialized(&self) {
        tracing::info!(
            upload_id = %self.session.upload_id,
            file_name = %self.session.file_name,
            columns = self.session.all_columns.len(),
            step = ?self.session.step,
            "Wizard session initialized"
        );
        let _ = self.event_tx.send(WizardEvent::SessionInitialized {
            upload_id: self.session.upload_id,
            file_name: self.session.file_name.clone(),
            column_count: self.session.all_columns.len(),
        });
    }

    // ========================================
    // Host surface
    // ========================================

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut WizardSession {
        &mut self.session
    }

    pub fn step(&self) -> WizardStep {
        self.session.step
    }

    pub fn can_proceed(&self) -> bool {
        self.session.can_proceed()
    }

    /// Event stream for observers; any number may subscribe
    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.event_tx.subscribe()
    }

    /// Poller snapshot channel for observers
    pub fn poll_snapshots(&self) -> watch::Receiver<PollSnapshot> {
        self.poller.subscribe()
    }

    pub fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    /// Token the host can clone before `submit` to stop observation later.
    /// Cancelling stops the local loop only; the job keeps running.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop observing the in-flight job, if any
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn next_step(&mut self) -> WizardStep {
        let from = self.session.step;
        let to = self.session.next_step();
        if from != to {
            let _ = self.event_tx.send(WizardEvent::StepChanged { from, to });
        }
        to
    }

    pub fn prev_step(&mut self) -> WizardStep {
        let from = self.session.step;
        let to = self.session.prev_step();
        if from != to {
            let _ = self.event_tx.send(WizardEvent::StepChanged { from, to });
        }
        to
    }

    // ========================================
    // Column selection
    // ========================================

    pub fn select_column(&mut self, column: &str) {
        self.session.select_column(column);
    }

    pub fn deselect_column(&mut self, column: &str) {
        self.session.deselect_column(column);
    }

    pub fn set_selected_columns(&mut self, columns: &[String]) {
        self.session.set_selected_columns(columns);
    }

    pub fn select_all_columns(&mut self) {
        let all = self.session.all_columns.clone();
        self.session.set_selected_columns(&all);
    }

    pub fn set_required_column(&mut self, column: &str, required: bool) {
        self.session.set_required_column(column, required);
    }

    // ========================================
    // Column profiles
    // ========================================

    /// Fetch profiles for selected columns that are not cached yet.
    ///
    /// Responses merge by column-name key, so partial or out-of-order
    /// results never corrupt other entries. A failure sets the step-scoped
    /// error and preserves the cache; there is no automatic retry.
    pub async fn fetch_profiles(&mut self, sample_size: usize) -> WizardResult<()> {
        let missing: Vec<String> = self
            .session
            .selected_columns
            .iter()
            .filter(|c| !self.session.column_profiles.contains_key(*c))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        self.fetch_and_merge(&missing, sample_size).await
    }

    /// Profile one column, used when it joins the selection late
    pub async fn profile_single(&mut self, column: &str, sample_size: usize) -> WizardResult<()> {
        if !self.session.selected_columns.contains(column) {
            return Err(WizardError::Validation(format!(
                "Column {:?} is not selected",
                column
            )));
        }
        if self.session.column_profiles.contains_key(column) {
            return Ok(());
        }
        self.fetch_and_merge(&[column.to_string()], sample_size).await
    }

    async fn fetch_and_merge(&mut self, columns: &[String], sample_size: usize) -> WizardResult<()> {
        self.session.profiling_error = None;
        let upload_id = self.session.upload_id;

        match self
            .backend
            .profile_columns(upload_id, columns, sample_size)
            .await
        {
            Ok(profiles) => {
                let fetched: Vec<String> = profiles.keys().cloned().collect();
                for (column, profile) in profiles {
                    // Seed rule states once; re-profiling must not clobber
                    // toggles the user already made
                    if !self.session.column_rules.contains_key(&column) {
                        let states: Vec<RuleState> = profile
                            .rules
                            .iter()
                            .map(|s| RuleState::from_suggested(s, Some(column.clone())))
                            .collect();
                        self.session.column_rules.insert(column.clone(), states);
                    }
                    self.session.column_profiles.insert(column, profile);
                }
                tracing::debug!(
                    upload_id = %upload_id,
                    fetched = fetched.len(),
                    "Column profiles merged"
                );
                let _ = self.event_tx.send(WizardEvent::ProfilesFetched {
                    upload_id,
                    columns: fetched,
                });
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(upload_id = %upload_id, error = %message, "Profile fetch failed");
                self.session.profiling_error = Some(message.clone());
                let _ = self.event_tx.send(WizardEvent::ProfileFetchFailed {
                    upload_id,
                    error: message.clone(),
                });
                Err(WizardError::ProfileFetch(message))
            }
        }
    }

    // ========================================
    // Rule configuration
    // ========================================

    /// Set the global selection flag for a rule id, creating the global
    /// entry when absent. Idempotent.
    pub fn set_global_rule_selected(&mut self, rule_id: &str, selected: bool) {
        match self
            .session
            .global_rules
            .iter_mut()
            .find(|r| r.rule_id == rule_id)
        {
            Some(rule) => rule.selected = selected,
            None => self.session.global_rules.push(RuleState {
                rule_id: rule_id.to_string(),
                category: RuleCategory::Auto,
                selected,
                column: None,
            }),
        }
    }

    /// Set the selection flag for a suggested rule on one column.
    /// Unknown rule ids are ignored. Idempotent.
    pub fn set_column_rule_selected(&mut self, column: &str, rule_id: &str, selected: bool) {
        if let Some(states) = self.session.column_rules.get_mut(column) {
            if let Some(rule) = states.iter_mut().find(|r| r.rule_id == rule_id) {
                rule.selected = selected;
            }
        }
    }

    /// Replace the suggested rule set for a column outright
    pub fn set_column_override(&mut self, column: &str, rule_ids: Vec<String>) {
        if self.session.selected_columns.contains(column) {
            self.session
                .column_overrides
                .insert(column.to_string(), rule_ids);
        }
    }

    pub fn clear_column_override(&mut self, column: &str) {
        self.session.column_overrides.remove(column);
    }

    /// Remove an approved custom rule by id
    pub fn remove_custom_rule(&mut self, rule_id: &str) {
        self.session.custom_rules.retain(|r| r.rule_id != rule_id);
    }

    /// The rule-id set the pipeline will execute for one column
    pub fn effective_rules(&self, column: &str) -> BTreeSet<String> {
        compile_column_rules(
            column,
            &self.session.column_rules,
            &self.session.global_rules,
            &self.session.column_overrides,
            &self.session.custom_rules,
        )
    }

    // ========================================
    // Custom rule suggestion workflow
    // ========================================

    /// Request a candidate rule for a column.
    ///
    /// Validation failures never reach the network. The candidate is held
    /// as a pending suggestion; it joins `custom_rules` only on approval.
    pub async fn request_suggestion(&mut self, column: &str, prompt: &str) -> WizardResult<()> {
        if column.trim().is_empty() || !self.session.selected_columns.contains(column) {
            return Err(WizardError::Validation(format!(
                "Custom rules need a selected column; {:?} is not selected",
                column
            )));
        }
        if prompt.trim().is_empty() {
            return Err(WizardError::Validation(
                "Describe the rule you want before requesting a suggestion".to_string(),
            ));
        }

        self.session.pending_suggestion = SuggestionState::Suggesting {
            column: column.to_string(),
        };
        let _ = self.event_tx.send(WizardEvent::SuggestionRequested {
            column: column.to_string(),
        });

        let request = SuggestionRequest {
            column: column.to_string(),
            prompt: prompt.to_string(),
        };
        match self
            .backend
            .suggest_rule(self.session.upload_id, &request)
            .await
        {
            Ok(response) => match response.suggestion {
                Some(suggestion) => {
                    let _ = self.event_tx.send(WizardEvent::SuggestionReady {
                        column: column.to_string(),
                        rule_name: suggestion.rule_name.clone(),
                        executable: response.executable,
                    });
                    self.session.pending_suggestion = SuggestionState::Suggested {
                        column: column.to_string(),
                        suggestion,
                        executable: response.executable,
                    };
                    Ok(())
                }
                None => {
                    let error = response
                        .error
                        .unwrap_or_else(|| "No candidate produced".to_string());
                    self.fail_suggestion(column, error)
                }
            },
            Err(e) => self.fail_suggestion(column, e.to_string()),
        }
    }

    fn fail_suggestion(&mut self, column: &str, error: String) -> WizardResult<()> {
        tracing::warn!(column = %column, error = %error, "Rule suggestion failed");
        self.session.pending_suggestion = SuggestionState::Failed {
            column: column.to_string(),
            error: error.clone(),
        };
        let _ = self.event_tx.send(WizardEvent::SuggestionFailed {
            column: column.to_string(),
            error: error.clone(),
        });
        Err(WizardError::Suggestion(error))
    }

    /// Approve the pending suggestion into the custom rules.
    ///
    /// Refused as a no-op when there is no pending candidate or the
    /// candidate is not executable. Returns the assigned rule id when a
    /// rule was added.
    pub fn approve_custom_rule(&mut self) -> Option<String> {
        let (column, suggestion, executable) = match &self.session.pending_suggestion {
            SuggestionState::Suggested {
                column,
                suggestion,
                executable,
            } => (column.clone(), suggestion.clone(), *executable),
            _ => return None,
        };
        if !executable {
            tracing::debug!(column = %column, "Refusing to approve a non-executable candidate");
            return None;
        }

        let taken: BTreeSet<String> = self
            .session
            .custom_rules
            .iter()
            .map(|r| r.rule_id.clone())
            .collect();
        let rule_id = assign_rule_id(&suggestion, &taken);

        self.session.custom_rules.push(CustomRuleDefinition {
            rule_id: rule_id.clone(),
            rule_name: suggestion.rule_name,
            template: suggestion.template,
            column: column.clone(),
            severity: suggestion.severity,
            explanation: suggestion.explanation,
            code: suggestion.code,
            confidence: suggestion.confidence,
        });
        self.session.pending_suggestion = SuggestionState::None;

        tracing::info!(rule_id = %rule_id, column = %column, "Custom rule approved");
        let _ = self.event_tx.send(WizardEvent::CustomRuleApproved {
            rule_id: rule_id.clone(),
            column,
        });
        Some(rule_id)
    }

    /// Discard the pending suggestion
    pub fn reject_suggestion(&mut self) {
        if let SuggestionState::Suggested { column, .. }
        | SuggestionState::Failed { column, .. } = &self.session.pending_suggestion
        {
            let _ = self.event_tx.send(WizardEvent::CustomRuleRejected {
                column: column.clone(),
            });
        }
        self.session.pending_suggestion = SuggestionState::None;
    }

    // ========================================
    // Settings presets
    // ========================================

    /// Fetch presets from the store, injecting the built-in default when
    /// the store flags none
    pub async fn load_presets(&mut self) -> WizardResult<&[SettingsPreset]> {
        self.session.presets_error = None;
        match self.backend.list_presets().await {
            Ok(presets) => {
                self.presets = resolve_presets(presets);
                Ok(&self.presets)
            }
            Err(e) => {
                let message = e.to_string();
                self.session.presets_error = Some(message.clone());
                Err(WizardError::PresetStore(message))
            }
        }
    }

    pub fn available_presets(&self) -> &[SettingsPreset] {
        &self.presets
    }

    /// Select a preset by id; `"none"` clears the selection so raw
    /// defaults apply. Selecting discards earlier session-local edits.
    pub async fn select_preset(&mut self, preset_id: &str) -> WizardResult<()> {
        if preset_id == "none" {
            self.session.selected_preset = None;
            self.session.preset_overrides = None;
            let _ = self
                .event_tx
                .send(WizardEvent::PresetSelected { preset_id: None });
            return Ok(());
        }

        let preset = match self.presets.iter().find(|p| p.preset_id == preset_id) {
            Some(preset) => preset.clone(),
            None => self
                .backend
                .get_preset(preset_id)
                .await
                .map_err(|e| WizardError::PresetStore(e.to_string()))?,
        };

        tracing::debug!(preset_id = %preset.preset_id, "Preset selected");
        let _ = self.event_tx.send(WizardEvent::PresetSelected {
            preset_id: Some(preset.preset_id.clone()),
        });
        self.session.selected_preset = Some(preset);
        self.session.preset_overrides = None;
        Ok(())
    }

    /// The effective normalized configuration: session edits when present,
    /// else the selected preset, else the built-in defaults
    pub fn preset_config(&self) -> PresetConfig {
        if let Some(overrides) = &self.session.preset_overrides {
            return overrides.clone();
        }
        self.session
            .selected_preset
            .as_ref()
            .map(|p| PresetConfig::from_value(&p.config))
            .unwrap_or_default()
    }

    /// Store session-local edits over the selected preset
    pub fn set_preset_config(&mut self, config: PresetConfig) {
        self.session.preset_overrides = Some(config);
    }

    /// Create a preset in the store; independent of the session
    pub async fn create_preset(&self, preset: &SettingsPreset) -> WizardResult<SettingsPreset> {
        self.backend
            .create_preset(preset)
            .await
            .map_err(|e| WizardError::PresetStore(e.to_string()))
    }

    /// Update a stored preset; independent of the session
    pub async fn update_preset(&self, preset: &SettingsPreset) -> WizardResult<SettingsPreset> {
        self.backend
            .update_preset(preset)
            .await
            .map_err(|e| WizardError::PresetStore(e.to_string()))
    }

    /// Delete a stored preset; independent of the session
    pub async fn delete_preset(&self, preset_id: &str) -> WizardResult<()> {
        self.backend
            .delete_preset(preset_id)
            .await
            .map_err(|e| WizardError::PresetStore(e.to_string()))
    }

    // ========================================
    // Submission and tracking
    // ========================================

    /// Compile the session, start the job, and poll it to a terminal
    /// outcome.
    ///
    /// Refused while a job is already being tracked. Local validation
    /// failures reject before any network call. The snapshot channel
    /// reflects every transition; the returned result mirrors the final
    /// snapshot state.
    pub async fn submit(&mut self) -> WizardResult<PollOutcome> {
        if self.poller.state() == PollState::Processing {
            return Err(WizardError::AlreadyProcessing);
        }

        let request = match compile_request(&self.session) {
            Ok(request) => request,
            Err(e) => {
                let reason = e.to_string();
                let _ = self
                    .event_tx
                    .send(WizardEvent::SubmissionRejected { reason });
                return Err(e);
            }
        };

        let upload_id = self.session.upload_id;
        self.session.processing_error = None;

        if let Err(e) = self.backend.submit_job(upload_id, &request).await {
            let error = WizardError::Submission(e.to_string());
            tracing::warn!(upload_id = %upload_id, error = %error, "Start-job call failed");
            self.session.processing_error = Some(error.to_string());
            self.poller.mark_submission_failed(&error.to_string());
            let _ = self.event_tx.send(WizardEvent::JobFailed {
                upload_id,
                error: error.to_string(),
            });
            return Err(error);
        }

        let _ = self.event_tx.send(WizardEvent::JobSubmitted { upload_id });
        self.track().await
    }

    /// Resume observing the job for this upload without re-submitting,
    /// e.g. after a cancelled observation
    pub async fn resume_tracking(&mut self) -> WizardResult<PollOutcome> {
        if self.poller.state() == PollState::Processing {
            return Err(WizardError::AlreadyProcessing);
        }
        self.track().await
    }

    async fn track(&mut self) -> WizardResult<PollOutcome> {
        let upload_id = self.session.upload_id;
        self.session.is_processing = true;

        let result = self.poller.run(upload_id, self.cancel.child_token()).await;

        self.session.is_processing = false;
        match &result {
            Ok(PollOutcome::Completed(_)) => {}
            Ok(PollOutcome::Cancelled) => {
                // A cancelled token stays cancelled; arm a fresh one so the
                // session can be observed again later
                self.cancel = CancellationToken::new();
            }
            Err(e) => {
                self.session.processing_error = Some(e.to_string());
            }
        }
        result
    }

    /// Return the poller to idle after an error so submission can be
    /// retried
    pub fn reset_polling(&mut self) {
        self.session.processing_error = None;
        self.poller.reset_to_idle();
    }
}
