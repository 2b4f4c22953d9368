//! Wizard session state machine
//!
//! The wizard progresses through 5 ordered steps:
//! COLUMNS → PROFILING → SETTINGS → RULES → PROCESS
//!
//! One session exists per file being configured. Re-initializing for the
//! same upload preserves the step and intersects the selection with the
//! refreshed column list; a different upload resets everything.

use crate::models::preset::PresetConfig;
use crate::models::rules::{RuleState, SuggestionState};
use dqp_common::api::{ColumnProfile, CustomRuleDefinition, SettingsPreset};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Wizard step, in fixed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WizardStep {
    /// Column selection
    Columns,
    /// Profile inspection
    Profiling,
    /// Settings preset selection
    Settings,
    /// Rule configuration
    Rules,
    /// Review and submit (terminal stage; submission follows, not navigation)
    Process,
}

impl WizardStep {
    const ORDER: [WizardStep; 5] = [
        WizardStep::Columns,
        WizardStep::Profiling,
        WizardStep::Settings,
        WizardStep::Rules,
        WizardStep::Process,
    ];

    /// Next step in order, None at the terminal stage
    pub fn next(self) -> Option<WizardStep> {
        let idx = Self::ORDER.iter().position(|s| *s == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    /// Previous step in order, None at the first stage
    pub fn prev(self) -> Option<WizardStep> {
        let idx = Self::ORDER.iter().position(|s| *s == self)?;
        idx.checked_sub(1).and_then(|i| Self::ORDER.get(i)).copied()
    }
}

/// One wizard session, owned by the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardSession {
    /// Upload this session configures
    pub upload_id: Uuid,

    /// Display name of the uploaded file
    pub file_name: String,

    /// Current wizard step
    pub step: WizardStep,

    /// All discovered columns, in file order
    pub all_columns: Vec<String>,

    /// Selected columns; always a subset of `all_columns`
    pub selected_columns: BTreeSet<String>,

    /// Columns that must survive cleaning; subset of `all_columns`
    pub required_columns: BTreeSet<String>,

    /// Cached profiling results, keyed by column name
    pub column_profiles: HashMap<String, ColumnProfile>,

    /// Selected settings preset, when any
    pub selected_preset: Option<SettingsPreset>,

    /// Session-local edits layered over the selected preset
    pub preset_overrides: Option<PresetConfig>,

    /// Global rule layer; ids with `selected == false` are disabled on
    /// every column
    pub global_rules: Vec<RuleState>,

    /// Per-column rule states seeded from profile suggestions
    pub column_rules: HashMap<String, Vec<RuleState>>,

    /// Per-column full replacement of the suggested rule set
    pub column_overrides: HashMap<String, Vec<String>>,

    /// Approved user-authored rules, in approval order
    pub custom_rules: Vec<CustomRuleDefinition>,

    /// Pending custom-rule suggestion workflow state
    pub pending_suggestion: SuggestionState,

    /// Whether a processing job is currently being tracked
    pub is_processing: bool,

    /// Last submission or processing failure, surfaced on the process step
    pub processing_error: Option<String>,

    /// Step-scoped profiling fetch error; cleared on the next attempt
    pub profiling_error: Option<String>,

    /// Step-scoped preset fetch error; cleared on the next attempt
    pub presets_error: Option<String>,
}

impl WizardSession {
    /// Create a fresh session at the columns step
    pub fn new(upload_id: Uuid, file_name: String, columns: Vec<String>) -> Self {
        Self {
            upload_id,
            file_name,
            step: WizardStep::Columns,
            all_columns: columns,
            selected_columns: BTreeSet::new(),
            required_columns: BTreeSet::new(),
            column_profiles: HashMap::new(),
            selected_preset: None,
            preset_overrides: None,
            global_rules: Vec::new(),
            column_rules: HashMap::new(),
            column_overrides: HashMap::new(),
            custom_rules: Vec::new(),
            pending_suggestion: SuggestionState::None,
            is_processing: false,
            processing_error: None,
            profiling_error: None,
            presets_error: None,
        }
    }

    /// Apply the re-initialization rule.
    ///
    /// Same upload: keep the step and accumulated configuration, intersect
    /// the selection (and required set) with the refreshed column list.
    /// Different upload: full reset to the columns step.
    pub fn reinitialize(&mut self, upload_id: Uuid, file_name: String, columns: Vec<String>) {
        if upload_id == self.upload_id {
            let refreshed: BTreeSet<String> = columns.iter().cloned().collect();
            self.all_columns = columns;
            self.file_name = file_name;
            self.selected_columns = self
                .selected_columns
                .intersection(&refreshed)
                .cloned()
                .collect();
            self.required_columns = self
                .required_columns
                .intersection(&refreshed)
                .cloned()
                .collect();
            self.prune_to_selection();
        } else {
            *self = WizardSession::new(upload_id, file_name, columns);
        }
    }

    /// Whether the current step's gate allows moving forward
    pub fn can_proceed(&self) -> bool {
        match self.step {
            WizardStep::Columns => !self.selected_columns.is_empty(),
            WizardStep::Profiling => {
                !self.selected_columns.is_empty()
                    && self
                        .selected_columns
                        .iter()
                        .any(|c| self.column_profiles.contains_key(c))
            }
            WizardStep::Settings => true,
            WizardStep::Rules => true,
            // Terminal stage; submission, not navigation, follows
            WizardStep::Process => false,
        }
    }

    /// Advance one step; no-op at the process step
    pub fn next_step(&mut self) -> WizardStep {
        if let Some(next) = self.step.next() {
            self.step = next;
        }
        self.step
    }

    /// Go back one step; no-op at the columns step
    pub fn prev_step(&mut self) -> WizardStep {
        if let Some(prev) = self.step.prev() {
            self.step = prev;
        }
        self.step
    }

    /// Select a column. Unknown columns are ignored, preserving the
    /// selection invariant.
    pub fn select_column(&mut self, column: &str) {
        if self.all_columns.iter().any(|c| c == column) {
            self.selected_columns.insert(column.to_string());
        }
    }

    /// Deselect a column and drop configuration that referred to it
    pub fn deselect_column(&mut self, column: &str) {
        self.selected_columns.remove(column);
        self.prune_to_selection();
    }

    /// Replace the selection wholesale; unknown columns are filtered out
    pub fn set_selected_columns(&mut self, columns: &[String]) {
        let known: BTreeSet<String> = self.all_columns.iter().cloned().collect();
        self.selected_columns = columns
            .iter()
            .filter(|c| known.contains(*c))
            .cloned()
            .collect();
        self.prune_to_selection();
    }

    /// Mark a column as required; must already be a known column
    pub fn set_required_column(&mut self, column: &str, required: bool) {
        if required {
            if self.all_columns.iter().any(|c| c == column) {
                self.required_columns.insert(column.to_string());
            }
        } else {
            self.required_columns.remove(column);
        }
    }

    /// Drop custom rules and overrides for columns no longer selected.
    ///
    /// Maintains the invariant that every custom rule targets a selected
    /// column.
    fn prune_to_selection(&mut self) {
        let selected = self.selected_columns.clone();
        self.custom_rules.retain(|r| selected.contains(&r.column));
        self.column_overrides.retain(|c, _| selected.contains(c));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn session() -> WizardSession {
        WizardSession::new(
            Uuid::new_v4(),
            "orders.csv".to_string(),
            columns(&["id", "amount", "currency", "status", "date"]),
        )
    }

    #[test]
    fn step_order_and_boundaries() {
        let mut s = session();
        assert_eq!(s.step, WizardStep::Columns);
        assert_eq!(s.prev_step(), WizardStep::Columns); // no-op at the start

        s.next_step();
        s.next_step();
        s.next_step();
        s.next_step();
        assert_eq!(s.step, WizardStep::Process);
        assert_eq!(s.next_step(), WizardStep::Process); // no-op at the end
    }

    #[test]
    fn columns_step_requires_selection() {
        let mut s = session();
        assert!(!s.can_proceed());
        s.select_column("amount");
        assert!(s.can_proceed());
    }

    #[test]
    fn profiling_step_requires_a_cached_profile() {
        let mut s = session();
        s.select_column("amount");
        s.next_step();
        assert_eq!(s.step, WizardStep::Profiling);
        assert!(!s.can_proceed());

        s.column_profiles.insert(
            "amount".to_string(),
            ColumnProfile {
                type_guess: "number".to_string(),
                type_confidence: 0.95,
                null_rate: 0.01,
                unique_ratio: 0.7,
                numeric_parse_rate: Some(0.99),
                date_parse_rate: None,
                min_length: None,
                max_length: None,
                avg_length: None,
                rules: Vec::new(),
            },
        );
        assert!(s.can_proceed());
    }

    #[test]
    fn selection_stays_subset_of_all_columns() {
        let mut s = session();
        s.select_column("amount");
        s.select_column("no_such_column");
        assert!(s.selected_columns.iter().all(|c| s.all_columns.contains(c)));
        assert_eq!(s.selected_columns.len(), 1);
    }

    #[test]
    fn reinit_same_upload_preserves_step_and_intersects_selection() {
        let mut s = session();
        let id = s.upload_id;
        s.select_column("amount");
        s.select_column("currency");
        s.next_step();
        s.next_step();
        assert_eq!(s.step, WizardStep::Settings);

        // Refreshed discovery dropped the currency column
        s.reinitialize(id, "orders.csv".to_string(), columns(&["id", "amount", "status"]));
        assert_eq!(s.step, WizardStep::Settings);
        assert_eq!(
            s.selected_columns.iter().cloned().collect::<Vec<_>>(),
            vec!["amount".to_string()]
        );
    }

    #[test]
    fn reinit_different_upload_resets_everything() {
        let mut s = session();
        s.select_column("amount");
        s.next_step();
        s.custom_rules.push(CustomRuleDefinition {
            rule_id: "CUSTOM_1".to_string(),
            rule_name: "positive amount".to_string(),
            template: "range".to_string(),
            column: "amount".to_string(),
            severity: None,
            explanation: None,
            code: None,
            confidence: None,
        });

        s.reinitialize(Uuid::new_v4(), "other.csv".to_string(), columns(&["a", "b"]));
        assert_eq!(s.step, WizardStep::Columns);
        assert!(s.selected_columns.is_empty());
        assert!(s.custom_rules.is_empty());
        assert!(s.column_profiles.is_empty());
    }

    #[test]
    fn deselecting_a_column_drops_its_custom_rules() {
        let mut s = session();
        s.select_column("amount");
        s.custom_rules.push(CustomRuleDefinition {
            rule_id: "CUSTOM_1".to_string(),
            rule_name: "positive amount".to_string(),
            template: "range".to_string(),
            column: "amount".to_string(),
            severity: None,
            explanation: None,
            code: None,
            confidence: None,
        });
        s.column_overrides
            .insert("amount".to_string(), vec!["R9".to_string()]);

        s.deselect_column("amount");
        assert!(s.custom_rules.is_empty());
        assert!(s.column_overrides.is_empty());
    }
}
