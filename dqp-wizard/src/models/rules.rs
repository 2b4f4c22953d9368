//! Rule configuration model
//!
//! Three layers combine into the rule set the pipeline executes per column:
//! - global layer: rule ids disabled uniformly across all columns
//! - per-column layer: either baseline exclusions (disable) or a full
//!   replacement of the suggested set (override); an override replaces the
//!   suggested rules outright and disable sets do not apply to it
//! - custom layer: user-authored rules, always additive

use dqp_common::api::{CustomRuleDefinition, RuleDecision, RuleSuggestion, SuggestedRule};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Origin of a rule state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Suggested with high confidence, pre-selected
    Auto,
    /// Suggested but requiring explicit opt-in
    Human,
    /// User-authored
    Custom,
}

/// Selection state of one rule in one layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleState {
    pub rule_id: String,
    pub category: RuleCategory,
    pub selected: bool,
    /// Column scope; None in the global layer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl RuleState {
    /// Build a rule state from a profiler suggestion.
    ///
    /// Auto-category rules default to selected, human-category rules to
    /// unselected.
    pub fn from_suggested(suggested: &SuggestedRule, column: Option<String>) -> Self {
        let (category, selected) = match suggested.decision {
            RuleDecision::Auto => (RuleCategory::Auto, true),
            RuleDecision::Human => (RuleCategory::Human, false),
        };
        Self {
            rule_id: suggested.rule_id.clone(),
            category,
            selected,
            column,
        }
    }
}

/// Custom-rule suggestion workflow state
///
/// `None → Suggesting → {Suggested | Failed}`; approval or rejection returns
/// to `None`. A candidate is not part of the session's custom rules until
/// explicitly approved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SuggestionState {
    /// No suggestion in flight
    None,
    /// Request issued, response pending
    Suggesting { column: String },
    /// Candidate held for the user's approve/reject decision
    Suggested {
        column: String,
        suggestion: RuleSuggestion,
        /// Non-executable candidates cannot be approved
        executable: bool,
    },
    /// The suggestion service returned an error
    Failed { column: String, error: String },
}

/// Assign a unique uppercase rule id for an approved custom rule.
///
/// Prefers the id the suggestion service proposed, falls back to a name
/// derived from the rule name, and suffixes a counter until unique among
/// the ids already taken.
pub fn assign_rule_id(suggestion: &RuleSuggestion, taken: &BTreeSet<String>) -> String {
    let base = suggestion
        .rule_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .map(sanitize_rule_id)
        .unwrap_or_else(|| {
            let from_name = sanitize_rule_id(&suggestion.rule_name);
            if from_name.is_empty() {
                "CUSTOM_RULE".to_string()
            } else {
                format!("CUSTOM_{}", from_name)
            }
        });

    if !taken.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Uppercase, alphanumerics and underscores only
fn sanitize_rule_id(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// Compile the effective rule-id set for one column.
///
/// An override replaces the suggested set outright; otherwise the suggested
/// rules that are still selected survive, minus the globally disabled ids.
/// Custom rules for the column are additive in either case.
pub fn compile_column_rules(
    column: &str,
    column_rules: &HashMap<String, Vec<RuleState>>,
    global_rules: &[RuleState],
    column_overrides: &HashMap<String, Vec<String>>,
    custom_rules: &[CustomRuleDefinition],
) -> BTreeSet<String> {
    let mut compiled: BTreeSet<String> = match column_overrides.get(column) {
        Some(override_ids) => override_ids.iter().cloned().collect(),
        None => {
            let globally_disabled: BTreeSet<&str> = global_rules
                .iter()
                .filter(|r| !r.selected)
                .map(|r| r.rule_id.as_str())
                .collect();

            column_rules
                .get(column)
                .map(|states| {
                    states
                        .iter()
                        .filter(|r| r.selected)
                        .filter(|r| !globally_disabled.contains(r.rule_id.as_str()))
                        .map(|r| r.rule_id.clone())
                        .collect()
                })
                .unwrap_or_default()
        }
    };

    for custom in custom_rules.iter().filter(|r| r.column == column) {
        compiled.insert(custom.rule_id.clone());
    }
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(rule_id: &str, selected: bool) -> RuleState {
        RuleState {
            rule_id: rule_id.to_string(),
            category: RuleCategory::Auto,
            selected,
            column: None,
        }
    }

    #[test]
    fn auto_rules_default_selected_human_rules_do_not() {
        let auto = SuggestedRule {
            rule_id: "R1".to_string(),
            decision: RuleDecision::Auto,
            source: "profiler".to_string(),
        };
        let human = SuggestedRule {
            rule_id: "R2".to_string(),
            decision: RuleDecision::Human,
            source: "profiler".to_string(),
        };
        assert!(RuleState::from_suggested(&auto, None).selected);
        assert!(!RuleState::from_suggested(&human, None).selected);
    }

    #[test]
    fn override_replaces_suggested_and_disabled_sets() {
        // Global layer disables R1, column A disables R2, column A overrides
        // with R9. The override wins outright.
        let mut column_rules = HashMap::new();
        column_rules.insert(
            "A".to_string(),
            vec![state("R1", true), state("R2", false), state("R3", true)],
        );
        let global = vec![state("R1", false)];
        let mut overrides = HashMap::new();
        overrides.insert("A".to_string(), vec!["R9".to_string()]);

        let compiled = compile_column_rules("A", &column_rules, &global, &overrides, &[]);
        assert_eq!(compiled.into_iter().collect::<Vec<_>>(), vec!["R9".to_string()]);
    }

    #[test]
    fn disable_sets_apply_without_an_override() {
        let mut column_rules = HashMap::new();
        column_rules.insert(
            "A".to_string(),
            vec![state("R1", true), state("R2", false), state("R3", true)],
        );
        let global = vec![state("R1", false)];

        let compiled =
            compile_column_rules("A", &column_rules, &global, &HashMap::new(), &[]);
        // R1 globally disabled, R2 disabled on the column, R3 survives
        assert_eq!(compiled.into_iter().collect::<Vec<_>>(), vec!["R3".to_string()]);
    }

    #[test]
    fn custom_rules_are_additive_even_with_an_override() {
        let mut overrides = HashMap::new();
        overrides.insert("A".to_string(), vec!["R9".to_string()]);
        let custom = vec![CustomRuleDefinition {
            rule_id: "CUSTOM_POSITIVE".to_string(),
            rule_name: "positive".to_string(),
            template: "range".to_string(),
            column: "A".to_string(),
            severity: None,
            explanation: None,
            code: None,
            confidence: None,
        }];

        let compiled =
            compile_column_rules("A", &HashMap::new(), &[], &overrides, &custom);
        assert!(compiled.contains("R9"));
        assert!(compiled.contains("CUSTOM_POSITIVE"));
    }

    #[test]
    fn rule_id_assignment_prefers_suggested_id_and_stays_unique() {
        let suggestion = RuleSuggestion {
            rule_id: Some("amount_range".to_string()),
            rule_name: "Amount range".to_string(),
            template: "range".to_string(),
            severity: None,
            confidence: None,
            explanation: None,
            code: None,
        };
        let mut taken = BTreeSet::new();
        assert_eq!(assign_rule_id(&suggestion, &taken), "AMOUNT_RANGE");

        taken.insert("AMOUNT_RANGE".to_string());
        assert_eq!(assign_rule_id(&suggestion, &taken), "AMOUNT_RANGE_2");
    }

    #[test]
    fn rule_id_falls_back_to_rule_name() {
        let suggestion = RuleSuggestion {
            rule_id: None,
            rule_name: "no empty currency!".to_string(),
            template: "not_null".to_string(),
            severity: None,
            confidence: None,
            explanation: None,
            code: None,
        };
        let id = assign_rule_id(&suggestion, &BTreeSet::new());
        assert_eq!(id, "CUSTOM_NO_EMPTY_CURRENCY");
    }
}
