//! Submission payload compilation
//!
//! Collapses the accumulated session into one [`ProcessingRequest`]. The
//! local validation gate runs first; a rejected session never produces a
//! network call.

use crate::error::{WizardError, WizardResult};
use crate::models::session::WizardSession;
use dqp_common::api::ProcessingRequest;
use std::collections::BTreeMap;

/// Compile the start-job request from a session.
///
/// `selected_columns` is omitted when the selection spans every discovered
/// column ("all columns" sentinel), otherwise enumerated in file order.
/// Disable entries are emitted only for selected, non-overridden columns
/// with at least one disabled id. The preset id is sent for store-backed
/// presets only; the client-side built-in default is expressed through
/// `preset_overrides` when edited and through backend defaults otherwise.
pub fn compile_request(session: &WizardSession) -> WizardResult<ProcessingRequest> {
    if !session.all_columns.is_empty() && session.selected_columns.is_empty() {
        return Err(WizardError::Validation(
            "No columns selected: select at least one column before processing".to_string(),
        ));
    }

    let selected_columns = if session.selected_columns.len() == session.all_columns.len() {
        // Spans the full column set: omit rather than enumerate
        None
    } else {
        Some(in_file_order(session, &session.selected_columns))
    };

    let required_columns = in_file_order(session, &session.required_columns);

    let global_disabled_rules: Vec<String> = session
        .global_rules
        .iter()
        .filter(|r| !r.selected)
        .map(|r| r.rule_id.clone())
        .collect();

    let mut disable_rules: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for column in &session.selected_columns {
        if session.column_overrides.contains_key(column) {
            continue;
        }
        let disabled: Vec<String> = session
            .column_rules
            .get(column)
            .map(|states| {
                states
                    .iter()
                    .filter(|r| !r.selected)
                    .map(|r| r.rule_id.clone())
                    .collect()
            })
            .unwrap_or_default();
        if !disabled.is_empty() {
            disable_rules.insert(column.clone(), disabled);
        }
    }

    let column_rules_override: BTreeMap<String, Vec<String>> = session
        .column_overrides
        .iter()
        .filter(|(column, _)| session.selected_columns.contains(*column))
        .map(|(column, ids)| (column.clone(), ids.clone()))
        .collect();

    let preset_id = session
        .selected_preset
        .as_ref()
        .filter(|p| p.preset_id != crate::models::preset::BUILTIN_DEFAULT_PRESET_ID)
        .map(|p| p.preset_id.clone());

    let preset_overrides = session
        .preset_overrides
        .as_ref()
        .and_then(|c| serde_json::to_value(c).ok());

    Ok(ProcessingRequest {
        selected_columns,
        required_columns,
        global_disabled_rules,
        disable_rules,
        column_rules_override,
        custom_rules: session.custom_rules.clone(),
        preset_id,
        preset_overrides,
    })
}

/// Order a column subset by the discovered file order
fn in_file_order(
    session: &WizardSession,
    subset: &std::collections::BTreeSet<String>,
) -> Vec<String> {
    session
        .all_columns
        .iter()
        .filter(|c| subset.contains(*c))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rules::{RuleCategory, RuleState};
    use uuid::Uuid;

    fn session_with_columns(names: &[&str]) -> WizardSession {
        WizardSession::new(
            Uuid::new_v4(),
            "orders.csv".to_string(),
            names.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn empty_selection_with_known_columns_is_rejected() {
        let session = session_with_columns(&["a", "b"]);
        let result = compile_request(&session);
        assert!(matches!(result, Err(WizardError::Validation(_))));
    }

    #[test]
    fn full_selection_becomes_the_all_columns_sentinel() {
        let mut session = session_with_columns(&["a", "b"]);
        session.select_column("a");
        session.select_column("b");
        let request = compile_request(&session).unwrap();
        assert!(request.selected_columns.is_none());
    }

    #[test]
    fn partial_selection_is_enumerated_in_file_order() {
        let mut session = session_with_columns(&["id", "amount", "currency"]);
        session.select_column("currency");
        session.select_column("id");
        let request = compile_request(&session).unwrap();
        assert_eq!(
            request.selected_columns,
            Some(vec!["id".to_string(), "currency".to_string()])
        );
    }

    #[test]
    fn disable_entries_skip_overridden_and_clean_columns() {
        let mut session = session_with_columns(&["a", "b", "c"]);
        session.select_column("a");
        session.select_column("b");
        session.select_column("c");
        for column in ["a", "b", "c"] {
            session.column_rules.insert(
                column.to_string(),
                vec![RuleState {
                    rule_id: "R2".to_string(),
                    category: RuleCategory::Auto,
                    selected: column == "c", // only c keeps R2 enabled
                    column: Some(column.to_string()),
                }],
            );
        }
        session
            .column_overrides
            .insert("b".to_string(), vec!["R9".to_string()]);

        let request = compile_request(&session).unwrap();
        // a: disabled id emitted; b: overridden, so no disable entry;
        // c: nothing disabled, omitted
        assert_eq!(request.disable_rules.len(), 1);
        assert_eq!(request.disable_rules["a"], vec!["R2".to_string()]);
        assert_eq!(
            request.column_rules_override["b"],
            vec!["R9".to_string()]
        );
    }
}
