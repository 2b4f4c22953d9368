//! Settings preset resolution
//!
//! Preset `config` bundles arrive as raw JSON in one of two shapes: the
//! current flat shape, and a legacy nested shape (`enums`/`rules`/`policy`)
//! still served for older presets. Both normalize into [`PresetConfig`].
//! Every lookup list is user-editable after selection; edits become
//! session-local overrides and never mutate the stored preset.

use dqp_common::api::SettingsPreset;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Preset id of the client-side built-in default
pub const BUILTIN_DEFAULT_PRESET_ID: &str = "builtin-default";

/// How strictly rule violations are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Lenient,
    Standard,
    Strict,
}

/// What to do with columns the configuration does not mention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownColumnPolicy {
    Ignore,
    Warn,
    Reject,
}

/// Normalized preset configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetConfig {
    pub strictness: Strictness,
    /// Whether the pipeline may rewrite fixable values
    pub autofix: bool,
    pub unknown_columns: UnknownColumnPolicy,
    /// Accepted currency codes
    pub currencies: Vec<String>,
    /// Accepted unit names
    pub units: Vec<String>,
    /// Accepted status values
    pub status_values: Vec<String>,
    /// Placeholders treated as missing values
    pub missing_values: Vec<String>,
    /// Date formats tried in order
    pub date_formats: Vec<String>,
    /// Maximum accepted text field length
    pub max_text_length: usize,
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Standard,
            autofix: true,
            unknown_columns: UnknownColumnPolicy::Warn,
            currencies: to_strings(&["USD", "EUR", "GBP"]),
            units: to_strings(&["pcs", "kg", "l", "m"]),
            status_values: to_strings(&["open", "closed", "pending", "cancelled"]),
            missing_values: to_strings(&["", "NA", "N/A", "null", "-"]),
            date_formats: to_strings(&["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y"]),
            max_text_length: 255,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Legacy nested config shape
#[derive(Debug, Default, Deserialize)]
struct LegacyConfig {
    #[serde(default)]
    enums: LegacyEnums,
    #[serde(default)]
    rules: LegacyRules,
    #[serde(default)]
    policy: LegacyPolicy,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyEnums {
    currency: Option<Vec<String>>,
    unit: Option<Vec<String>>,
    status: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyRules {
    missing_values: Option<Vec<String>>,
    date_formats: Option<Vec<String>>,
    max_text_length: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyPolicy {
    strictness: Option<Strictness>,
    autofix: Option<bool>,
    unknown_columns: Option<UnknownColumnPolicy>,
}

impl PresetConfig {
    /// Parse a raw preset config bundle, accepting both wire shapes.
    ///
    /// Unparseable or missing fields fall back to the built-in defaults so a
    /// sparse preset still yields a complete configuration.
    pub fn from_value(value: &Value) -> Self {
        if value.get("enums").is_some()
            || value.get("policy").is_some()
            || value.get("rules").is_some()
        {
            return Self::from_legacy(value);
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    fn from_legacy(value: &Value) -> Self {
        let legacy: LegacyConfig =
            serde_json::from_value(value.clone()).unwrap_or_default();
        let defaults = PresetConfig::default();

        Self {
            strictness: legacy.policy.strictness.unwrap_or(defaults.strictness),
            autofix: legacy.policy.autofix.unwrap_or(defaults.autofix),
            unknown_columns: legacy
                .policy
                .unknown_columns
                .unwrap_or(defaults.unknown_columns),
            currencies: legacy.enums.currency.unwrap_or(defaults.currencies),
            units: legacy.enums.unit.unwrap_or(defaults.units),
            status_values: legacy.enums.status.unwrap_or(defaults.status_values),
            missing_values: legacy.rules.missing_values.unwrap_or(defaults.missing_values),
            date_formats: legacy.rules.date_formats.unwrap_or(defaults.date_formats),
            max_text_length: legacy
                .rules
                .max_text_length
                .unwrap_or(defaults.max_text_length),
        }
    }
}

/// The client-side built-in default preset
pub fn builtin_default_preset() -> SettingsPreset {
    SettingsPreset {
        preset_id: BUILTIN_DEFAULT_PRESET_ID.to_string(),
        preset_name: "Standard defaults".to_string(),
        config: serde_json::to_value(PresetConfig::default())
            .unwrap_or(Value::Null),
        is_default: true,
    }
}

/// Ensure exactly one default preset in a server-provided list.
///
/// When the store flags none as default, the built-in default is appended
/// and flagged.
pub fn resolve_presets(mut presets: Vec<SettingsPreset>) -> Vec<SettingsPreset> {
    if !presets.iter().any(|p| p.is_default) {
        presets.push(builtin_default_preset());
    }
    presets
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn modern_shape_parses() {
        let value = json!({
            "strictness": "strict",
            "autofix": false,
            "unknown_columns": "reject",
            "currencies": ["CHF"],
            "missing_values": ["", "?"],
            "max_text_length": 64
        });
        let config = PresetConfig::from_value(&value);
        assert_eq!(config.strictness, Strictness::Strict);
        assert!(!config.autofix);
        assert_eq!(config.unknown_columns, UnknownColumnPolicy::Reject);
        assert_eq!(config.currencies, vec!["CHF".to_string()]);
        assert_eq!(config.max_text_length, 64);
        // Unspecified lists fall back to defaults
        assert!(!config.date_formats.is_empty());
    }

    #[test]
    fn legacy_shape_translates() {
        let value = json!({
            "enums": {
                "currency": ["SEK", "NOK"],
                "status": ["new", "done"]
            },
            "rules": {
                "missing_values": ["n/a"],
                "max_text_length": 128
            },
            "policy": {
                "strictness": "lenient",
                "autofix": true
            }
        });
        let config = PresetConfig::from_value(&value);
        assert_eq!(config.strictness, Strictness::Lenient);
        assert_eq!(config.currencies, vec!["SEK".to_string(), "NOK".to_string()]);
        assert_eq!(config.status_values, vec!["new".to_string(), "done".to_string()]);
        assert_eq!(config.missing_values, vec!["n/a".to_string()]);
        assert_eq!(config.max_text_length, 128);
        // Legacy shape never carried units; defaults apply
        assert!(!config.units.is_empty());
    }

    #[test]
    fn garbage_config_falls_back_to_defaults() {
        let config = PresetConfig::from_value(&json!("not an object"));
        assert_eq!(config, PresetConfig::default());
    }

    #[test]
    fn default_preset_injected_when_store_flags_none() {
        let presets = vec![SettingsPreset {
            preset_id: "p1".to_string(),
            preset_name: "Team preset".to_string(),
            config: json!({}),
            is_default: false,
        }];
        let resolved = resolve_presets(presets);
        assert_eq!(resolved.len(), 2);
        assert_eq!(
            resolved.iter().filter(|p| p.is_default).count(),
            1,
            "exactly one default"
        );
        assert_eq!(resolved[1].preset_id, BUILTIN_DEFAULT_PRESET_ID);
    }

    #[test]
    fn store_provided_default_is_left_alone() {
        let presets = vec![SettingsPreset {
            preset_id: "p1".to_string(),
            preset_name: "Team preset".to_string(),
            config: json!({}),
            is_default: true,
        }];
        let resolved = resolve_presets(presets);
        assert_eq!(resolved.len(), 1);
    }
}
