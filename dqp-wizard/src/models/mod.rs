//! Session, rule, and preset models for the processing wizard

pub mod preset;
pub mod rules;
pub mod session;

pub use preset::PresetConfig;
pub use rules::{RuleCategory, RuleState, SuggestionState};
pub use session::{WizardSession, WizardStep};
