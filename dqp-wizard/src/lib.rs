//! dqp-wizard - Processing Wizard Orchestrator
//!
//! Client-side orchestrator for the DQ pipeline: a multi-stage configuration
//! state machine (columns, profiling, settings, rules, process) that
//! accumulates one submission payload, and a status-polling state machine
//! that tracks the resulting job to a terminal outcome.
//!
//! The host attaches through three surfaces:
//! - the [`wizard::WizardController`] owning the live session,
//! - a `watch` snapshot of the poller's `{state, progress, message}`,
//! - a `broadcast` stream of [`wizard::WizardEvent`]s.

pub mod error;
pub mod models;
pub mod services;
pub mod wizard;

pub use crate::error::{WizardError, WizardResult};
pub use crate::models::session::{WizardSession, WizardStep};
pub use crate::services::backend::DqBackend;
pub use crate::wizard::controller::WizardController;
pub use crate::wizard::poller::{PollSnapshot, PollState, PollerConfig};
