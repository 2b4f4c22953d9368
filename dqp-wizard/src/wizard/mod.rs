//! Processing wizard orchestration
//!
//! One canonical orchestrator drives the whole flow:
//! - [`controller::WizardController`] owns the session and every stage
//!   operation (selection, profiling, presets, rules, custom-rule workflow)
//! - [`submitter`] compiles the accumulated session into one request
//! - [`poller::StatusPoller`] tracks the submitted job to a terminal outcome
//!
//! Observers attach through the controller's watch snapshot and broadcast
//! event stream; nothing is threaded through call signatures.

pub mod controller;
pub mod events;
pub mod poller;
pub mod submitter;

pub use controller::WizardController;
pub use events::WizardEvent;
pub use poller::{PollOutcome, PollSnapshot, PollState, PollerConfig, StatusPoller};
pub use submitter::compile_request;
