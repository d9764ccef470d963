//! Event orchestrator.
//!
//! Turns one storage-change event into one [`EventOutcome`]:
//! - **Decoding**: event payload → job config location
//! - **Resolving config**: job config → required artifacts
//! - **Gating**: wait for every artifact concurrently
//! - **Dispatching**: start the compute job once the gate opened

mod runner;
mod types;

pub use runner::EventOrchestrator;
pub use types::{ErrorKind, EventOutcome, HandlingState, OutcomeStatus, Stage};
