//! Folio generation orchestration.
//!
//! This crate sequences the phase collaborators defined in [`pipeline`] into
//! a complete generation run ([`GenerationOrchestrator`]) and collects the
//! images a finished document references ([`collect_assets`]).
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** It binds the Phase Timer, Coverage Tracker, retry
//! policy, and recovery budgets from [`pipeline`] around calls to
//! collaborator traits. It holds no domain rules of its own and performs no
//! I/O except through those traits and the [`fetcher`] crate.

pub mod assets;
pub mod orchestrator;
pub mod validation;

pub use assets::{collect_assets, AssetError, AssetFailure, AssetReport, StoredAsset};
pub use orchestrator::{Collaborators, GenerationOrchestrator, GenerationOutcome};
pub use validation::{plan_required_elements, validate_draft};
