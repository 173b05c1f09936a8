//! Folio LLM boundary adapter.
//!
//! Implements the [`pipeline`] phase collaborator traits ([`pipeline::Researcher`],
//! [`pipeline::Planner`], [`pipeline::SectionWriter`], [`pipeline::Reviewer`],
//! [`pipeline::Fixer`]) on top of any [`CompletionModel`].
//!
//! ## Architectural Layer
//!
//! **Infrastructure boundary.** Prompt construction and validation of the
//! model's loosely-typed JSON live here. Malformed output surfaces as
//! [`pipeline::CollaboratorError::InvalidPayload`] and is never retried;
//! the model adapter decides what is transient.

pub mod collaborators;
pub mod model;
pub mod payload;
mod prompts;

pub use collaborators::ModelCollaborators;
pub use model::{Completion, CompletionModel, CompletionRequest};
pub use payload::{
    extract_json_block, parse_fix, parse_plan, parse_research, parse_review, PayloadError,
};
