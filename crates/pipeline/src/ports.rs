//! Port traits for the external collaborators of a generation run.
//!
//! Each phase that calls out to a language model has its own trait so that
//! adapters (and test doubles) can be swapped per phase. Every call returns a
//! [`Generated`] value carrying token and cost accounting alongside the
//! payload; latency is measured by the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    CollaboratorError, ContentPlan, Draft, FixAttempt, GenerationRequest, PlannedSection,
    ResearchBrief, ReviewIssue, ReviewVerdict, TokenCost, TokenCount,
};

/// Token and cost accounting for one collaborator call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationUsage {
    /// Tokens consumed (input plus output).
    pub tokens: TokenCount,
    /// Cost of the call.
    pub cost: TokenCost,
}

/// A collaborator payload plus its accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated<T> {
    /// The payload.
    pub value: T,
    /// Accounting for the call that produced it.
    pub usage: GenerationUsage,
}

/// Everything the specialist needs to write one section.
#[derive(Debug, Clone, Copy)]
pub struct SectionBrief<'a> {
    /// The original request.
    pub request: &'a GenerationRequest,
    /// Research gathered by the scout.
    pub research: &'a ResearchBrief,
    /// The whole plan, for context.
    pub plan: &'a ContentPlan,
    /// The section to write.
    pub section: &'a PlannedSection,
    /// 1-based position of the section in the plan.
    pub index: usize,
    /// Output of `build_cross_reference_context` for the current state.
    pub cross_reference: &'a str,
    /// Output of `build_required_elements_reminder` for this section.
    pub required_reminder: &'a str,
}

/// Scout phase: gathers research for a request.
#[async_trait]
pub trait Researcher: Send + Sync {
    /// Researches `request`.
    async fn research(
        &self,
        request: &GenerationRequest,
    ) -> Result<Generated<ResearchBrief>, CollaboratorError>;
}

/// Editor phase: turns research into a section plan.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plans the document. `feedback` holds the issues that forced a plan
    /// retry and is empty on the first attempt.
    async fn plan(
        &self,
        request: &GenerationRequest,
        research: &ResearchBrief,
        feedback: &[ReviewIssue],
    ) -> Result<Generated<ContentPlan>, CollaboratorError>;
}

/// Specialist phase: writes one section's markdown body.
#[async_trait]
pub trait SectionWriter: Send + Sync {
    /// Writes the section described by `brief`.
    async fn write_section(
        &self,
        brief: &SectionBrief<'_>,
    ) -> Result<Generated<String>, CollaboratorError>;
}

/// Reviewer phase: critiques an assembled draft.
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Reviews `draft` against `plan`.
    async fn review(
        &self,
        draft: &Draft,
        plan: &ContentPlan,
    ) -> Result<Generated<ReviewVerdict>, CollaboratorError>;
}

/// Fixer phase: repairs a draft against a list of issues.
#[async_trait]
pub trait Fixer: Send + Sync {
    /// Produces a repaired draft.
    async fn fix(
        &self,
        draft: &Draft,
        issues: &[ReviewIssue],
    ) -> Result<Generated<FixAttempt>, CollaboratorError>;
}

/// Destination for validated image payloads.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Persists one asset fetched from `source_url` and returns where it was
    /// stored.
    async fn store(
        &self,
        source_url: &str,
        bytes: &[u8],
        media_type: &str,
        extension: &str,
    ) -> Result<String, CollaboratorError>;
}
