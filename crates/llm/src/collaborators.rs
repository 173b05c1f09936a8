//! Phase collaborators backed by a single completion model.

use async_trait::async_trait;
use pipeline::{
    CollaboratorError, ContentPlan, Draft, FixAttempt, Fixer, Generated, GenerationRequest,
    PhaseName, Planner, ResearchBrief, Researcher, ReviewIssue, ReviewVerdict, Reviewer,
    SectionBrief, SectionWriter,
};
use tracing::debug;

use crate::payload::{parse_fix, parse_plan, parse_research, parse_review};
use crate::prompts;
use crate::{Completion, CompletionModel, CompletionRequest};

/// Output ceilings per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TokenLimits {
    research: u32,
    plan: u32,
    section: u32,
    review: u32,
    fix: u32,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            research: 2_048,
            plan: 2_048,
            section: 4_096,
            review: 2_048,
            fix: 8_192,
        }
    }
}

/// Implements every phase collaborator trait over one [`CompletionModel`].
#[derive(Debug, Clone)]
pub struct ModelCollaborators<M> {
    model: M,
    limits: TokenLimits,
}

impl<M: CompletionModel> ModelCollaborators<M> {
    /// Wraps `model` with default token limits.
    pub fn new(model: M) -> Self {
        Self {
            model,
            limits: TokenLimits::default(),
        }
    }

    async fn complete(
        &self,
        phase: PhaseName,
        system: &str,
        prompt: String,
        max_tokens: u32,
    ) -> Result<Completion, CollaboratorError> {
        let request = CompletionRequest {
            phase,
            system: system.to_string(),
            prompt,
            max_tokens,
        };
        let completion = self.model.complete(&request).await?;
        debug!(
            phase = %phase,
            tokens = completion.usage.tokens.as_u64(),
            "Completion received"
        );
        Ok(completion)
    }
}

#[async_trait]
impl<M: CompletionModel> Researcher for ModelCollaborators<M> {
    async fn research(
        &self,
        request: &GenerationRequest,
    ) -> Result<Generated<ResearchBrief>, CollaboratorError> {
        let completion = self
            .complete(
                PhaseName::Scout,
                prompts::RESEARCH_SYSTEM,
                prompts::research_prompt(request),
                self.limits.research,
            )
            .await?;
        Ok(Generated {
            value: parse_research(&completion.text)?,
            usage: completion.usage,
        })
    }
}

#[async_trait]
impl<M: CompletionModel> Planner for ModelCollaborators<M> {
    async fn plan(
        &self,
        request: &GenerationRequest,
        research: &ResearchBrief,
        feedback: &[ReviewIssue],
    ) -> Result<Generated<ContentPlan>, CollaboratorError> {
        let completion = self
            .complete(
                PhaseName::Editor,
                prompts::PLAN_SYSTEM,
                prompts::plan_prompt(request, research, feedback),
                self.limits.plan,
            )
            .await?;
        Ok(Generated {
            value: parse_plan(&completion.text)?,
            usage: completion.usage,
        })
    }
}

#[async_trait]
impl<M: CompletionModel> SectionWriter for ModelCollaborators<M> {
    async fn write_section(
        &self,
        brief: &SectionBrief<'_>,
    ) -> Result<Generated<String>, CollaboratorError> {
        let completion = self
            .complete(
                PhaseName::Specialist,
                prompts::SECTION_SYSTEM,
                prompts::section_prompt(brief),
                self.limits.section,
            )
            .await?;
        let body = strip_leading_heading(&completion.text, brief.section.headline.as_str());
        Ok(Generated {
            value: body.to_string(),
            usage: completion.usage,
        })
    }
}

#[async_trait]
impl<M: CompletionModel> Reviewer for ModelCollaborators<M> {
    async fn review(
        &self,
        draft: &Draft,
        plan: &ContentPlan,
    ) -> Result<Generated<ReviewVerdict>, CollaboratorError> {
        let completion = self
            .complete(
                PhaseName::Reviewer,
                prompts::REVIEW_SYSTEM,
                prompts::review_prompt(draft, plan),
                self.limits.review,
            )
            .await?;
        Ok(Generated {
            value: parse_review(&completion.text)?,
            usage: completion.usage,
        })
    }
}

#[async_trait]
impl<M: CompletionModel> Fixer for ModelCollaborators<M> {
    async fn fix(
        &self,
        draft: &Draft,
        issues: &[ReviewIssue],
    ) -> Result<Generated<FixAttempt>, CollaboratorError> {
        let completion = self
            .complete(
                PhaseName::Fixer,
                prompts::FIX_SYSTEM,
                prompts::fix_prompt(draft, issues),
                self.limits.fix,
            )
            .await?;
        Ok(Generated {
            value: parse_fix(&completion.text)?,
            usage: completion.usage,
        })
    }
}

/// Drops a `#`-heading the model echoed back for the section itself.
fn strip_leading_heading<'a>(text: &'a str, headline: &str) -> &'a str {
    let trimmed = text.trim();
    let Some((first, rest)) = trimmed.split_once('\n') else {
        return trimmed;
    };
    let heading = first.trim_start_matches('#');
    if heading.len() < first.len() && heading.trim().eq_ignore_ascii_case(headline) {
        rest.trim()
    } else {
        trimmed
    }
}
