//! The recovery orchestrator.
//!
//! Drives one generation run through
//! `Researching → Planning → WritingSections → Validating → Reviewing`, then
//! either finishes (approved) or repairs: fixer passes first, then a full plan
//! retry with a fresh [`SectionWriteState`]. Both budgets come from
//! [`RecoveryBudget`], so the loop always terminates. Exhausting them is not
//! an error; the best draft is returned with its outstanding issues.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use pipeline::{
    build_cross_reference_context, build_required_elements_reminder,
    create_initial_section_write_state, mentioned_elements, retry_with_backoff,
    CancellationFlag, Clock, CollaboratorError, ContentPlan, CoverageTracker, Draft,
    DraftSection, Fixer, FolioConfig, FolioError, Generated, GenerationMetadata,
    GenerationRequest, GenerationRunId, PhaseName, PhaseTimer, PhaseUsage, Planner,
    RecoveryBudget, RecoveryState, RequiredElement, ResearchBrief, Researcher, ReviewIssue,
    ReviewVerdict, Reviewer, RetryStrategy, SectionBrief, SectionWriteState, SectionWriter,
    Timestamp,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::validation::{plan_required_elements, validate_draft};

/// The external collaborators of a run, one per phase.
#[derive(Clone)]
pub struct Collaborators {
    /// Gathers research for the request.
    pub researcher: Arc<dyn Researcher>,
    /// Turns research into a section plan.
    pub planner: Arc<dyn Planner>,
    /// Writes one section at a time against the plan.
    pub writer: Arc<dyn SectionWriter>,
    /// Judges the assembled draft and lists what must change.
    pub reviewer: Arc<dyn Reviewer>,
    /// Repairs the draft against review issues.
    pub fixer: Arc<dyn Fixer>,
}

impl Collaborators {
    /// Uses one value for every phase.
    pub fn from_single<T>(all: Arc<T>) -> Self
    where
        T: Researcher + Planner + SectionWriter + Reviewer + Fixer + 'static,
    {
        Self {
            researcher: all.clone(),
            planner: all.clone(),
            writer: all.clone(),
            reviewer: all.clone(),
            fixer: all,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// The final draft, approved or not.
    pub draft: Draft,
    /// The plan the final draft was written from.
    pub plan: ContentPlan,
    /// Coverage state after the final plan attempt's sections were written.
    pub section_state: SectionWriteState,
    /// Whether the reviewer approved and validation found nothing.
    pub approved: bool,
    /// Unresolved issues (empty when approved).
    pub outstanding_issues: Vec<ReviewIssue>,
    /// Timings, usage, and recovery history.
    pub metadata: GenerationMetadata,
}

/// Per-run mutable state, owned by one `run` call.
struct RunContext {
    timer: PhaseTimer,
    usage: BTreeMap<PhaseName, PhaseUsage>,
    recovery: RecoveryState,
}

enum ReviewOutcome {
    Approved { notes: Vec<ReviewIssue> },
    Rejected { issues: Vec<ReviewIssue> },
}

/// Sequences the phases of a generation run.
pub struct GenerationOrchestrator {
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    budget: RecoveryBudget,
    retry: RetryStrategy,
    tracker: CoverageTracker,
}

impl GenerationOrchestrator {
    /// Builds an orchestrator. Fails if `config` does not validate.
    pub fn new(
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        config: &FolioConfig,
    ) -> Result<Self, FolioError> {
        config.validate()?;
        Ok(Self {
            collaborators,
            clock,
            budget: config.recovery,
            retry: config.retry.to_strategy(),
            tracker: CoverageTracker::new(&config.coverage),
        })
    }

    /// Runs one generation to completion.
    ///
    /// Errors only when a collaborator fails beyond its retry budget, returns
    /// an invalid payload, or `cancel` is raised. A draft the reviewer never
    /// approves is still `Ok`.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationFlag,
    ) -> Result<GenerationOutcome, FolioError> {
        let run_id = GenerationRunId::new_random();
        let span = info_span!("generation", run_id = %run_id, topic = %request.topic);
        self.run_inner(run_id, request, cancel).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: GenerationRunId,
        request: &GenerationRequest,
        cancel: &CancellationFlag,
    ) -> Result<GenerationOutcome, FolioError> {
        let started_at = Timestamp::now();
        let mut ctx = RunContext {
            timer: PhaseTimer::new(self.clock.clone()),
            usage: BTreeMap::new(),
            recovery: RecoveryState::default(),
        };

        check_cancelled(cancel, PhaseName::Scout)?;
        ctx.timer.start(PhaseName::Scout);
        let researcher = &self.collaborators.researcher;
        let research = self
            .call(&mut ctx, PhaseName::Scout, move || researcher.research(request))
            .await;
        end_phase(&mut ctx, PhaseName::Scout);
        let research = research?;

        let mut feedback: Vec<ReviewIssue> = Vec::new();
        loop {
            let plan = self.plan(&mut ctx, request, &research, &feedback, cancel).await?;
            let (mut draft, section_state) = self
                .write_sections(&mut ctx, request, &research, &plan, cancel)
                .await?;

            let mut fixer_passes = 0;
            let issues = loop {
                let issues = match self.review(&mut ctx, &draft, &plan, cancel).await? {
                    ReviewOutcome::Approved { notes } => {
                        ctx.recovery.record_approval(&notes);
                        return Ok(self.finish(
                            ctx,
                            run_id,
                            started_at,
                            draft,
                            plan,
                            section_state,
                            true,
                        ));
                    }
                    ReviewOutcome::Rejected { issues } => issues,
                };
                ctx.recovery.record_rejection(&issues);
                if fixer_passes >= self.budget.max_fixer_iterations {
                    break issues;
                }
                fixer_passes += 1;
                draft = self.fix(&mut ctx, draft, &issues, cancel).await?;
            };

            if !ctx.recovery.can_retry_plan(&self.budget) {
                warn!(
                    outstanding = issues.len(),
                    plan_retries = ctx.recovery.plan_retries,
                    fixer_iterations = ctx.recovery.fixer_iterations,
                    "Recovery budgets exhausted; returning draft with outstanding issues"
                );
                return Ok(self.finish(
                    ctx,
                    run_id,
                    started_at,
                    draft,
                    plan,
                    section_state,
                    false,
                ));
            }
            ctx.recovery.record_plan_retry();
            info!(
                plan_retry = ctx.recovery.plan_retries,
                issues = issues.len(),
                "Regenerating plan"
            );
            feedback = issues;
        }
    }

    async fn plan(
        &self,
        ctx: &mut RunContext,
        request: &GenerationRequest,
        research: &ResearchBrief,
        feedback: &[ReviewIssue],
        cancel: &CancellationFlag,
    ) -> Result<ContentPlan, FolioError> {
        check_cancelled(cancel, PhaseName::Editor)?;
        ctx.timer.start(PhaseName::Editor);
        let planner = &self.collaborators.planner;
        let plan = self
            .call(ctx, PhaseName::Editor, move || {
                planner.plan(request, research, feedback)
            })
            .await;
        end_phase(ctx, PhaseName::Editor);
        let plan = plan?;

        if plan.sections.is_empty() {
            return Err(FolioError::ValidationRejection {
                phase: PhaseName::Editor,
                message: "plan contains no sections".into(),
            });
        }
        Ok(plan)
    }

    /// Writes every planned section in order, starting from an empty
    /// coverage state.
    async fn write_sections(
        &self,
        ctx: &mut RunContext,
        request: &GenerationRequest,
        research: &ResearchBrief,
        plan: &ContentPlan,
        cancel: &CancellationFlag,
    ) -> Result<(Draft, SectionWriteState), FolioError> {
        let required = plan_required_elements(plan);
        let mut state = create_initial_section_write_state();
        let mut sections = Vec::with_capacity(plan.sections.len());

        ctx.timer.start(PhaseName::Specialist);
        let written = self
            .write_each(ctx, request, research, plan, &required, &mut state, &mut sections, cancel)
            .await;
        end_phase(ctx, PhaseName::Specialist);
        written?;

        let draft = Draft {
            title: plan.title.clone(),
            sections,
        };
        Ok((draft, state))
    }

    #[allow(clippy::too_many_arguments)]
    async fn write_each(
        &self,
        ctx: &mut RunContext,
        request: &GenerationRequest,
        research: &ResearchBrief,
        plan: &ContentPlan,
        required: &[RequiredElement],
        state: &mut SectionWriteState,
        sections: &mut Vec<DraftSection>,
        cancel: &CancellationFlag,
    ) -> Result<(), FolioError> {
        let writer = &self.collaborators.writer;
        for (i, section) in plan.sections.iter().enumerate() {
            check_cancelled(cancel, PhaseName::Specialist)?;

            let cross_reference = build_cross_reference_context(state);
            let required_reminder =
                build_required_elements_reminder(state, required, Some(&section.must_cover));
            let brief = SectionBrief {
                request,
                research,
                plan,
                section,
                index: i + 1,
                cross_reference: &cross_reference,
                required_reminder: &required_reminder,
            };
            let brief = &brief;
            let body = self
                .call(ctx, PhaseName::Specialist, move || writer.write_section(brief))
                .await?;

            let mentioned = mentioned_elements(&body, required);
            *state = self.tracker.update_section_write_state(
                state,
                &body,
                section.headline.as_str(),
                Some(&mentioned),
            );
            sections.push(DraftSection {
                headline: section.headline.to_string(),
                body,
            });
        }
        Ok(())
    }

    /// Validation phase followed by the reviewer. Approval requires both.
    async fn review(
        &self,
        ctx: &mut RunContext,
        draft: &Draft,
        plan: &ContentPlan,
        cancel: &CancellationFlag,
    ) -> Result<ReviewOutcome, FolioError> {
        check_cancelled(cancel, PhaseName::Validation)?;
        ctx.timer.start(PhaseName::Validation);
        let validation_issues = validate_draft(draft, plan);
        end_phase(ctx, PhaseName::Validation);

        check_cancelled(cancel, PhaseName::Reviewer)?;
        ctx.timer.start(PhaseName::Reviewer);
        let reviewer = &self.collaborators.reviewer;
        let verdict = self
            .call(ctx, PhaseName::Reviewer, move || reviewer.review(draft, plan))
            .await;
        end_phase(ctx, PhaseName::Reviewer);

        let verdict = verdict?;
        debug!(
            reviewer_approved = verdict.is_approved(),
            reviewer_issues = verdict.issues().len(),
            validation_issues = validation_issues.len(),
            "Review received"
        );
        let outcome = match verdict {
            ReviewVerdict::Approved { notes } if validation_issues.is_empty() => {
                ReviewOutcome::Approved { notes }
            }
            ReviewVerdict::Approved { .. } => ReviewOutcome::Rejected {
                issues: validation_issues,
            },
            ReviewVerdict::Rejected { mut issues } => {
                issues.extend(validation_issues);
                ReviewOutcome::Rejected { issues }
            }
        };
        match &outcome {
            ReviewOutcome::Approved { notes } => info!(notes = notes.len(), "Draft approved"),
            ReviewOutcome::Rejected { issues } => {
                info!(issues = issues.len(), "Draft rejected")
            }
        }
        Ok(outcome)
    }

    /// One fixer pass. The repaired draft replaces the current one only when
    /// the fixer reports the change as applied.
    async fn fix(
        &self,
        ctx: &mut RunContext,
        draft: Draft,
        issues: &[ReviewIssue],
        cancel: &CancellationFlag,
    ) -> Result<Draft, FolioError> {
        check_cancelled(cancel, PhaseName::Fixer)?;
        ctx.timer.start(PhaseName::Fixer);
        let fixer = &self.collaborators.fixer;
        let current = &draft;
        let attempt = self
            .call(ctx, PhaseName::Fixer, move || fixer.fix(current, issues))
            .await;
        end_phase(ctx, PhaseName::Fixer);
        let attempt = attempt?;

        ctx.recovery.record_fix(attempt.description, attempt.applied);
        Ok(if attempt.applied { attempt.draft } else { draft })
    }

    /// Invokes a collaborator under the retry policy and records its usage.
    async fn call<T, F, Fut>(
        &self,
        ctx: &mut RunContext,
        phase: PhaseName,
        mut operation: F,
    ) -> Result<T, FolioError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Generated<T>, CollaboratorError>>,
    {
        let started = self.clock.now();
        let generated = retry_with_backoff(&self.retry, self.clock.as_ref(), phase.as_str(), |_| {
            operation()
        })
        .await
        .map_err(|source| match source {
            CollaboratorError::InvalidPayload { message } => {
                FolioError::ValidationRejection { phase, message }
            }
            source => FolioError::PhaseFailed { phase, source },
        })?;

        let latency_ms = self
            .clock
            .now()
            .saturating_duration_since(started)
            .as_millis() as u64;
        ctx.usage
            .entry(phase)
            .or_default()
            .record(generated.usage, latency_ms);
        Ok(generated.value)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        ctx: RunContext,
        run_id: GenerationRunId,
        started_at: Timestamp,
        draft: Draft,
        plan: ContentPlan,
        section_state: SectionWriteState,
        approved: bool,
    ) -> GenerationOutcome {
        let RunContext {
            timer,
            usage,
            recovery,
        } = ctx;
        let outstanding_issues = if approved {
            Vec::new()
        } else {
            recovery.final_reviewer_issues.clone()
        };
        let metadata = GenerationMetadata {
            run_id,
            started_at,
            finished_at: Timestamp::now(),
            approved,
            phase_durations_ms: timer.durations(),
            total_duration_ms: timer.total_duration(),
            usage,
            final_reviewer_issues: recovery.final_reviewer_issues.clone(),
            recovery,
        };
        info!(
            approved,
            total_duration_ms = metadata.total_duration_ms,
            plan_retries = metadata.recovery.plan_retries,
            fixer_iterations = metadata.recovery.fixer_iterations,
            tokens = metadata.total_tokens().as_u64(),
            cost_usd = metadata.total_cost().usd(),
            "Generation finished"
        );
        GenerationOutcome {
            draft,
            plan,
            section_state,
            approved,
            outstanding_issues,
            metadata,
        }
    }
}

fn check_cancelled(cancel: &CancellationFlag, next: PhaseName) -> Result<(), FolioError> {
    if cancel.is_cancelled() {
        info!(phase = %next, "Generation cancelled");
        return Err(FolioError::Cancelled { phase: next });
    }
    Ok(())
}

fn end_phase(ctx: &mut RunContext, phase: PhaseName) {
    let duration_ms = ctx.timer.end(phase);
    info!(phase = %phase, duration_ms, "Phase finished");
}
