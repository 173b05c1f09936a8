//! Scripted collaborators shared by the orchestrator tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pipeline::{
    CancellationFlag, CollaboratorError, ContentPlan, Draft, FixAttempt, Fixer, Generated,
    GenerationRequest, GenerationUsage, IssueSeverity, PlannedSection, Planner, RequiredElement,
    ResearchBrief, Researcher, ReviewIssue, ReviewVerdict, Reviewer, SectionBrief,
    SectionHeadline, SectionWriter, TokenCost, TokenCount,
};

pub fn element(label: &str) -> RequiredElement {
    RequiredElement::new(label).unwrap()
}

pub fn section(headline: &str, must_cover: &[&str]) -> PlannedSection {
    PlannedSection {
        headline: SectionHeadline::new(headline).unwrap(),
        goal: format!("Explain {headline}"),
        research_queries: vec![],
        must_cover: must_cover.iter().map(|e| element(e)).collect(),
    }
}

pub fn plan(title: &str, sections: Vec<PlannedSection>, required: &[&str]) -> ContentPlan {
    ContentPlan {
        title: title.into(),
        sections,
        required_elements: required.iter().map(|e| element(e)).collect(),
    }
}

pub fn major(description: &str) -> ReviewIssue {
    ReviewIssue::new(IssueSeverity::Major, description)
}

pub fn approve() -> ReviewVerdict {
    ReviewVerdict::Approved { notes: vec![] }
}

pub fn reject(descriptions: &[&str]) -> ReviewVerdict {
    ReviewVerdict::Rejected {
        issues: descriptions.iter().map(|d| major(d)).collect(),
    }
}

fn usage(tokens: u64) -> GenerationUsage {
    GenerationUsage {
        tokens: TokenCount::new(tokens),
        cost: TokenCost::new(tokens as f64 / 1_000.0).unwrap(),
    }
}

/// What the specialist was told before writing one section.
#[derive(Debug, Clone)]
pub struct RecordedBrief {
    pub index: usize,
    pub headline: String,
    pub cross_reference: String,
    pub required_reminder: String,
}

/// A fixer reply: text appended to the first section, and the applied flag.
pub struct ScriptedFix {
    pub append: String,
    pub applied: bool,
}

#[derive(Default)]
struct Script {
    research_failures: VecDeque<CollaboratorError>,
    plans: Vec<ContentPlan>,
    plan_error: Option<CollaboratorError>,
    bodies: HashMap<String, String>,
    reviews: VecDeque<ReviewVerdict>,
    fixes: VecDeque<ScriptedFix>,
    cancel_after_sections: Option<(CancellationFlag, usize)>,

    research_calls: u32,
    plan_feedback: Vec<Vec<ReviewIssue>>,
    briefs: Vec<RecordedBrief>,
    reviewed: Vec<Draft>,
    fix_requests: Vec<Vec<ReviewIssue>>,
}

/// Implements every phase trait from a script.
///
/// Reviews default to a single Major rejection once the script runs out;
/// fixes default to "not applied".
#[derive(Default)]
pub struct ScriptedCollaborators {
    script: Mutex<Script>,
}

impl ScriptedCollaborators {
    pub fn new(plans: Vec<ContentPlan>) -> Self {
        let collaborators = Self::default();
        collaborators.script.lock().unwrap().plans = plans;
        collaborators
    }

    pub fn body(self, headline: &str, body: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .bodies
            .insert(headline.to_string(), body.to_string());
        self
    }

    pub fn reviews(self, reviews: Vec<ReviewVerdict>) -> Self {
        self.script.lock().unwrap().reviews = reviews.into();
        self
    }

    pub fn fixes(self, fixes: Vec<ScriptedFix>) -> Self {
        self.script.lock().unwrap().fixes = fixes.into();
        self
    }

    pub fn research_failures(self, failures: Vec<CollaboratorError>) -> Self {
        self.script.lock().unwrap().research_failures = failures.into();
        self
    }

    pub fn plan_error(self, error: CollaboratorError) -> Self {
        self.script.lock().unwrap().plan_error = Some(error);
        self
    }

    pub fn cancel_after_sections(self, flag: CancellationFlag, sections: usize) -> Self {
        self.script.lock().unwrap().cancel_after_sections = Some((flag, sections));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn research_calls(&self) -> u32 {
        self.script.lock().unwrap().research_calls
    }

    pub fn plan_feedback(&self) -> Vec<Vec<ReviewIssue>> {
        self.script.lock().unwrap().plan_feedback.clone()
    }

    pub fn briefs(&self) -> Vec<RecordedBrief> {
        self.script.lock().unwrap().briefs.clone()
    }

    pub fn reviewed(&self) -> Vec<Draft> {
        self.script.lock().unwrap().reviewed.clone()
    }

    pub fn fix_requests(&self) -> Vec<Vec<ReviewIssue>> {
        self.script.lock().unwrap().fix_requests.clone()
    }
}

#[async_trait]
impl Researcher for ScriptedCollaborators {
    async fn research(
        &self,
        request: &GenerationRequest,
    ) -> Result<Generated<ResearchBrief>, CollaboratorError> {
        let mut script = self.script.lock().unwrap();
        script.research_calls += 1;
        if let Some(error) = script.research_failures.pop_front() {
            return Err(error);
        }
        Ok(Generated {
            value: ResearchBrief {
                summary: format!("Notes on {}", request.topic),
                sources: vec![],
            },
            usage: usage(100),
        })
    }
}

#[async_trait]
impl Planner for ScriptedCollaborators {
    async fn plan(
        &self,
        _request: &GenerationRequest,
        _research: &ResearchBrief,
        feedback: &[ReviewIssue],
    ) -> Result<Generated<ContentPlan>, CollaboratorError> {
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.plan_error.clone() {
            return Err(error);
        }
        let attempt = script.plan_feedback.len();
        script.plan_feedback.push(feedback.to_vec());
        let plan = script.plans[attempt.min(script.plans.len() - 1)].clone();
        Ok(Generated {
            value: plan,
            usage: usage(200),
        })
    }
}

#[async_trait]
impl SectionWriter for ScriptedCollaborators {
    async fn write_section(
        &self,
        brief: &SectionBrief<'_>,
    ) -> Result<Generated<String>, CollaboratorError> {
        let mut script = self.script.lock().unwrap();
        let headline = brief.section.headline.to_string();
        script.briefs.push(RecordedBrief {
            index: brief.index,
            headline: headline.clone(),
            cross_reference: brief.cross_reference.to_string(),
            required_reminder: brief.required_reminder.to_string(),
        });
        if let Some((flag, after)) = &script.cancel_after_sections {
            if script.briefs.len() >= *after {
                flag.cancel();
            }
        }
        let body = script
            .bodies
            .get(&headline)
            .cloned()
            .unwrap_or_else(|| format!("Plain words about {}.", headline.to_lowercase()));
        Ok(Generated {
            value: body,
            usage: usage(300),
        })
    }
}

#[async_trait]
impl Reviewer for ScriptedCollaborators {
    async fn review(
        &self,
        draft: &Draft,
        _plan: &ContentPlan,
    ) -> Result<Generated<ReviewVerdict>, CollaboratorError> {
        let mut script = self.script.lock().unwrap();
        script.reviewed.push(draft.clone());
        let verdict = script
            .reviews
            .pop_front()
            .unwrap_or_else(|| reject(&["Still not good enough"]));
        Ok(Generated {
            value: verdict,
            usage: usage(50),
        })
    }
}

#[async_trait]
impl Fixer for ScriptedCollaborators {
    async fn fix(
        &self,
        draft: &Draft,
        issues: &[ReviewIssue],
    ) -> Result<Generated<FixAttempt>, CollaboratorError> {
        let mut script = self.script.lock().unwrap();
        script.fix_requests.push(issues.to_vec());
        let reply = script.fixes.pop_front().unwrap_or(ScriptedFix {
            append: String::new(),
            applied: false,
        });
        let mut repaired = draft.clone();
        if let Some(first) = repaired.sections.first_mut() {
            first.body.push_str(&reply.append);
        }
        Ok(Generated {
            value: FixAttempt {
                draft: repaired,
                description: format!("appended {:?}", reply.append),
                applied: reply.applied,
            },
            usage: usage(400),
        })
    }
}
