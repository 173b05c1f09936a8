//! Prompt construction for each phase.

use std::fmt::Write as _;

use pipeline::{ContentPlan, Draft, GenerationRequest, ResearchBrief, ReviewIssue, SectionBrief};

pub(crate) const RESEARCH_SYSTEM: &str = "You are a research scout. Gather accurate, \
specific facts for the requested topic. Respond with JSON only: \
{\"summary\": string, \"sources\": [string]}.";

pub(crate) const PLAN_SYSTEM: &str = "You are an editor planning a long-form article. \
Respond with JSON only: {\"title\": string, \"sections\": [{\"headline\": string, \
\"goal\": string, \"research_queries\": [string], \"must_cover\": [string]}], \
\"required_elements\": [string]}.";

pub(crate) const SECTION_SYSTEM: &str = "You are a specialist writer. Write only the body \
of the requested section in markdown, without its heading. Do not repeat material \
listed as already covered; refer back to it instead.";

pub(crate) const REVIEW_SYSTEM: &str = "You are a strict reviewer. Respond with JSON only: \
{\"approved\": boolean, \"issues\": [{\"severity\": \"critical\"|\"major\"|\"minor\", \
\"description\": string, \"section\": string|null}]}.";

pub(crate) const FIX_SYSTEM: &str = "You repair drafts. Resolve every listed issue while \
keeping the heading structure. Respond with JSON only: {\"markdown\": string, \
\"description\": string, \"applied\": boolean}.";

fn request_header(out: &mut String, request: &GenerationRequest) {
    let _ = writeln!(out, "Topic: {}", request.topic);
    if let Some(audience) = &request.audience {
        let _ = writeln!(out, "Audience: {audience}");
    }
    if let Some(notes) = &request.notes {
        let _ = writeln!(out, "Notes: {notes}");
    }
}

pub(crate) fn research_prompt(request: &GenerationRequest) -> String {
    let mut out = String::new();
    request_header(&mut out, request);
    out
}

pub(crate) fn plan_prompt(
    request: &GenerationRequest,
    research: &ResearchBrief,
    feedback: &[ReviewIssue],
) -> String {
    let mut out = String::new();
    request_header(&mut out, request);
    let _ = writeln!(out, "\nResearch:\n{}", research.summary);
    if !feedback.is_empty() {
        out.push_str("\nThe previous plan produced a draft that failed review. Address:\n");
        push_issues(&mut out, feedback);
    }
    out
}

pub(crate) fn section_prompt(brief: &SectionBrief<'_>) -> String {
    let mut out = String::new();
    request_header(&mut out, brief.request);
    let _ = writeln!(out, "Article: {}", brief.plan.title);
    let _ = writeln!(
        out,
        "\nWrite section {} of {}: \"{}\"",
        brief.index,
        brief.plan.sections.len(),
        brief.section.headline
    );
    if !brief.section.goal.is_empty() {
        let _ = writeln!(out, "Goal: {}", brief.section.goal);
    }
    for query in &brief.section.research_queries {
        let _ = writeln!(out, "Answer: {query}");
    }
    let _ = writeln!(out, "\nResearch:\n{}", brief.research.summary);
    if !brief.cross_reference.is_empty() {
        let _ = writeln!(out, "\n{}", brief.cross_reference);
    }
    if !brief.required_reminder.is_empty() {
        let _ = writeln!(out, "\n{}", brief.required_reminder);
    }
    out
}

pub(crate) fn review_prompt(draft: &Draft, plan: &ContentPlan) -> String {
    let mut out = String::new();
    if !plan.required_elements.is_empty() {
        let required: Vec<&str> = plan.required_elements.iter().map(|e| e.as_str()).collect();
        let _ = writeln!(out, "Required elements: {}\n", required.join(", "));
    }
    out.push_str(&draft.to_markdown());
    out
}

pub(crate) fn fix_prompt(draft: &Draft, issues: &[ReviewIssue]) -> String {
    let mut out = String::from("Issues:\n");
    push_issues(&mut out, issues);
    out.push_str("\nDraft:\n");
    out.push_str(&draft.to_markdown());
    out
}

fn push_issues(out: &mut String, issues: &[ReviewIssue]) {
    for issue in issues {
        match &issue.section {
            Some(section) => {
                let _ = writeln!(out, "- [{}] ({section}) {}", issue.severity, issue.description);
            }
            None => {
                let _ = writeln!(out, "- [{}] {}", issue.severity, issue.description);
            }
        }
    }
}
