//! Validation of loosely-typed model output.
//!
//! Models answer with JSON, sometimes wrapped in a markdown fence or
//! surrounded by prose. Everything here turns that text into typed pipeline
//! values or a [`PayloadError`]; nothing unvalidated crosses into the
//! orchestrator.

use pipeline::{
    CollaboratorError, ContentPlan, Draft, FixAttempt, IssueSeverity, PlannedSection,
    RequiredElement, ResearchBrief, ReviewIssue, ReviewVerdict, SectionHeadline,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Reasons a model payload is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// No JSON object or array was found in the output.
    #[error("model output contains no JSON payload")]
    NoJson,

    /// The JSON did not match the expected shape.
    #[error("malformed {what} payload: {message}")]
    Malformed {
        /// Payload kind being parsed.
        what: &'static str,
        /// Deserializer diagnostic.
        message: String,
    },

    /// A required text field was blank.
    #[error("{field} must not be empty")]
    EmptyField {
        /// Path of the blank field.
        field: String,
    },

    /// A review issue named a severity outside the known set.
    #[error("unknown severity '{0}'")]
    UnknownSeverity(String),
}

impl From<PayloadError> for CollaboratorError {
    fn from(err: PayloadError) -> Self {
        CollaboratorError::InvalidPayload {
            message: err.to_string(),
        }
    }
}

/// Returns the JSON payload inside `text`.
///
/// A fenced block (```` ```json ```` or a bare ```` ``` ````) wins when it
/// holds a complete value. Otherwise the first position where a complete
/// JSON value parses is used, objects before arrays, so bracketed prose such
/// as a `[1]` citation ahead of the payload is skipped. When nothing parses,
/// the widest bracketed span is returned so the caller can report why.
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(json) = fenced_block(text).and_then(first_complete_value) {
        return Some(json);
    }
    first_complete_value(text).or_else(|| widest_bracketed_span(text))
}

fn first_complete_value(text: &str) -> Option<&str> {
    ['{', '['].into_iter().find_map(|opener| {
        text.match_indices(opener).find_map(|(start, _)| {
            let candidate = &text[start..];
            let mut values =
                serde_json::Deserializer::from_str(candidate).into_iter::<serde_json::Value>();
            match values.next() {
                Some(Ok(_)) => Some(&candidate[..values.byte_offset()]),
                _ => None,
            }
        })
    })
}

fn widest_bracketed_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closing = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closing)?;
    (end > start).then(|| &text[start..=end])
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line.
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn decode<T: DeserializeOwned>(text: &str, what: &'static str) -> Result<T, PayloadError> {
    let json = extract_json_block(text).ok_or(PayloadError::NoJson)?;
    serde_json::from_str(json).map_err(|e| PayloadError::Malformed {
        what,
        message: e.to_string(),
    })
}

fn non_empty(value: String, field: impl Into<String>) -> Result<String, PayloadError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PayloadError::EmptyField {
            field: field.into(),
        });
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WireResearch {
    summary: String,
    #[serde(default)]
    sources: Vec<String>,
}

#[derive(Deserialize)]
struct WirePlan {
    title: String,
    sections: Vec<WireSection>,
    #[serde(default)]
    required_elements: Vec<String>,
}

#[derive(Deserialize)]
struct WireSection {
    headline: String,
    #[serde(default)]
    goal: String,
    #[serde(default)]
    research_queries: Vec<String>,
    #[serde(default)]
    must_cover: Vec<String>,
}

#[derive(Deserialize)]
struct WireReview {
    approved: bool,
    #[serde(default)]
    issues: Vec<WireIssue>,
}

#[derive(Deserialize)]
struct WireIssue {
    severity: String,
    description: String,
    #[serde(default)]
    section: Option<String>,
}

#[derive(Deserialize)]
struct WireFix {
    markdown: String,
    #[serde(default)]
    description: String,
    applied: bool,
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Parses a scout answer.
pub fn parse_research(text: &str) -> Result<ResearchBrief, PayloadError> {
    let wire: WireResearch = decode(text, "research")?;
    Ok(ResearchBrief {
        summary: non_empty(wire.summary, "summary")?,
        sources: wire
            .sources
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    })
}

/// Parses an editor answer. Blank required elements are dropped; blank
/// headlines are an error.
pub fn parse_plan(text: &str) -> Result<ContentPlan, PayloadError> {
    let wire: WirePlan = decode(text, "plan")?;
    let sections = wire
        .sections
        .into_iter()
        .enumerate()
        .map(|(i, section)| {
            let headline = SectionHeadline::new(section.headline).ok_or_else(|| {
                PayloadError::EmptyField {
                    field: format!("sections[{i}].headline"),
                }
            })?;
            Ok(PlannedSection {
                headline,
                goal: section.goal.trim().to_string(),
                research_queries: section.research_queries,
                must_cover: elements(section.must_cover),
            })
        })
        .collect::<Result<Vec<_>, PayloadError>>()?;

    Ok(ContentPlan {
        title: non_empty(wire.title, "title")?,
        sections,
        required_elements: elements(wire.required_elements),
    })
}

fn elements(raw: Vec<String>) -> Vec<RequiredElement> {
    raw.into_iter().filter_map(RequiredElement::new).collect()
}

/// Parses a reviewer answer.
pub fn parse_review(text: &str) -> Result<ReviewVerdict, PayloadError> {
    let wire: WireReview = decode(text, "review")?;
    let issues = wire
        .issues
        .into_iter()
        .enumerate()
        .map(|(i, issue)| {
            let severity: IssueSeverity = issue
                .severity
                .parse()
                .map_err(|_| PayloadError::UnknownSeverity(issue.severity.clone()))?;
            let description = non_empty(issue.description, format!("issues[{i}].description"))?;
            let mut parsed = ReviewIssue::new(severity, description);
            if let Some(section) = issue.section.filter(|s| !s.trim().is_empty()) {
                parsed = parsed.in_section(section.trim());
            }
            Ok(parsed)
        })
        .collect::<Result<Vec<_>, PayloadError>>()?;

    Ok(if wire.approved {
        ReviewVerdict::Approved { notes: issues }
    } else {
        ReviewVerdict::Rejected { issues }
    })
}

/// Parses a fixer answer.
pub fn parse_fix(text: &str) -> Result<FixAttempt, PayloadError> {
    let wire: WireFix = decode(text, "fix")?;
    let markdown = non_empty(wire.markdown, "markdown")?;
    Ok(FixAttempt {
        draft: Draft::from_markdown(&markdown),
        description: wire.description.trim().to_string(),
        applied: wire.applied,
    })
}
