//! Typed payloads exchanged with the phase collaborators.
//!
//! Collaborators speak loosely-typed model output; adapters validate it into
//! these types at the boundary, before anything enters the orchestrator.

use serde::{Deserialize, Serialize};

use crate::{RequiredElement, ReviewIssue, SectionHeadline};

/// What the caller wants written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Subject of the document.
    pub topic: String,
    /// Intended readership, if the caller specified one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Free-form instructions passed through to every phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl GenerationRequest {
    /// Creates a request for `topic` with no audience or notes.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            audience: None,
            notes: None,
        }
    }
}

/// Output of the scout phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchBrief {
    /// Condensed findings.
    pub summary: String,
    /// Sources consulted, as URLs or citations.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// One section the editor planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSection {
    /// Section headline.
    pub headline: SectionHeadline,
    /// What the section must achieve.
    pub goal: String,
    /// Research queries the writer should answer.
    #[serde(default)]
    pub research_queries: Vec<String>,
    /// Required elements this section is responsible for.
    #[serde(default)]
    pub must_cover: Vec<RequiredElement>,
}

/// Output of the editor phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPlan {
    /// Document title.
    pub title: String,
    /// Sections in writing order.
    pub sections: Vec<PlannedSection>,
    /// Elements that must appear somewhere in the final document.
    #[serde(default)]
    pub required_elements: Vec<RequiredElement>,
}

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

/// One written section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSection {
    /// Section headline.
    pub headline: String,
    /// Section markdown without its heading line.
    pub body: String,
}

/// An assembled document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    /// Document title.
    pub title: String,
    /// Sections in document order.
    pub sections: Vec<DraftSection>,
}

impl Draft {
    /// Renders the draft as markdown: a `#` title, then one `##` heading per section.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        if !self.title.is_empty() {
            out.push_str("# ");
            out.push_str(&self.title);
            out.push_str("\n\n");
        }
        for section in &self.sections {
            out.push_str("## ");
            out.push_str(&section.headline);
            out.push_str("\n\n");
            out.push_str(section.body.trim());
            out.push_str("\n\n");
        }
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        out.push('\n');
        out
    }

    /// Parses markdown produced by [`to_markdown`](Self::to_markdown) or by a
    /// fixer that kept the same heading structure.
    ///
    /// Text before the first `##` heading that is not the `#` title is kept as
    /// an untitled leading section.
    pub fn from_markdown(markdown: &str) -> Self {
        let mut title = String::new();
        let mut sections: Vec<DraftSection> = Vec::new();
        let mut preamble = String::new();

        let mut fence: Option<&str> = None;

        for line in markdown.lines() {
            let marker = fence_marker(line);
            match (fence, marker) {
                (None, Some(open)) => fence = Some(open),
                (Some(open), Some(close)) if close == open => fence = None,
                _ => {}
            }
            let in_code = fence.is_some() || marker.is_some();

            if !in_code {
                if let Some(headline) = line.strip_prefix("## ") {
                    sections.push(DraftSection {
                        headline: headline.trim().to_string(),
                        body: String::new(),
                    });
                    continue;
                }
                if title.is_empty() && sections.is_empty() {
                    if let Some(heading) = line.strip_prefix("# ") {
                        title = heading.trim().to_string();
                        continue;
                    }
                }
            }
            let target = match sections.last_mut() {
                Some(section) => &mut section.body,
                None => &mut preamble,
            };
            target.push_str(line);
            target.push('\n');
        }

        for section in &mut sections {
            section.body = section.body.trim().to_string();
        }
        if !preamble.trim().is_empty() {
            sections.insert(
                0,
                DraftSection {
                    headline: String::new(),
                    body: preamble.trim().to_string(),
                },
            );
        }
        Self { title, sections }
    }
}

/// The fence kind a line opens or closes, if it is a code fence.
fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Review and repair
// ---------------------------------------------------------------------------

/// The reviewer's decision about a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ReviewVerdict {
    /// The draft may be published. `notes` are non-blocking findings.
    Approved {
        /// Non-blocking findings.
        #[serde(default)]
        notes: Vec<ReviewIssue>,
    },
    /// The draft must be repaired.
    Rejected {
        /// Findings that must be resolved.
        issues: Vec<ReviewIssue>,
    },
}

impl ReviewVerdict {
    /// `true` for [`ReviewVerdict::Approved`].
    pub fn is_approved(&self) -> bool {
        matches!(self, ReviewVerdict::Approved { .. })
    }

    /// The findings carried by either variant.
    pub fn issues(&self) -> &[ReviewIssue] {
        match self {
            ReviewVerdict::Approved { notes } => notes,
            ReviewVerdict::Rejected { issues } => issues,
        }
    }
}

/// Output of one fixer pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixAttempt {
    /// The repaired draft.
    pub draft: Draft,
    /// What was changed.
    pub description: String,
    /// Whether the fixer believes it addressed the issues it was given.
    pub applied: bool,
}
