//! Guidance blocks re-injected into the writer's prompt.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::{CoveredTopic, SectionWriteState};
use crate::RequiredElement;

pub(crate) const ALREADY_COVERED_HEADING: &str = "ALREADY COVERED IN PREVIOUS SECTIONS";
pub(crate) const DEFINED_TERMS_HEADING: &str = "PREVIOUSLY DEFINED TERMS";
pub(crate) const MISSING_ELEMENTS_HEADING: &str = "REQUIRED ELEMENTS NOT YET COVERED";
pub(crate) const MUST_COVER_HEADING: &str = "MUST COVER IN THIS SECTION";

pub(crate) fn cross_reference_context(state: &SectionWriteState) -> String {
    if state.sections_written == 0 {
        return String::new();
    }

    let mut by_section: BTreeMap<(u32, &str), Vec<&CoveredTopic>> = BTreeMap::new();
    for topic in state.covered_topics.values() {
        by_section
            .entry((topic.section_index, topic.section_headline.as_str()))
            .or_default()
            .push(topic);
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{ALREADY_COVERED_HEADING} (do not re-explain these; refer back to them briefly instead):"
    );
    if by_section.is_empty() {
        let _ = writeln!(out, "- No specific topics recorded so far.");
    }
    for ((index, headline), mut topics) in by_section {
        topics.sort_by(|a, b| a.key.cmp(&b.key));
        let labels: Vec<&str> = topics.iter().map(|t| t.label.as_str()).collect();
        let _ = writeln!(
            out,
            "- Section {index} \"{headline}\": {}",
            labels.join(", ")
        );
    }

    if !state.defined_terms.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{DEFINED_TERMS_HEADING} (already introduced; do not define them again):"
        );
        for term in &state.defined_terms {
            let _ = writeln!(out, "- {term}");
        }
    }

    out
}

pub(crate) fn required_elements_reminder(
    uncovered: &[RequiredElement],
    priority: &[RequiredElement],
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{MISSING_ELEMENTS_HEADING} (each must appear somewhere in the document):"
    );
    for element in uncovered {
        let _ = writeln!(out, "- {element}");
    }

    if !priority.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{MUST_COVER_HEADING}:");
        for element in priority {
            let _ = writeln!(out, "- {element}");
        }
    }

    out
}
