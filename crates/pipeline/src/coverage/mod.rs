//! Cross-section coverage tracking.
//!
//! A multi-section document is written one section at a time. After each
//! section the tracker folds the section's text into a [`SectionWriteState`]:
//! which topics were introduced (and where first), which plan-mandated
//! elements are satisfied, and which terms were formally defined. Before the
//! next section is written, the state is rendered back into guidance blocks
//! ([`build_cross_reference_context`], [`build_required_elements_reminder`])
//! so the writer neither repeats itself nor forgets a required element.
//!
//! Every function here is pure and total. Text from which nothing can be
//! extracted simply yields an empty result.
//!
//! The free functions use [`CoverageConfig::default`]. Use a
//! [`CoverageTracker`] to apply tuned thresholds or filler lists.

mod extract;
mod render;


use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::RequiredElement;
use extract::TopicFilter;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for topic extraction.
///
/// The defaults reproduce the empirically tuned behavior: topics of 2 to 60
/// characters, capitalized phrases counted once they recur three times, and a
/// small list of determiner + generic-noun filler pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Shortest accepted topic, in characters.
    pub min_topic_chars: usize,
    /// Longest accepted topic, in characters.
    pub max_topic_chars: usize,
    /// Occurrences needed before an un-emphasized capitalized phrase counts.
    pub recurrence_threshold: usize,
    /// Articles and determiners that open filler phrases ("The", "In").
    pub filler_leading_words: Vec<String>,
    /// Generic nouns that close filler phrases ("Game", "Example").
    pub filler_trailing_words: Vec<String>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| (*w).to_string()).collect();
        Self {
            min_topic_chars: 2,
            max_topic_chars: 60,
            recurrence_threshold: 3,
            filler_leading_words: words(&[
                "the", "a", "an", "in", "on", "at", "for", "this", "that", "these", "those",
                "our", "your", "its", "of", "to", "by", "with", "from",
            ]),
            filler_trailing_words: words(&[
                "game", "first", "second", "third", "last", "next", "this", "that", "example",
                "instance", "end", "way", "best", "same", "other", "rest", "start", "following",
                "most", "above", "below", "top", "bottom", "time", "case", "world", "player",
            ]),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A concept already written about, attributed to the first section that
/// introduced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoveredTopic {
    /// Lowercase key; unique within [`SectionWriteState::covered_topics`].
    pub key: String,
    /// The topic as it was first written (case preserved).
    pub label: String,
    /// Headline of the section that introduced the topic.
    pub section_headline: String,
    /// 1-based index of the section that introduced the topic.
    pub section_index: u32,
}

/// Cumulative cross-section memory for one generation run.
///
/// Created empty by [`create_initial_section_write_state`]; each written
/// section produces a new state through [`update_section_write_state`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionWriteState {
    /// Topics keyed by lowercase label. First write wins.
    pub covered_topics: BTreeMap<String, CoveredTopic>,
    /// Lowercase labels of required elements satisfied so far.
    pub covered_elements: BTreeSet<String>,
    /// Emphasized terms introduced so far, case-insensitively unique.
    pub defined_terms: BTreeSet<String>,
    /// Sections folded into this state.
    pub sections_written: u32,
}

impl SectionWriteState {
    /// Returns the topic recorded under `key` (any casing).
    pub fn topic(&self, key: &str) -> Option<&CoveredTopic> {
        self.covered_topics.get(&key.to_lowercase())
    }

    fn has_defined_term(&self, term: &str) -> bool {
        let wanted = term.to_lowercase();
        self.defined_terms
            .iter()
            .any(|existing| existing.to_lowercase() == wanted)
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Coverage operations bound to one [`CoverageConfig`].
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    filter: TopicFilter,
}

impl CoverageTracker {
    /// Creates a tracker with the given tuning.
    pub fn new(config: &CoverageConfig) -> Self {
        Self {
            filter: TopicFilter::new(config),
        }
    }

    /// Candidate topics from all three extraction rules, de-duplicated
    /// case-insensitively in first-appearance order.
    pub fn extract_covered_topics(&self, text: &str) -> Vec<String> {
        extract::covered_topics(&self.filter, text)
    }

    /// Emphasized terms only.
    pub fn extract_defined_terms(&self, text: &str) -> Vec<String> {
        extract::defined_terms(&self.filter, text)
    }

    /// Folds one written section into a new state; `state` is not modified.
    ///
    /// Empty or whitespace-only `text` yields an unchanged copy.
    pub fn update_section_write_state(
        &self,
        state: &SectionWriteState,
        text: &str,
        section_headline: &str,
        explicit_elements: Option<&[RequiredElement]>,
    ) -> SectionWriteState {
        let mut next = state.clone();
        if text.trim().is_empty() {
            return next;
        }

        let section_index = state.sections_written + 1;
        for label in self.extract_covered_topics(text) {
            let key = label.to_lowercase();
            next.covered_topics
                .entry(key.clone())
                .or_insert_with(|| CoveredTopic {
                    key,
                    label,
                    section_headline: section_headline.to_string(),
                    section_index,
                });
        }

        for element in explicit_elements.unwrap_or_default() {
            next.covered_elements.insert(element.normalized());
        }

        for term in self.extract_defined_terms(text) {
            if !next.has_defined_term(&term) {
                next.defined_terms.insert(term);
            }
        }

        next.sections_written = section_index;
        next
    }
}

impl Default for CoverageTracker {
    fn default() -> Self {
        Self::new(&CoverageConfig::default())
    }
}

static DEFAULT_TRACKER: LazyLock<CoverageTracker> = LazyLock::new(CoverageTracker::default);

// ---------------------------------------------------------------------------
// Module-level operations (default configuration)
// ---------------------------------------------------------------------------

/// See [`CoverageTracker::extract_covered_topics`].
pub fn extract_covered_topics(text: &str) -> Vec<String> {
    DEFAULT_TRACKER.extract_covered_topics(text)
}

/// See [`CoverageTracker::extract_defined_terms`].
pub fn extract_defined_terms(text: &str) -> Vec<String> {
    DEFAULT_TRACKER.extract_defined_terms(text)
}

/// Returns an empty state for a new generation run.
pub fn create_initial_section_write_state() -> SectionWriteState {
    SectionWriteState::default()
}

/// See [`CoverageTracker::update_section_write_state`].
pub fn update_section_write_state(
    state: &SectionWriteState,
    text: &str,
    section_headline: &str,
    explicit_elements: Option<&[RequiredElement]>,
) -> SectionWriteState {
    DEFAULT_TRACKER.update_section_write_state(state, text, section_headline, explicit_elements)
}

/// Renders the "already covered" guidance for the next section.
///
/// Returns an empty string while no section has been written.
pub fn build_cross_reference_context(state: &SectionWriteState) -> String {
    render::cross_reference_context(state)
}

/// Case-insensitive membership test against `covered_elements`.
pub fn is_element_covered(state: &SectionWriteState, element: &RequiredElement) -> bool {
    state.covered_elements.contains(&element.normalized())
}

/// The subset of `required` not yet covered, in input order.
pub fn get_uncovered_elements(
    state: &SectionWriteState,
    required: &[RequiredElement],
) -> Vec<RequiredElement> {
    required
        .iter()
        .filter(|element| !is_element_covered(state, element))
        .cloned()
        .collect()
}

/// Renders a reminder of every uncovered required element.
///
/// Returns an empty string when all of `required` is covered. When
/// `priority_for_this_section` is supplied, its still-uncovered elements are
/// repeated under a separate "MUST COVER IN THIS SECTION" block.
pub fn build_required_elements_reminder(
    state: &SectionWriteState,
    required: &[RequiredElement],
    priority_for_this_section: Option<&[RequiredElement]>,
) -> String {
    let uncovered = get_uncovered_elements(state, required);
    if uncovered.is_empty() {
        return String::new();
    }
    let priority = priority_for_this_section
        .map(|priority| get_uncovered_elements(state, priority))
        .unwrap_or_default();
    render::required_elements_reminder(&uncovered, &priority)
}

/// Required elements that `text` mentions (case-insensitive, whole words).
pub fn mentioned_elements(text: &str, required: &[RequiredElement]) -> Vec<RequiredElement> {
    let haystack = text.to_lowercase();
    required
        .iter()
        .filter(|element| extract::contains_word_bounded(&haystack, &element.normalized()))
        .cloned()
        .collect()
}

/// Required elements that `text` never mentions, in input order.
pub fn required_elements_missing_from(
    text: &str,
    required: &[RequiredElement],
) -> Vec<RequiredElement> {
    let haystack = text.to_lowercase();
    required
        .iter()
        .filter(|element| !extract::contains_word_bounded(&haystack, &element.normalized()))
        .cloned()
        .collect()
}
