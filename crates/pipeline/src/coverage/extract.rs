//! Topic extraction rules over rendered section markdown.
//!
//! Three independent rules run over the same text:
//!
//! 1. emphasized spans (`**term**` and `__term__` are equivalent);
//! 2. quoted Title-Case phrases (`"Tears of the Kingdom"`, `“Fuse”`);
//! 3. capitalized multi-word phrases that recur at least
//!    [`CoverageConfig::recurrence_threshold`] times.
//!
//! Candidates then pass the length bounds and the filler-phrase filter.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::CoverageConfig;

static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*([^*\n]+?)\*\*|__([^_\n]+?)__").expect("emphasis pattern is valid")
});

static QUOTED_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    let word = r"\p{Lu}[\p{L}\p{N}'’\-]*";
    let connector = r"(?:of|the|and|in|on|for|to|a|an|with)";
    Regex::new(&format!(
        r#"["“]({word}(?:\s+(?:{connector}\s+)*{word})*)["”]"#
    ))
    .expect("quoted title pattern is valid")
});

static CAPITALIZED_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\p{Lu}\p{Ll}+(?:[ \t]+\p{Lu}\p{Ll}+)+\b")
        .expect("capitalized phrase pattern is valid")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ':', ';', '!', '?', '(', ')', '"', '\''];

/// Candidate filters derived from a [`CoverageConfig`].
#[derive(Debug, Clone)]
pub(crate) struct TopicFilter {
    min_chars: usize,
    max_chars: usize,
    recurrence_threshold: usize,
    leading: HashSet<String>,
    trailing: HashSet<String>,
}

impl TopicFilter {
    pub(crate) fn new(config: &CoverageConfig) -> Self {
        let lower = |words: &[String]| -> HashSet<String> {
            words.iter().map(|w| w.trim().to_lowercase()).collect()
        };
        Self {
            min_chars: config.min_topic_chars,
            max_chars: config.max_topic_chars,
            recurrence_threshold: config.recurrence_threshold.max(1),
            leading: lower(&config.filler_leading_words),
            trailing: lower(&config.filler_trailing_words),
        }
    }

    /// Returns `true` if `candidate` is worth tracking.
    pub(crate) fn accepts(&self, candidate: &str) -> bool {
        let chars = candidate.chars().count();
        if chars < self.min_chars || chars > self.max_chars {
            return false;
        }
        !self.is_filler(candidate)
    }

    fn is_filler(&self, candidate: &str) -> bool {
        let words: Vec<String> = candidate
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        match words.as_slice() {
            [only] => self.leading.contains(only),
            [first, second] => self.leading.contains(first) && self.trailing.contains(second),
            _ => false,
        }
    }

    /// Drops a leading determiner ("The Master Sword" -> "Master Sword").
    fn strip_leading_determiner<'a>(&self, phrase: &'a str) -> &'a str {
        match phrase.split_once(char::is_whitespace) {
            Some((first, rest)) if self.leading.contains(&first.to_lowercase()) => {
                rest.trim_start()
            }
            _ => phrase,
        }
    }
}

/// Ordered, case-insensitively de-duplicated candidate collector.
#[derive(Default)]
struct Candidates {
    seen: HashSet<String>,
    values: Vec<String>,
}

impl Candidates {
    fn push(&mut self, filter: &TopicFilter, raw: &str) {
        let candidate = clean(raw);
        if candidate.is_empty() || !filter.accepts(&candidate) {
            return;
        }
        if self.seen.insert(candidate.to_lowercase()) {
            self.values.push(candidate);
        }
    }
}

/// Collapses inner whitespace and trims surrounding punctuation.
fn clean(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(TRAILING_PUNCTUATION)
        .trim()
        .to_string()
}

fn emphasized_spans(text: &str) -> impl Iterator<Item = &str> {
    EMPHASIS.captures_iter(text).filter_map(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
    })
}

/// Emphasized spans only.
pub(crate) fn defined_terms(filter: &TopicFilter, text: &str) -> Vec<String> {
    let mut out = Candidates::default();
    for span in emphasized_spans(text) {
        out.push(filter, span);
    }
    out.values
}

/// All three extraction rules, in rule order then first-appearance order.
pub(crate) fn covered_topics(filter: &TopicFilter, text: &str) -> Vec<String> {
    let mut out = Candidates::default();

    for span in emphasized_spans(text) {
        out.push(filter, span);
    }

    for caps in QUOTED_TITLE.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            out.push(filter, m.as_str());
        }
    }

    for phrase in recurring_phrases(filter, text) {
        out.push(filter, &phrase);
    }

    out.values
}

/// Capitalized phrases of two or more words seen at least
/// `recurrence_threshold` times, in first-appearance order.
///
/// Every match also counts its shorter suffixes, so a sentence-initial word
/// glued onto an entity ("Visit Hyrule Castle", "Leave Hyrule Castle") still
/// counts toward "Hyrule Castle". A suffix is dropped when a longer qualifying
/// phrase ending in it has the same count.
fn recurring_phrases(filter: &TopicFilter, text: &str) -> Vec<String> {
    // Emphasis markers would otherwise split or glue phrases.
    let plain = text.replace("**", " ").replace("__", " ");
    let mut counts: HashMap<String, (usize, String)> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for m in CAPITALIZED_PHRASE.find_iter(&plain) {
        let words: Vec<&str> = filter
            .strip_leading_determiner(m.as_str())
            .split_whitespace()
            .collect();
        for first in 0..words.len().saturating_sub(1) {
            let phrase = words[first..].join(" ");
            let key = phrase.to_lowercase();
            let entry = counts.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                (0, phrase)
            });
            entry.0 += 1;
        }
    }

    let qualifying: Vec<&String> = order
        .iter()
        .filter(|key| counts[*key].0 >= filter.recurrence_threshold)
        .collect();
    qualifying
        .iter()
        .filter(|key| {
            let count = counts[**key].0;
            !qualifying.iter().any(|longer| {
                longer.len() > key.len()
                    && longer.ends_with(&format!(" {key}"))
                    && counts[*longer].0 == count
            })
        })
        .map(|key| counts[*key].1.clone())
        .collect()
}

/// Returns `true` if `needle` (already lowercase) occurs in `haystack`
/// (already lowercase) on word boundaries.
pub(crate) fn contains_word_bounded(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    haystack.match_indices(needle).any(|(start, matched)| {
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_word(c));
        let after_ok = haystack[start + matched.len()..]
            .chars()
            .next()
            .map_or(true, |c| !is_word(c));
        before_ok && after_ok
    })
}
