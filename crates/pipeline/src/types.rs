//! Value types shared across the pipeline: usage accounting, review
//! findings, wall-clock stamps, and the cancellation flag.

use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Usage accounting
// ---------------------------------------------------------------------------

/// Tokens billed for one or more model calls. Addition saturates.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenCount(u64);

impl TokenCount {
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} tokens", self.0)
    }
}

impl Add for TokenCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for TokenCount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for TokenCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Spend in US dollars. Always finite and non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCost(f64);

impl TokenCost {
    /// `None` for negative, infinite, or NaN amounts.
    #[must_use]
    pub fn new(usd: f64) -> Option<Self> {
        (usd.is_finite() && usd >= 0.0).then_some(Self(usd))
    }

    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn usd(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for TokenCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.4}", self.0)
    }
}

impl Add for TokenCost {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TokenCost {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for TokenCost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

// ---------------------------------------------------------------------------
// Review findings
// ---------------------------------------------------------------------------

/// Severity level of a [`ReviewIssue`].
///
/// Ordered from most to least severe so that sorting a list of issues puts
/// critical findings first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// The draft is wrong or unusable as written.
    Critical,
    /// The draft has a significant gap that must be repaired.
    Major,
    /// Cosmetic or stylistic finding.
    Minor,
}

impl IssueSeverity {
    /// Returns the lowercase wire name of this severity.
    pub fn as_str(self) -> &'static str {
        match self {
            IssueSeverity::Critical => "critical",
            IssueSeverity::Major => "major",
            IssueSeverity::Minor => "minor",
        }
    }
}

impl std::fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IssueSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(IssueSeverity::Critical),
            "major" => Ok(IssueSeverity::Major),
            "minor" => Ok(IssueSeverity::Minor),
            other => Err(format!("unknown issue severity '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------

/// A single finding produced by the reviewer or by draft validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssue {
    /// Severity of this finding.
    pub severity: IssueSeverity,

    /// Human-readable description of the finding.
    pub description: String,

    /// Headline of the section the finding relates to.
    ///
    /// `None` for findings about the document as a whole.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl ReviewIssue {
    /// Creates a document-level issue.
    pub fn new(severity: IssueSeverity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
            section: None,
        }
    }

    /// Attaches the headline of the section this issue relates to.
    #[must_use]
    pub fn in_section(mut self, headline: impl Into<String>) -> Self {
        self.section = Some(headline.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Wall-clock instant recorded in run metadata (RFC 3339 on display).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation signal shared between a caller and a running
/// generation.
///
/// Cloning shares the same underlying flag. The orchestrator polls it at
/// every phase boundary and before each section.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
