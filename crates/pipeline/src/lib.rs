//! Core generation domain for Folio.
//!
//! This crate contains every domain concept, shared value type, error type,
//! and port trait used by the research → plan → write → review → repair
//! pipeline. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no network or
//! file I/O. It defines *what* is needed; infrastructure crates define *how*
//! to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`GenerationRunId`, `RequiredElement`, ...) |
//! | [`types`] | Shared value types (`TokenCount`, `TokenCost`, `ReviewIssue`, ...) |
//! | [`errors`] | Error taxonomy and retry classification |
//! | [`retry`] | Composable retry strategy and executor |
//! | [`clock`] | Clock port plus system and manual implementations |
//! | [`phase_timer`] | Per-phase duration tracking |
//! | [`coverage`] | Cross-section coverage tracking |
//! | [`recovery`] | Repair-loop budgets and bookkeeping |
//! | [`content`] | Plan, draft, and review payloads |
//! | [`ports`] | Collaborator traits |
//! | [`config`] | Run configuration |
//! | [`metadata`] | Persisted run summary |

pub mod clock;
pub mod config;
pub mod content;
pub mod coverage;
pub mod errors;
pub mod identifiers;
pub mod metadata;
pub mod phase_timer;
pub mod ports;
pub mod recovery;
pub mod retry;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FetchSettings, FolioConfig, RetrySettings, DEFAULT_MAX_ASSET_BYTES};
pub use content::{
    ContentPlan, Draft, DraftSection, FixAttempt, GenerationRequest, PlannedSection,
    ResearchBrief, ReviewVerdict,
};
pub use coverage::{
    build_cross_reference_context, build_required_elements_reminder,
    create_initial_section_write_state, extract_covered_topics, extract_defined_terms,
    get_uncovered_elements, is_element_covered, mentioned_elements,
    required_elements_missing_from, update_section_write_state, CoverageConfig,
    CoverageTracker, CoveredTopic, SectionWriteState,
};
pub use errors::{CollaboratorError, FolioError, RetryPolicy, Retryable};
pub use identifiers::{GenerationRunId, RequiredElement, SectionHeadline};
pub use metadata::{GenerationMetadata, PhaseUsage};
pub use phase_timer::{PhaseName, PhaseTimer};
pub use ports::{
    AssetStore, Fixer, Generated, GenerationUsage, Planner, Researcher, Reviewer, SectionBrief,
    SectionWriter,
};
pub use recovery::{AppliedFix, RecoveryBudget, RecoveryState};
pub use retry::{retry_with_backoff, RetryStrategy};
pub use types::{CancellationFlag, IssueSeverity, ReviewIssue, Timestamp, TokenCost, TokenCount};
