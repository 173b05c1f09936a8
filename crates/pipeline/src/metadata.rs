//! Generation metadata: the persisted summary of one run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    GenerationRunId, GenerationUsage, PhaseName, RecoveryState, ReviewIssue, Timestamp, TokenCost,
    TokenCount,
};

/// Collaborator accounting for one phase, kept outside the phase timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseUsage {
    /// Collaborator calls made, including retried attempts that succeeded.
    pub calls: u32,
    /// Tokens consumed.
    pub tokens: TokenCount,
    /// Cost incurred.
    pub cost: TokenCost,
    /// Wall-clock time spent inside collaborator calls, in milliseconds.
    pub latency_ms: u64,
}

impl PhaseUsage {
    /// Adds one successful call.
    pub fn record(&mut self, usage: GenerationUsage, latency_ms: u64) {
        self.calls += 1;
        self.tokens += usage.tokens;
        self.cost += usage.cost;
        self.latency_ms = self.latency_ms.saturating_add(latency_ms);
    }
}

/// Externally observable summary of a generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Run identifier.
    pub run_id: GenerationRunId,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run finished.
    pub finished_at: Timestamp,
    /// Whether the final draft was approved.
    pub approved: bool,
    /// Duration of each phase's most recent execution, in milliseconds.
    pub phase_durations_ms: BTreeMap<PhaseName, u64>,
    /// Sum of `phase_durations_ms`.
    pub total_duration_ms: u64,
    /// Collaborator accounting per phase. Phases without calls are omitted.
    pub usage: BTreeMap<PhaseName, PhaseUsage>,
    /// Repair-loop counters and fix history.
    pub recovery: RecoveryState,
    /// Issues outstanding when the run finished.
    pub final_reviewer_issues: Vec<ReviewIssue>,
}

impl GenerationMetadata {
    /// Total tokens across all phases.
    pub fn total_tokens(&self) -> TokenCount {
        self.usage.values().map(|usage| usage.tokens).sum()
    }

    /// Total cost across all phases.
    pub fn total_cost(&self) -> TokenCost {
        self.usage.values().map(|usage| usage.cost).sum()
    }
}
