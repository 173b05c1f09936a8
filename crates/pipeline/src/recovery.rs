//! Bookkeeping for the repair loop that follows a rejected draft.
//!
//! [`RecoveryState`] is only mutated when the reviewer rejects a draft. Both
//! retry dimensions are bounded by a [`RecoveryBudget`], which guarantees the
//! loop terminates.

use serde::{Deserialize, Serialize};

use crate::ReviewIssue;

/// Upper bounds for the two independent retry dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryBudget {
    /// Full plan regenerations allowed after the first plan.
    pub max_plan_retries: u32,
    /// Fixer passes allowed per plan attempt.
    pub max_fixer_iterations: u32,
}

impl Default for RecoveryBudget {
    fn default() -> Self {
        Self {
            max_plan_retries: 1,
            max_fixer_iterations: 2,
        }
    }
}

/// One fixer pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedFix {
    /// What the fixer changed.
    pub description: String,
    /// Whether the fixer reported the change as applied.
    pub success: bool,
}

/// Repair-loop counters and issue history for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryState {
    /// Plan regenerations performed.
    pub plan_retries: u32,
    /// Fixer passes performed, across all plan attempts.
    pub fixer_iterations: u32,
    /// Every fixer pass, in order.
    pub fixes_applied: Vec<AppliedFix>,
    /// Issues from the first rejection; `None` until a draft is rejected.
    pub initial_reviewer_issues: Option<Vec<ReviewIssue>>,
    /// Issues from the most recent review.
    pub final_reviewer_issues: Vec<ReviewIssue>,
}

impl RecoveryState {
    /// Records a rejection. The first call also captures the initial issues.
    pub fn record_rejection(&mut self, issues: &[ReviewIssue]) {
        if self.initial_reviewer_issues.is_none() {
            self.initial_reviewer_issues = Some(issues.to_vec());
        }
        self.final_reviewer_issues = issues.to_vec();
    }

    /// Records the non-blocking notes that accompanied an approval.
    pub fn record_approval(&mut self, notes: &[ReviewIssue]) {
        self.final_reviewer_issues = notes.to_vec();
    }

    /// Records one fixer pass.
    pub fn record_fix(&mut self, description: impl Into<String>, success: bool) {
        self.fixer_iterations += 1;
        self.fixes_applied.push(AppliedFix {
            description: description.into(),
            success,
        });
    }

    /// Records the start of a plan regeneration.
    pub fn record_plan_retry(&mut self) {
        self.plan_retries += 1;
    }

    /// `true` while another plan regeneration fits in `budget`.
    pub fn can_retry_plan(&self, budget: &RecoveryBudget) -> bool {
        self.plan_retries < budget.max_plan_retries
    }

    /// Returns `true` if any repair activity happened.
    pub fn was_recovery_needed(&self) -> bool {
        self.initial_reviewer_issues.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IssueSeverity;

    #[test]
    fn initial_issues_are_captured_once() {
        let mut state = RecoveryState::default();
        let first = vec![ReviewIssue::new(IssueSeverity::Critical, "wrong facts")];
        let second = vec![ReviewIssue::new(IssueSeverity::Minor, "typo")];

        state.record_rejection(&first);
        state.record_rejection(&second);

        assert_eq!(state.initial_reviewer_issues.as_deref(), Some(first.as_slice()));
        assert_eq!(state.final_reviewer_issues, second);
        assert!(state.was_recovery_needed());
    }

    #[test]
    fn plan_retry_budget_is_enforced() {
        let budget = RecoveryBudget {
            max_plan_retries: 1,
            max_fixer_iterations: 0,
        };
        let mut state = RecoveryState::default();
        assert!(state.can_retry_plan(&budget));
        state.record_plan_retry();
        assert!(!state.can_retry_plan(&budget));
    }

    #[test]
    fn fixes_accumulate_in_order() {
        let mut state = RecoveryState::default();
        state.record_fix("expanded intro", true);
        state.record_fix("could not source claim", false);
        assert_eq!(state.fixer_iterations, 2);
        assert_eq!(state.fixes_applied[1].description, "could not source claim");
        assert!(!state.fixes_applied[1].success);
    }
}
