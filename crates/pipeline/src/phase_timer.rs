//! Per-phase wall-clock timing.
//!
//! [`PhaseTimer`] records how long each [`PhaseName`] took during one
//! generation run. Only the most recent start/end pair of a phase counts: a
//! second [`start`](PhaseTimer::start) discards an unfinished earlier start,
//! and a second completed pair replaces the earlier duration.
//!
//! Every operation is total; there is no failure mode.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::Clock;

/// One named stage of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    /// Research.
    Scout,
    /// Planning.
    Editor,
    /// Per-section writing.
    Specialist,
    /// Automated review of the assembled draft.
    Reviewer,
    /// Deterministic checks of the draft against the plan.
    Validation,
    /// Repair of reviewer findings.
    Fixer,
}

impl PhaseName {
    /// Every phase, in pipeline order.
    pub const ALL: [PhaseName; 6] = [
        PhaseName::Scout,
        PhaseName::Editor,
        PhaseName::Specialist,
        PhaseName::Reviewer,
        PhaseName::Validation,
        PhaseName::Fixer,
    ];

    /// Returns the lowercase name used in logs and metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseName::Scout => "scout",
            PhaseName::Editor => "editor",
            PhaseName::Specialist => "specialist",
            PhaseName::Reviewer => "reviewer",
            PhaseName::Validation => "validation",
            PhaseName::Fixer => "fixer",
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhaseName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseName::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}

// ---------------------------------------------------------------------------

/// Accumulated phase durations for one generation run.
///
/// Durations are whole milliseconds. Phases never timed report `0`.
pub struct PhaseTimer {
    clock: Arc<dyn Clock>,
    durations: BTreeMap<PhaseName, u64>,
    started: HashMap<PhaseName, Instant>,
}

impl PhaseTimer {
    /// Creates an empty timer reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            durations: BTreeMap::new(),
            started: HashMap::new(),
        }
    }

    /// Marks `phase` as started now, replacing any unfinished earlier start.
    pub fn start(&mut self, phase: PhaseName) {
        self.started.insert(phase, self.clock.now());
    }

    /// Stops `phase`, records and returns its duration in milliseconds.
    ///
    /// Returns `0` and leaves the timer untouched when `phase` is not running.
    pub fn end(&mut self, phase: PhaseName) -> u64 {
        let Some(started) = self.started.remove(&phase) else {
            return 0;
        };
        let elapsed = self.clock.now().saturating_duration_since(started);
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.durations.insert(phase, ms);
        ms
    }

    /// Returns the recorded duration of `phase`, or `0` if none.
    pub fn duration(&self, phase: PhaseName) -> u64 {
        self.durations.get(&phase).copied().unwrap_or(0)
    }

    /// Returns the duration of every phase in pipeline order, zero-filled.
    pub fn durations(&self) -> BTreeMap<PhaseName, u64> {
        PhaseName::ALL
            .into_iter()
            .map(|phase| (phase, self.duration(phase)))
            .collect()
    }

    /// Sum of all recorded durations.
    pub fn total_duration(&self) -> u64 {
        self.durations
            .values()
            .fold(0u64, |total, ms| total.saturating_add(*ms))
    }

    /// `true` between a [`start`](Self::start) and its matching [`end`](Self::end).
    pub fn is_running(&self, phase: PhaseName) -> bool {
        self.started.contains_key(&phase)
    }

    /// `true` once a duration is recorded and the phase is not running again.
    pub fn is_completed(&self, phase: PhaseName) -> bool {
        self.durations.contains_key(&phase) && !self.is_running(phase)
    }

    /// Clears every recorded duration and unfinished start.
    pub fn reset(&mut self) {
        self.durations.clear();
        self.started.clear();
    }
}

impl std::fmt::Debug for PhaseTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseTimer")
            .field("durations", &self.durations)
            .field("running", &self.started.keys().collect::<Vec<_>>())
            .finish()
    }
}
