//! Per-group optimization outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{GroupKey, ProcedureInterval};

/// Terminal state of one group, in the order the orchestrator tests them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    /// An interval is longer than the slot capacity. Nothing was packed.
    Infeasible,
    /// Single-room group passed through unchanged.
    Skipped,
    /// Lower bound already reaches the actual room count.
    #[serde(rename = "OK_NO_SAVINGS_POSSIBLE")]
    NoSavingsPossible,
    /// The greedy packing met the lower bound.
    #[serde(rename = "FFD_OPTIMAL")]
    HeuristicOptimal,
    /// The exact search produced the adopted packing.
    SolvedExactly,
    /// The exact search ran but the greedy packing was kept.
    HeuristicFallback,
}

impl GroupStatus {
    /// Whether slot assignments were written for this status.
    pub fn has_packing(self) -> bool {
        !matches!(self, GroupStatus::Infeasible | GroupStatus::Skipped)
    }

    /// Report tag.
    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Infeasible => "INFEASIBLE",
            GroupStatus::Skipped => "SKIPPED",
            GroupStatus::NoSavingsPossible => "OK_NO_SAVINGS_POSSIBLE",
            GroupStatus::HeuristicOptimal => "FFD_OPTIMAL",
            GroupStatus::SolvedExactly => "SOLVED_EXACTLY",
            GroupStatus::HeuristicFallback => "HEURISTIC_FALLBACK",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anesthesia FTE reductions for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnesthesiaSavings {
    /// Providers freed by room elimination.
    pub method1: usize,
    /// FTEs freed by shorter active room windows.
    pub method2: usize,
    /// Providers absorbable by colleagues.
    pub method3: usize,
    /// Sum of the enabled methods.
    pub total: usize,
}

impl AnesthesiaSavings {
    /// Builds a breakdown and its total.
    pub fn new(method1: usize, method2: usize, method3: usize) -> Self {
        Self {
            method1,
            method2,
            method3,
            total: method1 + method2 + method3,
        }
    }

    /// Adds another breakdown field by field.
    pub fn accumulate(&mut self, other: &Self) {
        self.method1 += other.method1;
        self.method2 += other.method2;
        self.method3 += other.method3;
        self.total += other.total;
    }
}

/// Result of optimizing one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupOutcome {
    /// Group identity.
    pub key: GroupKey,
    /// Member sites, hub first.
    pub sites: Vec<String>,
    /// Intervals with their slot assignments written.
    pub intervals: Vec<ProcedureInterval>,
    /// Distinct physical rooms used before optimization.
    pub actual_rooms: usize,
    /// Rooms used after optimization; `None` when infeasible.
    pub optimized_rooms: Option<usize>,
    /// `max(0, actual - optimized)`.
    pub rooms_saved: usize,
    /// Terminal state.
    pub status: GroupStatus,
    /// Authoritative lower bound (0 when not computed).
    pub lower_bound: usize,
    /// Anesthesia savings breakdown.
    pub anesthesia: AnesthesiaSavings,
    /// Regional surplus hours attributed to this group.
    pub surplus_staffing_hours: f64,
}

impl GroupOutcome {
    /// Creates an outcome without labor metrics.
    pub fn new(
        key: GroupKey,
        sites: Vec<String>,
        intervals: Vec<ProcedureInterval>,
        actual_rooms: usize,
        optimized_rooms: Option<usize>,
        status: GroupStatus,
    ) -> Self {
        let rooms_saved = optimized_rooms
            .map(|opt| actual_rooms.saturating_sub(opt))
            .unwrap_or(0);
        Self {
            key,
            sites,
            intervals,
            actual_rooms,
            optimized_rooms,
            rooms_saved,
            status,
            lower_bound: 0,
            anesthesia: AnesthesiaSavings::default(),
            surplus_staffing_hours: 0.0,
        }
    }

    /// Sets the lower bound.
    pub fn with_lower_bound(mut self, lower_bound: usize) -> Self {
        self.lower_bound = lower_bound;
        self
    }

    /// Sum of occupancy durations (minutes).
    pub fn total_minutes(&self) -> i64 {
        self.intervals.iter().map(|iv| iv.duration_min).sum()
    }

    /// Distinct anesthesia providers in the group.
    pub fn provider_count(&self) -> usize {
        let mut names: Vec<&str> = self
            .intervals
            .iter()
            .filter_map(ProcedureInterval::provider_name)
            .collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}
