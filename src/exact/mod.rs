//! Exact packing formulation.
//!
//! Turns one group into a [`PackingModel`] and hands it to an
//! [`ExactSolver`] under a wall-clock budget.
//!
//! # Formulation
//!
//! Decision: slot `x[i] ∈ {0..S}` for every interval `i`, where `S` is the
//! group's actual room count.
//!
//! - Every interval sits in exactly one slot.
//! - Slot load ≤ capacity.
//! - Conflicting intervals (same-room safety rule applied) never share a
//!   slot.
//! - Single-site groups: slot `j + 1` used implies slot `j` used.
//! - Cluster groups: each slot belongs to a member site; a site counts as
//!   active when any of its slots is used.
//!
//! Objective: used slots, plus `1000 + k` for every active site `k` of a
//! cluster. Opening a satellite therefore costs far more than adding a slot
//! at a site that is already active, and the hub (k = 0) is the cheapest
//! site to activate.
//!
//! The solver backend is behind [`ExactSolver`]; the default is the
//! parallel branch-and-bound in [`BranchAndBoundSolver`].
//!
//! # Reference
//! - Martello & Toth (1990), "Knapsack Problems", Ch. 8 (bin packing)
//! - Gendreau et al. (2004), "Heuristics and lower bounds for the bin
//!   packing problem with conflicts", C&OR 31(3)

mod incumbent;
mod search;

pub use incumbent::SharedIncumbent;
pub use search::BranchAndBoundSolver;

use std::fmt;
use std::time::Duration;

use crate::conflict::ConflictGraph;
use crate::models::ProcedureInterval;

/// Cost of activating cluster member `k` (before adding `k`).
pub const SITE_WEIGHT_BASE: i64 = 1000;

/// An exact packing problem.
#[derive(Debug, Clone)]
pub struct PackingModel {
    durations: Vec<i64>,
    graph: ConflictGraph,
    capacity: i64,
    num_slots: usize,
    slot_site: Vec<usize>,
    site_names: Vec<String>,
    site_weights: Vec<i64>,
    lower_bound: usize,
}

impl PackingModel {
    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    /// Whether the model has no intervals.
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Occupancy duration of interval `i`.
    #[inline]
    pub fn duration(&self, i: usize) -> i64 {
        self.durations[i]
    }

    /// Conflict relation.
    pub fn graph(&self) -> &ConflictGraph {
        &self.graph
    }

    /// Slot capacity (minutes).
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Number of available slots.
    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Whether slots are spread over several sites.
    pub fn is_cluster(&self) -> bool {
        !self.site_weights.is_empty()
    }

    /// Site index of slot `j` (0 for single-site models).
    #[inline]
    pub fn site_of(&self, j: usize) -> usize {
        self.slot_site.get(j).copied().unwrap_or(0)
    }

    /// Number of sites.
    pub fn num_sites(&self) -> usize {
        self.site_weights.len().max(1)
    }

    /// Activation cost of site `s` (0 for single-site models).
    #[inline]
    pub fn site_weight(&self, s: usize) -> i64 {
        self.site_weights.get(s).copied().unwrap_or(0)
    }

    /// Site names of the slots, empty for single-site models.
    pub fn slot_site_names(&self) -> Vec<String> {
        if !self.is_cluster() {
            return Vec::new();
        }
        self.slot_site
            .iter()
            .map(|&s| self.site_names[s].clone())
            .collect()
    }

    /// Lower bound on the slot count.
    pub fn lower_bound(&self) -> usize {
        self.lower_bound
    }

    /// Total occupancy minutes.
    pub fn total_minutes(&self) -> i64 {
        self.durations.iter().sum()
    }

    /// Objective of an assignment; `None` if a slot index is out of range.
    pub fn objective(&self, slots: &[usize]) -> Option<i64> {
        let mut used = vec![false; self.num_slots];
        for &j in slots {
            *used.get_mut(j)? = true;
        }
        let mut active = vec![false; self.num_sites()];
        let mut value = 0i64;
        for (j, _) in used.iter().enumerate().filter(|(_, u)| **u) {
            value += 1;
            active[self.site_of(j)] = true;
        }
        for (s, on) in active.iter().enumerate() {
            if *on {
                value += self.site_weight(s);
            }
        }
        Some(value)
    }

    /// Whether an assignment is complete, in range, within capacity and
    /// conflict-free. Symmetry breaking is not checked.
    pub fn is_feasible(&self, slots: &[usize]) -> bool {
        if slots.len() != self.len() || slots.iter().any(|&j| j >= self.num_slots) {
            return false;
        }
        let mut load = vec![0i64; self.num_slots];
        for (i, &j) in slots.iter().enumerate() {
            load[j] += self.durations[i];
        }
        if load.iter().any(|&l| l > self.capacity) {
            return false;
        }
        (0..slots.len()).all(|a| {
            ((a + 1)..slots.len()).all(|b| slots[a] != slots[b] || !self.graph.conflicts(a, b))
        })
    }

    /// Wraps a feasible assignment with its objective.
    pub fn assignment(&self, slots: Vec<usize>) -> Option<Assignment> {
        let objective = self.objective(&slots)?;
        Some(Assignment { slots, objective })
    }
}

/// Builds a [`PackingModel`] from a group's intervals.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use or_consolidate::conflict::ConflictGraph;
/// use or_consolidate::exact::PackingModelBuilder;
/// use or_consolidate::models::{ProcedureInterval, TimeWindow};
///
/// let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
/// let intervals = vec![
///     ProcedureInterval::new("a", "S", date, "OR 1").with_patient_window(TimeWindow::new(480, 600)),
///     ProcedureInterval::new("b", "S", date, "OR 2").with_patient_window(TimeWindow::new(600, 700)),
/// ];
/// let graph = ConflictGraph::new(&intervals);
/// let model = PackingModelBuilder::new(&intervals, 480).with_slots(2).build(&graph);
/// assert_eq!(model.objective(&[0, 0]), Some(1));
/// ```
pub struct PackingModelBuilder<'a> {
    intervals: &'a [ProcedureInterval],
    capacity: i64,
    num_slots: Option<usize>,
    sites: Vec<String>,
    slot_sites: Vec<String>,
    lower_bound: usize,
}

impl<'a> PackingModelBuilder<'a> {
    /// Creates a builder. Without `with_slots` the model gets one slot per
    /// interval.
    pub fn new(intervals: &'a [ProcedureInterval], capacity: i64) -> Self {
        Self {
            intervals,
            capacity,
            num_slots: None,
            sites: Vec::new(),
            slot_sites: Vec::new(),
            lower_bound: 0,
        }
    }

    /// Sets the number of available slots.
    pub fn with_slots(mut self, num_slots: usize) -> Self {
        self.num_slots = Some(num_slots);
        self
    }

    /// Declares a cluster: member sites in preference order and the site of
    /// every slot.
    pub fn with_cluster_sites(mut self, sites: &[String], slot_sites: Vec<String>) -> Self {
        self.sites = sites.to_vec();
        self.slot_sites = slot_sites;
        self
    }

    /// Sets a known lower bound on the slot count.
    pub fn with_lower_bound(mut self, lower_bound: usize) -> Self {
        self.lower_bound = lower_bound;
        self
    }

    /// Builds the model.
    ///
    /// Slots whose site is not a listed member map to the hub.
    pub fn build(&self, graph: &ConflictGraph) -> PackingModel {
        let num_slots = self.num_slots.unwrap_or(self.intervals.len());
        let cluster = self.sites.len() > 1;

        let (slot_site, site_weights) = if cluster {
            let slot_site = (0..num_slots)
                .map(|j| {
                    self.slot_sites
                        .get(j)
                        .and_then(|name| self.sites.iter().position(|s| s == name))
                        .unwrap_or(0)
                })
                .collect();
            let weights = (0..self.sites.len())
                .map(|k| SITE_WEIGHT_BASE + k as i64)
                .collect();
            (slot_site, weights)
        } else {
            (vec![0; num_slots], Vec::new())
        };

        PackingModel {
            durations: self.intervals.iter().map(|iv| iv.duration_min).collect(),
            graph: graph.clone(),
            capacity: self.capacity,
            num_slots,
            slot_site,
            site_names: if cluster { self.sites.clone() } else { Vec::new() },
            site_weights,
            lower_bound: self.lower_bound,
        }
    }
}

/// A complete interval → slot assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Model slot of every interval.
    pub slots: Vec<usize>,
    /// Objective value.
    pub objective: i64,
}

impl Assignment {
    /// Number of distinct slots used.
    pub fn slot_count(&self) -> usize {
        let mut used = self.slots.clone();
        used.sort_unstable();
        used.dedup();
        used.len()
    }
}

/// Result of an exact solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveResult {
    /// Best assignment, proven optimal.
    Optimal(Assignment),
    /// Best assignment found before the search stopped.
    Feasible(Assignment),
    /// No assignment fits in the available slots.
    Infeasible,
    /// Stopped without an assignment or a proof.
    Unknown,
}

impl fmt::Display for SolveResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveResult::Optimal(a) => write!(f, "Optimal(objective={})", a.objective),
            SolveResult::Feasible(a) => write!(f, "Feasible(objective={})", a.objective),
            SolveResult::Infeasible => write!(f, "Infeasible"),
            SolveResult::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Why a solve stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Search space exhausted with an assignment.
    OptimalityProven,
    /// Search space exhausted without an assignment.
    InfeasibilityProven,
    /// Stopped by a limit.
    Aborted(String),
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::OptimalityProven => write!(f, "Optimality Proven"),
            TerminationReason::InfeasibilityProven => write!(f, "Infeasibility Proven"),
            TerminationReason::Aborted(why) => write!(f, "Aborted: {why}"),
        }
    }
}

/// Search counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStatistics {
    /// Nodes explored across all workers.
    pub nodes: u64,
    /// Incumbent improvements.
    pub solutions: u64,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

/// Outcome of [`ExactSolver::solve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveOutcome {
    /// Result.
    pub result: SolveResult,
    /// Termination reason.
    pub reason: TerminationReason,
    /// Counters.
    pub statistics: SearchStatistics,
}

impl SolveOutcome {
    /// Creates an outcome.
    pub fn new(result: SolveResult, reason: TerminationReason, statistics: SearchStatistics) -> Self {
        Self {
            result,
            reason,
            statistics,
        }
    }

    /// The assignment, if one was found.
    pub fn assignment(&self) -> Option<&Assignment> {
        match &self.result {
            SolveResult::Optimal(a) | SolveResult::Feasible(a) => Some(a),
            _ => None,
        }
    }

    /// Whether optimality was proven.
    pub fn is_optimal(&self) -> bool {
        matches!(self.result, SolveResult::Optimal(_))
    }
}

/// Exact packing backend.
///
/// Implementations must respect `budget` and never block past it.
pub trait ExactSolver: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Solves `model`, optionally warm-started from `hint` (a model slot per
    /// interval).
    fn solve(&self, model: &PackingModel, hint: Option<&[usize]>, budget: Duration) -> SolveOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;
    use chrono::NaiveDate;

    fn case(id: &str, site: &str, room: &str, start: i64, end: i64) -> ProcedureInterval {
        ProcedureInterval::new(id, site, NaiveDate::from_ymd_opt(2025, 8, 4).unwrap(), room)
            .with_patient_window(TimeWindow::new(start, end))
    }

    #[test]
    fn test_single_site_objective() {
        let intervals = vec![case("a", "S", "1", 0, 60), case("b", "S", "2", 30, 90)];
        let graph = ConflictGraph::new(&intervals);
        let model = PackingModelBuilder::new(&intervals, 480).with_slots(2).build(&graph);

        assert!(!model.is_cluster());
        assert_eq!(model.objective(&[0, 1]), Some(2));
        assert_eq!(model.objective(&[0, 2]), None);
        assert!(model.is_feasible(&[0, 1]));
        assert!(!model.is_feasible(&[1, 1]));
        assert!(model.slot_site_names().is_empty());
    }

    #[test]
    fn test_cluster_objective_prefers_hub() {
        let intervals = vec![case("a", "Hub", "1", 0, 60), case("b", "Sat", "1", 60, 120)];
        let graph = ConflictGraph::new(&intervals);
        let sites = vec!["Hub".to_string(), "Sat".to_string()];
        let model = PackingModelBuilder::new(&intervals, 480)
            .with_slots(2)
            .with_cluster_sites(&sites, vec!["Hub".into(), "Sat".into()])
            .build(&graph);

        assert!(model.is_cluster());
        assert_eq!(model.objective(&[0, 0]), Some(1001));
        assert_eq!(model.objective(&[1, 1]), Some(1002));
        assert_eq!(model.objective(&[0, 1]), Some(2003));
        assert_eq!(model.slot_site_names(), sites);
    }

    #[test]
    fn test_capacity_feasibility() {
        let intervals = vec![case("a", "S", "1", 0, 300), case("b", "S", "2", 300, 500)];
        let graph = ConflictGraph::new(&intervals);
        let model = PackingModelBuilder::new(&intervals, 480).with_slots(2).build(&graph);
        assert!(!model.is_feasible(&[0, 0]));
        assert!(model.is_feasible(&[1, 0]));
        assert!(!model.is_feasible(&[0]));
    }

    #[test]
    fn test_assignment_slot_count() {
        let a = Assignment {
            slots: vec![2, 0, 2, 2],
            objective: 2,
        };
        assert_eq!(a.slot_count(), 2);
    }
}
