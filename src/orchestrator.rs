//! Per-group optimization and the full consolidation pipeline.
//!
//! # Algorithm
//!
//! Every group runs through the same checks, in order, and stops at the
//! first one that decides it:
//!
//! 1. **Infeasible**: a case is longer than the slot capacity.
//! 2. **Skipped**: single-room group and `skip_single_room` is set.
//! 3. **No savings possible**: the lower bound reaches the actual rooms.
//! 4. **FFD optimal**: the greedy packing meets the lower bound.
//! 5. **Exact solve**: the search result is adopted when it beats the
//!    greedy packing, otherwise the greedy packing is kept.
//!
//! Groups are independent and are fanned out over a `rayon` pool. The
//! exact backend is an [`ExactSolver`] trait object, so any backend can
//! be plugged in without touching the packers.
//!
//! # Reference
//! Martello & Toth (1990), "Knapsack Problems: Algorithms and Computer
//! Implementations", Ch. 8: Bin-packing problem

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ConsolidationConfig, SiteLayout};
use crate::conflict::ConflictGraph;
use crate::error::Result;
use crate::exact::{BranchAndBoundSolver, ExactSolver, PackingModelBuilder};
use crate::grouping::group_intervals;
use crate::labor::{AnesthesiaCalculator, StaffingBalancer};
use crate::models::{
    GroupKey, GroupOutcome, GroupStatus, ProcedureInterval, RegionalStaffingRecord, ResourceGroup,
    RoomKey, StaffingHours,
};
use crate::packing::{apply_default_mapping, site_of_slot, FirstFitDecreasing, LowerBound, SlotPlan};
use crate::summary::SummaryMetrics;
use crate::validation::validate_intervals;

/// Everything one consolidation run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationReport {
    /// Per-group outcomes sorted by group name, then date.
    pub outcomes: Vec<GroupOutcome>,
    /// Regional staffing balance per (region, date).
    pub staffing: Vec<RegionalStaffingRecord>,
    /// Global aggregates.
    pub summary: SummaryMetrics,
}

/// Optimizes groups of procedure intervals into consolidated rooms.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use or_consolidate::config::ConsolidationConfig;
/// use or_consolidate::models::{GroupStatus, ProcedureInterval, TimeWindow};
/// use or_consolidate::orchestrator::Consolidator;
///
/// let date = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
/// let cases = vec![
///     ProcedureInterval::new("a", "Main", date, "OR 1").with_patient_window(TimeWindow::new(480, 600)),
///     ProcedureInterval::new("b", "Main", date, "OR 2").with_patient_window(TimeWindow::new(600, 720)),
/// ];
/// let outcomes = Consolidator::new(ConsolidationConfig::new())?.optimize(cases)?;
/// assert_eq!(outcomes[0].optimized_rooms, Some(1));
/// assert_eq!(outcomes[0].status, GroupStatus::HeuristicOptimal);
/// # Ok::<(), or_consolidate::error::Error>(())
/// ```
#[derive(Clone)]
pub struct Consolidator {
    config: ConsolidationConfig,
    layout: SiteLayout,
    anesthesia: AnesthesiaCalculator,
    solver: Arc<dyn ExactSolver>,
}

impl std::fmt::Debug for Consolidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consolidator")
            .field("config", &self.config)
            .field("solver", &self.solver.name())
            .finish()
    }
}

impl Consolidator {
    /// Validates the configuration and creates a consolidator with the
    /// branch-and-bound backend.
    pub fn new(config: ConsolidationConfig) -> Result<Self> {
        let layout = config.validate()?;
        let solver = Arc::new(BranchAndBoundSolver::new(config.search_workers));
        Ok(Self {
            anesthesia: AnesthesiaCalculator::new(&config),
            config,
            layout,
            solver,
        })
    }

    /// Replaces the exact backend.
    pub fn with_solver(mut self, solver: impl ExactSolver + 'static) -> Self {
        self.solver = Arc::new(solver);
        self
    }

    /// Run configuration.
    pub fn config(&self) -> &ConsolidationConfig {
        &self.config
    }

    /// Validated site lookup tables.
    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    /// Validates the input, optimizes every group and derives the labor
    /// metrics.
    pub fn run(
        &self,
        intervals: Vec<ProcedureInterval>,
        staffing: &[StaffingHours],
    ) -> Result<ConsolidationReport> {
        validate_intervals(&intervals)?;

        let mut outcomes = self.optimize(intervals)?;

        let balancer = StaffingBalancer::new(&self.layout, &self.config);
        let records = balancer.balance(&outcomes, staffing);
        balancer.distribute(&mut outcomes, &records);
        let summary = SummaryMetrics::calculate(
            &outcomes,
            self.config.slot_capacity_minutes,
            balancer.summarize(&records),
        );

        Ok(ConsolidationReport {
            outcomes,
            staffing: records,
            summary,
        })
    }

    /// Groups the intervals and optimizes every group in parallel.
    ///
    /// The input is not validated here; see [`Consolidator::run`].
    pub fn optimize(&self, intervals: Vec<ProcedureInterval>) -> Result<Vec<GroupOutcome>> {
        let started = Instant::now();
        let groups = group_intervals(intervals, &self.layout);
        info!(
            groups = groups.len(),
            solver = self.solver.name(),
            "consolidation started"
        );

        let fan_out = || {
            groups
                .into_par_iter()
                .map(|group| self.optimize_group(group))
                .collect::<Vec<_>>()
        };
        let mut outcomes = match self.config.worker_threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(fan_out),
            None => fan_out(),
        };
        outcomes.sort_by(|a, b| a.key.cmp(&b.key));

        info!(
            groups = outcomes.len(),
            rooms_saved = outcomes.iter().map(|o| o.rooms_saved).sum::<usize>(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "consolidation finished"
        );
        Ok(outcomes)
    }

    /// Optimizes one group.
    pub fn optimize_group(&self, group: ResourceGroup) -> GroupOutcome {
        let capacity = self.config.slot_capacity_minutes;
        let ResourceGroup {
            key,
            mut intervals,
            actual_rooms,
            sites,
        } = group;
        let actual = actual_rooms.len();

        if let Some(long) = intervals.iter().find(|iv| iv.duration_min > capacity) {
            debug!(group = %key, case = %long.id, duration = long.duration_min, capacity, "infeasible");
            return GroupOutcome::new(key, sites, intervals, actual, None, GroupStatus::Infeasible);
        }

        if self.config.skip_single_room && actual <= 1 {
            debug!(group = %key, "skipped single-room group");
            apply_default_mapping(&mut intervals);
            return GroupOutcome::new(key, sites, intervals, actual, Some(actual), GroupStatus::Skipped);
        }

        let bound = LowerBound::compute(&intervals, capacity);
        let lower_bound = bound.value();
        if lower_bound >= actual {
            debug!(
                group = %key,
                volume = bound.volume,
                concurrency = bound.concurrency,
                actual,
                "lower bound reaches actual rooms"
            );
            apply_default_mapping(&mut intervals);
            let outcome = GroupOutcome::new(
                key,
                sites,
                intervals,
                actual,
                Some(actual),
                GroupStatus::NoSavingsPossible,
            );
            return self.with_anesthesia(outcome.with_lower_bound(lower_bound), &actual_rooms);
        }

        let graph = ConflictGraph::new(&intervals);
        let mut plan = FirstFitDecreasing::new(capacity).pack(&intervals, &graph);
        if sites.len() > 1 {
            plan.set_sites(&site_of_slot(plan.slot_count(), &actual_rooms, &sites));
        }

        let status = if plan.slot_count() <= lower_bound {
            debug!(group = %key, slots = plan.slot_count(), lower_bound, "first fit decreasing meets bound");
            GroupStatus::HeuristicOptimal
        } else {
            let (exact, status) = self.solve_exactly(
                &key,
                &intervals,
                &graph,
                &actual_rooms,
                &sites,
                lower_bound,
                &plan,
            );
            if let Some(exact) = exact {
                plan = exact;
            }
            status
        };

        let optimized = if plan.slot_count() > actual {
            debug!(group = %key, slots = plan.slot_count(), actual, "packing exceeds actual rooms, keeping originals");
            apply_default_mapping(&mut intervals);
            actual
        } else {
            plan.apply(&mut intervals);
            plan.slot_count()
        };

        let outcome = GroupOutcome::new(key, sites, intervals, actual, Some(optimized), status)
            .with_lower_bound(lower_bound);
        self.with_anesthesia(outcome, &actual_rooms)
    }

    #[allow(clippy::too_many_arguments)]
    fn solve_exactly(
        &self,
        key: &GroupKey,
        intervals: &[ProcedureInterval],
        graph: &ConflictGraph,
        actual_rooms: &BTreeSet<RoomKey>,
        sites: &[String],
        lower_bound: usize,
        heuristic: &SlotPlan,
    ) -> (Option<SlotPlan>, GroupStatus) {
        let capacity = self.config.slot_capacity_minutes;
        let num_slots = actual_rooms.len();
        let mut builder = PackingModelBuilder::new(intervals, capacity)
            .with_slots(num_slots)
            .with_lower_bound(lower_bound);
        if sites.len() > 1 {
            builder = builder.with_cluster_sites(sites, site_of_slot(num_slots, actual_rooms, sites));
        }
        let model = builder.build(graph);

        let hint = heuristic.assignment(intervals.len());
        let heuristic_objective = model.objective(&hint);
        let outcome = self.solver.solve(&model, Some(&hint), self.config.time_budget());

        let adopted = outcome.assignment().filter(|exact| {
            let better = heuristic_objective.map_or(true, |h| exact.objective < h);
            better && exact.slot_count() <= heuristic.slot_count() && model.is_feasible(&exact.slots)
        });

        debug!(
            group = %key,
            result = %outcome.result,
            reason = %outcome.reason,
            nodes = outcome.statistics.nodes,
            heuristic = heuristic.slot_count(),
            exact = outcome.assignment().map(|a| a.slot_count()),
            adopted = adopted.is_some(),
            "exact solve finished"
        );

        match adopted {
            Some(exact) => {
                let durations: Vec<i64> = intervals.iter().map(|iv| iv.duration_min).collect();
                let plan = SlotPlan::from_assignment(&exact.slots, &durations, &model.slot_site_names());
                (Some(plan), GroupStatus::SolvedExactly)
            }
            None => (None, GroupStatus::HeuristicFallback),
        }
    }

    fn with_anesthesia(
        &self,
        mut outcome: GroupOutcome,
        actual_rooms: &BTreeSet<RoomKey>,
    ) -> GroupOutcome {
        if outcome.status.has_packing() {
            outcome.anesthesia = self.anesthesia.calculate(&outcome.intervals, actual_rooms);
        }
        outcome
    }
}

/// Runs the full pipeline with a fresh [`Consolidator`].
pub fn run(
    intervals: Vec<ProcedureInterval>,
    staffing: &[StaffingHours],
    config: &ConsolidationConfig,
) -> Result<ConsolidationReport> {
    Consolidator::new(config.clone())?.run(intervals, staffing)
}
