//! Parallel depth-first branch-and-bound over interval → slot decisions.
//!
//! # Algorithm
//!
//! Intervals are decided longest first (ties: most conflicts first). At
//! each node the current interval may go to
//! 1. any open slot with spare capacity and no conflicting member, or
//! 2. one new slot per site: the lowest unused slot index of that site.
//!
//! Rule 2 only ever opens the lowest free index, which is the
//! `y[j+1] ⇒ y[j]` symmetry breaking of a single-site model. For clusters
//! it collapses the interchangeable slots of a site into one branch, and
//! new slots at already active sites are tried before activating another
//! site.
//!
//! A node is pruned when
//! `active site weights + max(open, L, open + ⌈(remaining − free) / C⌉)`
//! reaches the incumbent, where `L` is the group lower bound, `C` the
//! capacity and `free` the spare capacity of the open slots.
//!
//! Workers share one [`SharedIncumbent`]. Worker 0 branches in slot order
//! (first fit); the others shuffle open-slot candidates with a seeded RNG
//! to diversify. The first worker to exhaust its tree proves optimality
//! and stops the rest. The deadline and the stop flag are polled every
//! [`CHECK_INTERVAL`] nodes.
//!
//! # Reference
//! Scholl, Klein & Jürgens (1997), "BISON: A fast hybrid procedure for
//! exactly solving the one-dimensional bin packing problem", C&OR 24(7)

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::trace;

use super::{
    Assignment, ExactSolver, PackingModel, SearchStatistics, SharedIncumbent, SolveOutcome,
    SolveResult, TerminationReason,
};

/// Nodes between deadline polls.
pub const CHECK_INTERVAL: u64 = 1024;

const UNASSIGNED: usize = usize::MAX;

/// Branch-and-bound backend with a fixed number of search workers.
#[derive(Debug, Clone)]
pub struct BranchAndBoundSolver {
    workers: usize,
    seed: u64,
}

impl Default for BranchAndBoundSolver {
    fn default() -> Self {
        Self::new(4)
    }
}

impl BranchAndBoundSolver {
    /// Creates a solver with `workers` parallel workers (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            seed: 0x5eed_0b5e,
        }
    }

    /// Sets the diversification seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of search workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    fn branching_order(model: &PackingModel) -> Vec<usize> {
        let graph = model.graph();
        let mut order: Vec<usize> = (0..model.len()).collect();
        order.sort_by(|&a, &b| {
            model
                .duration(b)
                .cmp(&model.duration(a))
                .then_with(|| graph.degree(b).cmp(&graph.degree(a)))
                .then_with(|| a.cmp(&b))
        });
        order
    }
}

impl ExactSolver for BranchAndBoundSolver {
    fn name(&self) -> &str {
        "branch-and-bound"
    }

    fn solve(&self, model: &PackingModel, hint: Option<&[usize]>, budget: Duration) -> SolveOutcome {
        let start = Instant::now();
        let incumbent = SharedIncumbent::new();
        let mut statistics = SearchStatistics::default();

        if let Some(hint) = hint.filter(|h| model.is_feasible(h)) {
            if let Some(seed) = model.assignment(hint.to_vec()) {
                if incumbent.try_install(&seed) {
                    statistics.solutions += 1;
                }
            }
        }

        let oversized = (0..model.len()).any(|i| model.duration(i) > model.capacity());
        if oversized || (model.num_slots() == 0 && !model.is_empty()) {
            statistics.elapsed = start.elapsed();
            return SolveOutcome::new(
                SolveResult::Infeasible,
                TerminationReason::InfeasibilityProven,
                statistics,
            );
        }

        let order = Self::branching_order(model);
        let deadline = start.checked_add(budget);
        let stop = AtomicBool::new(false);
        let proven = AtomicBool::new(false);
        let nodes = AtomicU64::new(0);
        let improvements = AtomicU64::new(0);

        thread::scope(|scope| {
            for w in 0..self.workers {
                let rng = (w > 0).then(|| SmallRng::seed_from_u64(self.seed.wrapping_add(w as u64)));
                let (order, incumbent, stop, proven) = (&order, &incumbent, &stop, &proven);
                let (nodes, improvements) = (&nodes, &improvements);
                scope.spawn(move || {
                    let mut worker = Worker::new(model, order, incumbent, stop, deadline, rng);
                    worker.descend(0);
                    nodes.fetch_add(worker.nodes, Ordering::Relaxed);
                    improvements.fetch_add(worker.improvements, Ordering::Relaxed);
                    trace!(worker = w, nodes = worker.nodes, aborted = worker.aborted, "search worker finished");
                    if !worker.aborted {
                        proven.store(true, Ordering::Relaxed);
                        stop.store(true, Ordering::Relaxed);
                    }
                });
            }
        });

        statistics.nodes = nodes.load(Ordering::Relaxed);
        statistics.solutions += improvements.load(Ordering::Relaxed);
        statistics.elapsed = start.elapsed();

        let best = incumbent.snapshot();
        let (result, reason) = match (proven.load(Ordering::Relaxed), best) {
            (true, Some(best)) => (SolveResult::Optimal(best), TerminationReason::OptimalityProven),
            (true, None) => (SolveResult::Infeasible, TerminationReason::InfeasibilityProven),
            (false, Some(best)) => (
                SolveResult::Feasible(best),
                TerminationReason::Aborted("time limit".into()),
            ),
            (false, None) => (SolveResult::Unknown, TerminationReason::Aborted("time limit".into())),
        };
        SolveOutcome::new(result, reason, statistics)
    }
}

/// Search state of one worker.
struct Worker<'s> {
    model: &'s PackingModel,
    order: &'s [usize],
    incumbent: &'s SharedIncumbent,
    stop: &'s AtomicBool,
    deadline: Option<Instant>,
    rng: Option<SmallRng>,
    slot_of: Vec<usize>,
    load: Vec<i64>,
    members: Vec<Vec<usize>>,
    open_slots: usize,
    open_per_site: Vec<usize>,
    active_weight: i64,
    free_minutes: i64,
    remaining_minutes: i64,
    nodes: u64,
    improvements: u64,
    aborted: bool,
}

impl<'s> Worker<'s> {
    fn new(
        model: &'s PackingModel,
        order: &'s [usize],
        incumbent: &'s SharedIncumbent,
        stop: &'s AtomicBool,
        deadline: Option<Instant>,
        rng: Option<SmallRng>,
    ) -> Self {
        Self {
            model,
            order,
            incumbent,
            stop,
            deadline,
            rng,
            slot_of: vec![UNASSIGNED; model.len()],
            load: vec![0; model.num_slots()],
            members: vec![Vec::new(); model.num_slots()],
            open_slots: 0,
            open_per_site: vec![0; model.num_sites()],
            active_weight: 0,
            free_minutes: 0,
            remaining_minutes: model.total_minutes(),
            nodes: 0,
            improvements: 0,
            aborted: false,
        }
    }

    fn should_stop(&mut self) -> bool {
        if self.aborted {
            return true;
        }
        self.nodes += 1;
        if self.nodes % CHECK_INTERVAL == 0 {
            let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
            if expired {
                self.stop.store(true, Ordering::Relaxed);
            }
            if expired || self.stop.load(Ordering::Relaxed) {
                self.aborted = true;
            }
        }
        self.aborted
    }

    fn bound(&self) -> i64 {
        let capacity = self.model.capacity();
        let overflow = (self.remaining_minutes - self.free_minutes).max(0);
        let extra = ((overflow + capacity - 1) / capacity) as usize;
        let slots = (self.open_slots + extra).max(self.model.lower_bound());
        let mut value = self.active_weight + slots as i64;
        if self.model.is_cluster() && self.open_slots == 0 && self.remaining_minutes > 0 {
            value += self.model.site_weight(0);
        }
        value
    }

    fn place(&mut self, item: usize, slot: usize) {
        let duration = self.model.duration(item);
        if self.members[slot].is_empty() {
            self.open_slots += 1;
            self.free_minutes += self.model.capacity();
            let site = self.model.site_of(slot);
            if self.open_per_site[site] == 0 {
                self.active_weight += self.model.site_weight(site);
            }
            self.open_per_site[site] += 1;
        }
        self.members[slot].push(item);
        self.load[slot] += duration;
        self.free_minutes -= duration;
        self.remaining_minutes -= duration;
        self.slot_of[item] = slot;
    }

    fn unplace(&mut self, item: usize, slot: usize) {
        let duration = self.model.duration(item);
        self.members[slot].pop();
        self.load[slot] -= duration;
        self.free_minutes += duration;
        self.remaining_minutes += duration;
        self.slot_of[item] = UNASSIGNED;
        if self.members[slot].is_empty() {
            self.open_slots -= 1;
            self.free_minutes -= self.model.capacity();
            let site = self.model.site_of(slot);
            self.open_per_site[site] -= 1;
            if self.open_per_site[site] == 0 {
                self.active_weight -= self.model.site_weight(site);
            }
        }
    }

    fn record_leaf(&mut self) {
        let objective = self.active_weight + self.open_slots as i64;
        if objective >= self.incumbent.upper_bound() {
            return;
        }
        let candidate = Assignment {
            slots: self.slot_of.clone(),
            objective,
        };
        if self.incumbent.try_install(&candidate) {
            self.improvements += 1;
            trace!(objective, nodes = self.nodes, "incumbent improved");
        }
    }

    /// New-slot branches: lowest unused slot per site, cheapest first.
    fn fresh_slots(&self) -> Vec<usize> {
        let mut fresh: Vec<(i64, usize)> = Vec::new();
        for site in 0..self.model.num_sites() {
            let lowest = (0..self.model.num_slots())
                .find(|&j| self.model.site_of(j) == site && self.members[j].is_empty());
            if let Some(j) = lowest {
                let cost = if self.open_per_site[site] > 0 {
                    1
                } else {
                    1 + self.model.site_weight(site)
                };
                fresh.push((cost, j));
            }
        }
        fresh.sort_unstable();
        fresh.into_iter().map(|(_, j)| j).collect()
    }

    fn descend(&mut self, depth: usize) {
        if self.should_stop() {
            return;
        }
        if depth == self.order.len() {
            self.record_leaf();
            return;
        }
        if self.bound() >= self.incumbent.upper_bound() {
            return;
        }

        let item = self.order[depth];
        let duration = self.model.duration(item);
        let capacity = self.model.capacity();
        let graph = self.model.graph();

        let mut open: Vec<usize> = (0..self.model.num_slots())
            .filter(|&j| {
                !self.members[j].is_empty()
                    && self.load[j] + duration <= capacity
                    && !graph.conflicts_with_any(item, &self.members[j])
            })
            .collect();
        if let Some(rng) = self.rng.as_mut() {
            open.shuffle(rng);
        }

        for slot in open.into_iter().chain(self.fresh_slots()) {
            self.place(item, slot);
            self.descend(depth + 1);
            self.unplace(item, slot);
            if self.aborted {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictGraph;
    use crate::exact::PackingModelBuilder;
    use crate::models::{ProcedureInterval, TimeWindow};
    use crate::packing::{FirstFitDecreasing, LowerBound};
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn case(id: &str, site: &str, room: &str, start: i64, end: i64) -> ProcedureInterval {
        ProcedureInterval::new(id, site, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(), room)
            .with_patient_window(TimeWindow::new(start, end))
    }

    fn solve(intervals: &[ProcedureInterval], capacity: i64, slots: usize) -> SolveOutcome {
        let graph = ConflictGraph::new(intervals);
        let lb = LowerBound::compute(intervals, capacity).value();
        let model = PackingModelBuilder::new(intervals, capacity)
            .with_slots(slots)
            .with_lower_bound(lb)
            .build(&graph);
        BranchAndBoundSolver::new(2).solve(&model, None, Duration::from_secs(5))
    }

    #[test]
    fn test_beats_first_fit_decreasing() {
        // FFD: {200, 160}, {160, 120, 80}, {80}. Optimum: {200, 120, 80}, {160, 160, 80}.
        let durations = [200, 160, 160, 120, 80, 80];
        let intervals: Vec<_> = durations
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                let start = i as i64 * 300;
                case(&format!("c{i}"), "S", &format!("OR {i}"), start, start + d)
            })
            .collect();
        let graph = ConflictGraph::new(&intervals);
        let ffd = FirstFitDecreasing::new(400).pack(&intervals, &graph);
        assert_eq!(ffd.slot_count(), 3);

        let outcome = solve(&intervals, 400, intervals.len());
        assert!(outcome.is_optimal());
        let best = outcome.assignment().unwrap();
        assert_eq!(best.objective, 2);
        assert_eq!(outcome.reason, TerminationReason::OptimalityProven);
    }

    #[test]
    fn test_optimal_with_conflicts() {
        let intervals = vec![
            case("a", "S", "1", 0, 100),
            case("b", "S", "2", 50, 150),
            case("c", "S", "3", 100, 200),
            case("d", "S", "4", 150, 250),
        ];
        let outcome = solve(&intervals, 480, 4);
        let best = outcome.assignment().unwrap();
        assert_eq!(best.objective, 2);
        assert_eq!(best.slot_count(), 2);
        assert!(outcome.is_optimal());
    }

    #[test]
    fn test_infeasible_when_slots_too_few() {
        let intervals = vec![case("a", "S", "1", 0, 100), case("b", "S", "2", 0, 100)];
        let outcome = solve(&intervals, 480, 1);
        assert_eq!(outcome.result, SolveResult::Infeasible);
        assert_eq!(outcome.reason, TerminationReason::InfeasibilityProven);
    }

    #[test]
    fn test_oversized_interval_is_infeasible() {
        let intervals = vec![case("a", "S", "1", 0, 600)];
        assert_eq!(solve(&intervals, 480, 1).result, SolveResult::Infeasible);
    }

    #[test]
    fn test_hint_installed() {
        let intervals = vec![case("a", "S", "1", 0, 100), case("b", "S", "2", 100, 200)];
        let graph = ConflictGraph::new(&intervals);
        let model = PackingModelBuilder::new(&intervals, 480)
            .with_slots(2)
            .with_lower_bound(1)
            .build(&graph);
        let outcome = BranchAndBoundSolver::new(1).solve(&model, Some(&[0, 0]), Duration::from_secs(1));
        assert!(outcome.is_optimal());
        assert_eq!(outcome.assignment().unwrap().slots, vec![0, 0]);
        assert!(outcome.statistics.solutions >= 1);
    }

    #[test]
    fn test_cluster_prefers_hub() {
        // Both cases fit one slot; hub slot is index 1 in the site mapping.
        let intervals = vec![case("a", "Sat", "1", 0, 100), case("b", "Hub", "1", 100, 200)];
        let graph = ConflictGraph::new(&intervals);
        let sites = vec!["Hub".to_string(), "Sat".to_string()];
        let model = PackingModelBuilder::new(&intervals, 480)
            .with_slots(2)
            .with_cluster_sites(&sites, vec!["Sat".into(), "Hub".into()])
            .build(&graph);

        let outcome = BranchAndBoundSolver::new(2).solve(&model, Some(&[0, 0]), Duration::from_secs(5));
        assert!(outcome.is_optimal());
        let best = outcome.assignment().unwrap();
        assert_eq!(best.slots, vec![1, 1]);
        assert_eq!(best.objective, 1001);
    }

    #[test]
    fn test_zero_budget_returns_hint() {
        let n = 40;
        let intervals: Vec<_> = (0..n)
            .map(|i| case(&format!("c{i}"), "S", &format!("OR {}", i % 10), (i % 7) * 37, (i % 7) * 37 + 20 + i % 13))
            .collect();
        let graph = ConflictGraph::new(&intervals);
        let ffd = FirstFitDecreasing::new(480).pack(&intervals, &graph);
        let hint = ffd.assignment(intervals.len());
        let model = PackingModelBuilder::new(&intervals, 480).with_slots(n as usize).build(&graph);

        let outcome = BranchAndBoundSolver::new(2).solve(&model, Some(&hint), Duration::ZERO);
        let best = outcome.assignment().unwrap();
        assert!(best.objective <= ffd.slot_count() as i64);
        assert!(model.is_feasible(&best.slots));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn test_solution_feasible_and_bounded(
            raw in prop::collection::vec((0i64..600, 10i64..200, 0usize..4), 1..10)
        ) {
            let intervals: Vec<_> = raw
                .iter()
                .enumerate()
                .map(|(i, &(s, d, r))| case(&format!("c{i}"), "S", &format!("OR {r}"), s, s + d))
                .collect();
            let graph = ConflictGraph::new(&intervals);
            let lb = LowerBound::compute(&intervals, 480).value();
            let ffd = FirstFitDecreasing::new(480).pack(&intervals, &graph);
            let model = PackingModelBuilder::new(&intervals, 480)
                .with_slots(intervals.len())
                .with_lower_bound(lb)
                .build(&graph);
            let hint = ffd.assignment(intervals.len());
            let outcome = BranchAndBoundSolver::new(2).solve(&model, Some(&hint), Duration::from_secs(5));
            let best = outcome.assignment().unwrap();
            prop_assert!(model.is_feasible(&best.slots));
            prop_assert!(best.slot_count() >= lb);
            prop_assert!(best.slot_count() <= ffd.slot_count());
        }
    }
}
