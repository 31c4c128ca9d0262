//! Pairwise conflict model with the same-room safety rule.
//!
//! # Rule
//! Two intervals conflict when their padded occupancy windows overlap
//! (`start_a < end_b && start_b < end_a`), unless both ran in the same
//! physical room (site and room name) and their raw patient windows do not
//! overlap. Turnover padding between two sequential cases in one room
//! already existed implicitly, so relabeling that room must not turn it
//! into a new hard constraint.
//!
//! Every packer reads conflicts through [`ConflictGraph`], so the rule is
//! applied identically by the greedy and exact packers.
//!
//! # Complexity
//! Building the graph is O(n²) pair tests; lookups are O(1) bit tests.
//! Degrees are popcounts over one row.

use fixedbitset::FixedBitSet;

use crate::models::ProcedureInterval;

/// Whether two intervals may not share a slot.
pub fn conflicts(a: &ProcedureInterval, b: &ProcedureInterval) -> bool {
    if !a.occupancy.overlaps(&b.occupancy) {
        return false;
    }
    let same_room = a.site == b.site && a.room == b.room;
    !(same_room && !a.patient.overlaps(&b.patient))
}

/// Precomputed symmetric conflict relation over a group's intervals.
///
/// Row `i` is a bitset of the intervals conflicting with interval `i`.
#[derive(Debug, Clone)]
pub struct ConflictGraph {
    rows: Vec<FixedBitSet>,
}

impl ConflictGraph {
    /// Builds the graph for the given intervals (indexed by position).
    pub fn new(intervals: &[ProcedureInterval]) -> Self {
        let len = intervals.len();
        let mut rows = vec![FixedBitSet::with_capacity(len); len];
        for i in 0..len {
            for j in (i + 1)..len {
                if conflicts(&intervals[i], &intervals[j]) {
                    rows[i].insert(j);
                    rows[j].insert(i);
                }
            }
        }
        Self { rows }
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the graph has no intervals.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether intervals `i` and `j` conflict.
    #[inline]
    pub fn conflicts(&self, i: usize, j: usize) -> bool {
        self.rows[i].contains(j)
    }

    /// Number of intervals conflicting with `i`.
    pub fn degree(&self, i: usize) -> usize {
        self.rows[i].count_ones(..)
    }

    /// Bitset row of interval `i`.
    pub fn row(&self, i: usize) -> &FixedBitSet {
        &self.rows[i]
    }

    /// Whether `i` conflicts with any member of `members`.
    pub fn conflicts_with_any(&self, i: usize, members: &[usize]) -> bool {
        members.iter().any(|&j| self.conflicts(i, j))
    }

    /// Number of conflicting pairs.
    pub fn pair_count(&self) -> usize {
        self.rows.iter().map(|row| row.count_ones(..)).sum::<usize>() / 2
    }
}
