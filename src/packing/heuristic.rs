//! First-fit-decreasing packer.
//!
//! # Algorithm
//!
//! 1. Sort intervals by occupancy duration, longest first (stable).
//! 2. For each interval, scan slots in creation order and take the first
//!    one with spare capacity and no conflicting member.
//! 3. Otherwise open a new slot.
//!
//! Always feasible and always terminates. The result doubles as the warm
//! start of the exact search.
//!
//! # Complexity
//! O(n²) slot scans with O(1) conflict lookups.
//!
//! # Reference
//! Johnson (1974), "Fast algorithms for bin packing", JCSS 8(3)

use tracing::trace;

use super::{Slot, SlotPlan};
use crate::conflict::ConflictGraph;
use crate::models::ProcedureInterval;

/// First-fit-decreasing packer with conflict checks.
#[derive(Debug, Clone, Copy)]
pub struct FirstFitDecreasing {
    capacity: i64,
}

impl FirstFitDecreasing {
    /// Creates a packer for the given slot capacity (minutes).
    pub fn new(capacity: i64) -> Self {
        Self { capacity }
    }

    /// Packs the intervals of one group.
    pub fn pack(&self, intervals: &[ProcedureInterval], graph: &ConflictGraph) -> SlotPlan {
        let mut order: Vec<usize> = (0..intervals.len()).collect();
        order.sort_by(|&a, &b| intervals[b].duration_min.cmp(&intervals[a].duration_min));

        let mut slots: Vec<Slot> = Vec::new();
        for idx in order {
            let duration = intervals[idx].duration_min;
            let target = slots.iter().position(|slot| {
                slot.load_minutes + duration <= self.capacity
                    && !graph.conflicts_with_any(idx, &slot.members)
            });
            match target {
                Some(j) => {
                    slots[j].members.push(idx);
                    slots[j].load_minutes += duration;
                }
                None => slots.push(Slot::with_member(idx, duration)),
            }
        }

        trace!(intervals = intervals.len(), slots = slots.len(), "ffd packed");
        SlotPlan { slots }
    }
}
