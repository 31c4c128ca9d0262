//! Slot packing primitives and the fast packers.
//!
//! # Modules
//!
//! - **`bounds`**: volume and concurrency lower bounds
//! - **`heuristic`**: first-fit-decreasing packer
//! - **`sites`**: slot → site mapping for cluster groups
//!
//! A [`SlotPlan`] is the common result shape of every packer. Slot order
//! is packing order, and [`SlotPlan::apply`] letters slots in that order.

mod bounds;
mod heuristic;
mod sites;

pub use bounds::{concurrency_bound, volume_bound, LowerBound};
pub use heuristic::FirstFitDecreasing;
pub use sites::site_of_slot;

use std::collections::BTreeSet;

use crate::conflict::ConflictGraph;
use crate::models::{ProcedureInterval, RoomKey, SlotAssignment};

/// One consolidated room produced by a packer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    /// Sum of member occupancy durations (minutes).
    pub load_minutes: i64,
    /// Indices of the member intervals.
    pub members: Vec<usize>,
    /// Hosting site, for cluster groups.
    pub site: Option<String>,
}

impl Slot {
    fn with_member(index: usize, duration: i64) -> Self {
        Self {
            load_minutes: duration,
            members: vec![index],
            site: None,
        }
    }
}

/// An interval → slot packing for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotPlan {
    /// Slots in packing order.
    pub slots: Vec<Slot>,
}

impl SlotPlan {
    /// Number of slots used.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Builds a plan from a per-interval slot index vector.
    ///
    /// Unused slot indices are dropped; surviving slots keep their
    /// relative order. `slot_sites[j]`, when present, becomes the site of
    /// model slot `j`.
    pub fn from_assignment(assignment: &[usize], durations: &[i64], slot_sites: &[String]) -> Self {
        let width = assignment.iter().copied().max().map_or(0, |m| m + 1);
        let mut raw: Vec<Slot> = vec![Slot::default(); width];
        for (item, &slot) in assignment.iter().enumerate() {
            raw[slot].members.push(item);
            raw[slot].load_minutes += durations[item];
        }
        let slots = raw
            .into_iter()
            .enumerate()
            .filter(|(_, slot)| !slot.members.is_empty())
            .map(|(j, mut slot)| {
                slot.site = slot_sites.get(j).cloned();
                slot
            })
            .collect();
        Self { slots }
    }

    /// Per-interval slot index vector for `len` intervals.
    pub fn assignment(&self, len: usize) -> Vec<usize> {
        let mut out = vec![0; len];
        for (j, slot) in self.slots.iter().enumerate() {
            for &i in &slot.members {
                out[i] = j;
            }
        }
        out
    }

    /// Whether every slot respects capacity and holds no conflicting pair.
    pub fn is_feasible(&self, graph: &ConflictGraph, capacity: i64) -> bool {
        self.slots.iter().all(|slot| {
            slot.load_minutes <= capacity
                && slot.members.iter().enumerate().all(|(k, &a)| {
                    slot.members[k + 1..].iter().all(|&b| !graph.conflicts(a, b))
                })
        })
    }

    /// Assigns hosting sites to slots in order.
    pub fn set_sites(&mut self, sites: &[String]) {
        for (slot, site) in self.slots.iter_mut().zip(sites) {
            slot.site = Some(site.clone());
        }
    }

    /// Writes slot assignments onto the intervals.
    ///
    /// Slots without a site label each member with the member's own site.
    pub fn apply(&self, intervals: &mut [ProcedureInterval]) {
        for (j, slot) in self.slots.iter().enumerate() {
            for &i in &slot.members {
                let site = slot.site.clone().unwrap_or_else(|| intervals[i].site.clone());
                intervals[i].assigned_slot = Some(SlotAssignment::new(j, site));
            }
        }
    }
}

/// Labels every interval with its own physical room, one slot per room.
///
/// Rooms are lettered in sorted order. Used for pass-through groups.
pub fn apply_default_mapping(intervals: &mut [ProcedureInterval]) {
    let rooms: BTreeSet<RoomKey> = intervals.iter().map(ProcedureInterval::room_key).collect();
    let rooms: Vec<RoomKey> = rooms.into_iter().collect();
    for iv in intervals.iter_mut() {
        let key = iv.room_key();
        if let Ok(index) = rooms.binary_search(&key) {
            iv.assigned_slot = Some(SlotAssignment::new(index, key.site));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;
    use chrono::NaiveDate;

    fn case(id: &str, site: &str, room: &str, start: i64, end: i64) -> ProcedureInterval {
        ProcedureInterval::new(id, site, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(), room)
            .with_patient_window(TimeWindow::new(start, end))
    }

    #[test]
    fn test_from_assignment_compacts_slots() {
        let plan = SlotPlan::from_assignment(&[3, 1, 3], &[60, 30, 90], &[
            "A".into(),
            "B".into(),
            "C".into(),
            "D".into(),
        ]);
        assert_eq!(plan.slot_count(), 2);
        assert_eq!(plan.slots[0].members, vec![1]);
        assert_eq!(plan.slots[0].site.as_deref(), Some("B"));
        assert_eq!(plan.slots[1].members, vec![0, 2]);
        assert_eq!(plan.slots[1].load_minutes, 150);
        assert_eq!(plan.assignment(3), vec![1, 0, 1]);
    }

    #[test]
    fn test_feasibility_check() {
        let intervals = vec![case("a", "S", "1", 0, 100), case("b", "S", "2", 50, 150)];
        let graph = ConflictGraph::new(&intervals);
        let together = SlotPlan::from_assignment(&[0, 0], &[100, 100], &[]);
        let apart = SlotPlan::from_assignment(&[0, 1], &[100, 100], &[]);
        assert!(!together.is_feasible(&graph, 480));
        assert!(apart.is_feasible(&graph, 480));
        assert!(!apart.is_feasible(&graph, 90));
    }

    #[test]
    fn test_apply_labels() {
        let mut intervals = vec![case("a", "S1", "1", 0, 60), case("b", "S2", "2", 60, 120)];
        let plan = SlotPlan::from_assignment(&[0, 0], &[60, 60], &[]);
        plan.apply(&mut intervals);
        assert_eq!(intervals[0].slot_label().unwrap(), "S1 - Consolidated Room A");
        assert_eq!(intervals[1].slot_label().unwrap(), "S2 - Consolidated Room A");

        let mut plan = plan;
        plan.set_sites(&["Hub".to_string()]);
        plan.apply(&mut intervals);
        assert_eq!(intervals[1].slot_label().unwrap(), "Hub - Consolidated Room A");
    }

    #[test]
    fn test_default_mapping() {
        let mut intervals = vec![
            case("a", "S", "OR 2", 0, 60),
            case("b", "S", "OR 1", 0, 60),
            case("c", "S", "OR 2", 60, 120),
        ];
        apply_default_mapping(&mut intervals);
        assert_eq!(intervals[0].slot_label().unwrap(), "S - Consolidated Room B");
        assert_eq!(intervals[1].slot_label().unwrap(), "S - Consolidated Room A");
        assert_eq!(intervals[2].slot_label().unwrap(), "S - Consolidated Room B");
    }
}
