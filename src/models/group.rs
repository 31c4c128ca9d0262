//! Optimization groups.
//!
//! A group is one site (or one cluster of sites) on one date. Groups are
//! independent: nothing computed for one group is read by another.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::{ProcedureInterval, RoomKey};

/// Identity of an optimization group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    /// Site name, or cluster id for cluster groups.
    pub name: String,
    /// Case date.
    pub date: NaiveDate,
    /// Whether `name` is a cluster id.
    pub cluster: bool,
}

impl GroupKey {
    /// Key for a standalone site.
    pub fn site(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date,
            cluster: false,
        }
    }

    /// Key for a configured cluster.
    pub fn cluster(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            date,
            cluster: true,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.date)
    }
}

/// The unit of optimization: intervals of one site or cluster on one date.
#[derive(Debug, Clone)]
pub struct ResourceGroup {
    /// Group identity.
    pub key: GroupKey,
    /// Intervals in input order.
    pub intervals: Vec<ProcedureInterval>,
    /// Distinct physical rooms the intervals ran in.
    pub actual_rooms: BTreeSet<RoomKey>,
    /// Member sites in preference order (first = hub). For a standalone
    /// site this holds just that site.
    pub sites: Vec<String>,
}

impl ResourceGroup {
    /// Creates a group and derives its actual rooms.
    pub fn new(key: GroupKey, intervals: Vec<ProcedureInterval>, sites: Vec<String>) -> Self {
        let actual_rooms = intervals.iter().map(ProcedureInterval::room_key).collect();
        Self {
            key,
            intervals,
            actual_rooms,
            sites,
        }
    }

    /// Number of distinct physical rooms used.
    pub fn actual_room_count(&self) -> usize {
        self.actual_rooms.len()
    }

    /// Whether slots must be mapped across several sites.
    pub fn is_cluster(&self) -> bool {
        self.sites.len() > 1
    }

    /// Preferred site for new slots.
    pub fn hub(&self) -> Option<&str> {
        self.sites.first().map(String::as_str)
    }

    /// Sum of occupancy durations (minutes).
    pub fn total_minutes(&self) -> i64 {
        self.intervals.iter().map(|iv| iv.duration_min).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;

    #[test]
    fn test_group_actual_rooms() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let w = TimeWindow::from_hm((8, 0), (9, 0));
        let intervals = vec![
            ProcedureInterval::new("a", "S1", date, "OR 1").with_patient_window(w),
            ProcedureInterval::new("b", "S1", date, "OR 1").with_patient_window(w),
            ProcedureInterval::new("c", "S2", date, "OR 1").with_patient_window(w),
        ];
        let group = ResourceGroup::new(
            GroupKey::cluster("North", date),
            intervals,
            vec!["S1".into(), "S2".into()],
        );

        assert_eq!(group.actual_room_count(), 2);
        assert!(group.is_cluster());
        assert_eq!(group.hub(), Some("S1"));
        assert_eq!(group.total_minutes(), 180);
        assert_eq!(group.key.to_string(), "North @ 2025-03-03");
    }
}
