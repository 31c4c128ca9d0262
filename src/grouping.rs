//! Group key resolution.
//!
//! Each interval belongs to exactly one optimization group:
//! - its site and date, or
//! - the owning cluster and date when the site is listed in a cluster.
//!
//! Clustered sites are merged into a single packing problem so that rooms
//! can be shared across the cluster. Groups come back sorted by
//! [`GroupKey`] (name, date, then site before cluster), so a cluster id
//! that matches a standalone site name still yields two groups.

use std::collections::BTreeMap;

use crate::config::SiteLayout;
use crate::models::{GroupKey, ProcedureInterval, ResourceGroup};

/// Resolves the group key of one interval.
pub fn group_key(interval: &ProcedureInterval, layout: &SiteLayout) -> GroupKey {
    match layout.cluster_of(&interval.site) {
        Some(cluster) => GroupKey::cluster(cluster, interval.date),
        None => GroupKey::site(&interval.site, interval.date),
    }
}

/// Partitions intervals into optimization groups.
///
/// Input order is preserved inside each group.
pub fn group_intervals(intervals: Vec<ProcedureInterval>, layout: &SiteLayout) -> Vec<ResourceGroup> {
    let mut buckets: BTreeMap<GroupKey, Vec<ProcedureInterval>> = BTreeMap::new();

    for iv in intervals {
        buckets.entry(group_key(&iv, layout)).or_default().push(iv);
    }

    buckets
        .into_iter()
        .map(|(key, members)| {
            let sites = if key.cluster {
                layout.members(&key.name).map(<[String]>::to_vec).unwrap_or_default()
            } else {
                vec![key.name.clone()]
            };
            ResourceGroup::new(key, members, sites)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsolidationConfig;
    use crate::models::TimeWindow;
    use chrono::NaiveDate;

    fn case(id: &str, site: &str, day: u32) -> ProcedureInterval {
        ProcedureInterval::new(id, site, NaiveDate::from_ymd_opt(2025, 4, day).unwrap(), "OR 1")
            .with_patient_window(TimeWindow::from_hm((8, 0), (9, 0)))
    }

    #[test]
    fn test_standalone_sites() {
        let layout = ConsolidationConfig::new().validate().unwrap();
        let groups = group_intervals(
            vec![case("a", "B", 1), case("b", "A", 1), case("c", "A", 2), case("d", "A", 1)],
            &layout,
        );

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key, GroupKey::site("A", NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()));
        let ids: Vec<&str> = groups[0].intervals.iter().map(|iv| iv.id.as_str()).collect();
        assert_eq!(ids, ["b", "d"]);
        assert_eq!(groups[0].sites, ["A"]);
        assert!(!groups[0].is_cluster());
        assert_eq!(groups[2].key.name, "B");
    }

    #[test]
    fn test_cluster_merges_sites() {
        let layout = ConsolidationConfig::new()
            .with_cluster("North", ["Hub", "Sat"])
            .validate()
            .unwrap();
        let groups = group_intervals(
            vec![case("a", "Sat", 1), case("b", "Hub", 1), case("c", "Other", 1)],
            &layout,
        );

        assert_eq!(groups.len(), 2);
        let north = groups.iter().find(|g| g.key.name == "North").unwrap();
        assert!(north.key.cluster);
        assert_eq!(north.sites, ["Hub", "Sat"]);
        assert_eq!(north.intervals.len(), 2);
        assert_eq!(north.actual_room_count(), 2);
        assert_eq!(north.hub(), Some("Hub"));
    }

    #[test]
    fn test_cluster_and_site_sharing_a_name() {
        let layout = ConsolidationConfig::new()
            .with_cluster("Main", ["X", "Y"])
            .validate()
            .unwrap();
        let groups = group_intervals(
            vec![case("a", "X", 1), case("b", "Main", 1), case("c", "Y", 1)],
            &layout,
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, GroupKey::site("Main", NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()));
        assert_eq!(groups[0].sites, ["Main"]);
        assert_eq!(groups[0].intervals.len(), 1);
        assert!(groups[1].key.cluster);
        assert_eq!(groups[1].sites, ["X", "Y"]);
        let ids: Vec<&str> = groups[1].intervals.iter().map(|iv| iv.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
    }
}
