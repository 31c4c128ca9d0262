//! Regional staffing balance.
//!
//! # Algorithm
//!
//! Per (region, date) slice, where a site's region comes from the
//! configured region map (unmapped sites form `"Standalone: <site>"`):
//!
//! - demand = Σ clinical-window minutes of the slice's cases / 60
//! - supply = Σ staffed hours recorded for the slice
//! - effective = supply × productivity (clamped to `[0.5, 1.0]`)
//! - surplus = `max(0, effective − demand)`
//!
//! Only dates that have cases produce slices. A slice with cases but no
//! supply gets zero surplus and stays out of the aggregate totals.
//!
//! Each group then receives the share of its slices' surplus matching its
//! share of their demand.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::config::{ConsolidationConfig, SiteLayout};
use crate::models::{
    GroupOutcome, RegionalStaffingRecord, RoomKey, SlotAssignment, StaffingHours, StaffingSummary,
};

type SliceKey = (String, NaiveDate);

#[derive(Default)]
struct Slice {
    demand_minutes: i64,
    rooms: BTreeSet<RoomKey>,
    slots: BTreeSet<SlotAssignment>,
    unpacked_rooms: BTreeSet<RoomKey>,
}

/// Balances anesthesia demand against staffed hours per region and date.
#[derive(Debug, Clone)]
pub struct StaffingBalancer<'a> {
    layout: &'a SiteLayout,
    productivity: f64,
}

impl<'a> StaffingBalancer<'a> {
    /// Creates a balancer.
    pub fn new(layout: &'a SiteLayout, config: &ConsolidationConfig) -> Self {
        Self {
            layout,
            productivity: config.effective_productivity(),
        }
    }

    /// One record per (region, date) slice with cases, sorted by region
    /// then date.
    pub fn balance(
        &self,
        outcomes: &[GroupOutcome],
        supply: &[StaffingHours],
    ) -> Vec<RegionalStaffingRecord> {
        let mut slices: BTreeMap<SliceKey, Slice> = BTreeMap::new();
        for outcome in outcomes {
            let date = outcome.key.date;
            for iv in &outcome.intervals {
                let slice = slices
                    .entry((self.layout.region_of(&iv.site), date))
                    .or_default();
                slice.demand_minutes += iv.clinical.length_min();
                slice.rooms.insert(iv.room_key());
                if iv.assigned_slot.is_none() {
                    slice.unpacked_rooms.insert(iv.room_key());
                }
                if let Some(slot) = &iv.assigned_slot {
                    slices
                        .entry((self.layout.region_of(&slot.site), date))
                        .or_default()
                        .slots
                        .insert(slot.clone());
                }
            }
        }

        if slices.is_empty() && !supply.is_empty() {
            warn!(records = supply.len(), "no case dates; staffing balance skipped");
        }

        let mut hours: HashMap<SliceKey, f64> = HashMap::new();
        let mut ignored = 0usize;
        for record in supply {
            let key = (record.region.clone(), record.date);
            if slices.get(&key).is_some_and(|s| !s.rooms.is_empty()) {
                *hours.entry(key).or_default() += record.hours;
            } else {
                ignored += 1;
            }
        }
        if ignored > 0 {
            debug!(ignored, "staffing records without cases on their region and date");
        }

        slices
            .into_iter()
            .filter(|(_, slice)| !slice.rooms.is_empty())
            .map(|((region, date), slice)| {
                let demand_hours = slice.demand_minutes as f64 / 60.0;
                let supply_hours = hours.get(&(region.clone(), date)).copied().unwrap_or(0.0);
                let effective_hours = supply_hours * self.productivity;
                let surplus_hours = if supply_hours > 0.0 {
                    (effective_hours - demand_hours).max(0.0)
                } else {
                    if demand_hours > 0.0 {
                        debug!(%region, %date, demand_hours, "cases without staffing supply");
                    }
                    0.0
                };
                RegionalStaffingRecord {
                    region,
                    date,
                    demand_hours,
                    supply_hours,
                    effective_hours,
                    surplus_hours,
                    active_rooms: slice.rooms.len(),
                    optimized_rooms: slice.slots.len() + slice.unpacked_rooms.len(),
                }
            })
            .collect()
    }

    /// Attributes slice surplus to groups by demand share.
    pub fn distribute(&self, outcomes: &mut [GroupOutcome], records: &[RegionalStaffingRecord]) {
        let by_key: HashMap<(&str, NaiveDate), &RegionalStaffingRecord> = records
            .iter()
            .map(|r| ((r.region.as_str(), r.date), r))
            .collect();

        for outcome in outcomes.iter_mut() {
            let mut minutes_by_region: BTreeMap<String, i64> = BTreeMap::new();
            for iv in &outcome.intervals {
                *minutes_by_region
                    .entry(self.layout.region_of(&iv.site))
                    .or_default() += iv.clinical.length_min();
            }

            outcome.surplus_staffing_hours = minutes_by_region
                .iter()
                .filter_map(|(region, minutes)| {
                    let record = by_key.get(&(region.as_str(), outcome.key.date))?;
                    if record.demand_hours <= 0.0 {
                        return None;
                    }
                    let share = (*minutes as f64 / 60.0) / record.demand_hours;
                    Some(record.surplus_hours * share)
                })
                .sum();
        }
    }

    /// Aggregates the slices that have supply.
    pub fn summarize(&self, records: &[RegionalStaffingRecord]) -> StaffingSummary {
        let mut summary = StaffingSummary {
            region_count: self.layout.region_count,
            first_date: records.iter().map(|r| r.date).min(),
            last_date: records.iter().map(|r| r.date).max(),
            ..StaffingSummary::default()
        };

        let counted: Vec<&RegionalStaffingRecord> = records.iter().filter(|r| r.has_supply()).collect();
        for r in &counted {
            summary.total_supply_hours += r.supply_hours;
            summary.effective_supply_hours += r.effective_hours;
            summary.required_hours += r.demand_hours;
            summary.surplus_hours += r.surplus_hours;
            summary.scheduled_room_days += r.active_rooms;
            summary.required_room_days += r.optimized_rooms;
            summary.max_active_rooms = summary.max_active_rooms.max(r.active_rooms);
        }
        if !counted.is_empty() {
            summary.avg_active_rooms = summary.scheduled_room_days as f64 / counted.len() as f64;
        }
        if summary.total_supply_hours > 0.0 {
            summary.current_utilization_pct = summary.required_hours / summary.total_supply_hours * 100.0;
        }
        if summary.effective_supply_hours > 0.0 {
            summary.target_utilization_pct =
                summary.required_hours / summary.effective_supply_hours * 100.0;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupKey, GroupStatus, ProcedureInterval, TimeWindow};
    use proptest::prelude::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn case(id: &str, site: &str, room: &str, day: u32, start: i64, end: i64) -> ProcedureInterval {
        ProcedureInterval::new(id, site, date(day), room).with_patient_window(TimeWindow::new(start, end))
    }

    fn outcome(site: &str, day: u32, intervals: Vec<ProcedureInterval>) -> GroupOutcome {
        let rooms = intervals.iter().map(ProcedureInterval::room_key).collect::<BTreeSet<_>>().len();
        GroupOutcome::new(
            GroupKey::site(site, date(day)),
            vec![site.to_string()],
            intervals,
            rooms,
            Some(rooms),
            GroupStatus::Skipped,
        )
    }

    #[test]
    fn test_productivity_surplus() {
        let layout = ConsolidationConfig::new().validate().unwrap();
        let config = ConsolidationConfig::new().with_productivity_factor(0.8);
        let balancer = StaffingBalancer::new(&layout, &config);

        let outcomes = vec![outcome("A", 1, vec![case("c", "A", "OR 1", 1, 480, 600)])];
        let supply = vec![StaffingHours::new("Standalone: A", "N1", date(1), 10.0)];
        let records = balancer.balance(&outcomes, &supply);

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert!((r.demand_hours - 2.0).abs() < 1e-10);
        assert!((r.effective_hours - 8.0).abs() < 1e-10);
        assert!((r.surplus_hours - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_zero_supply_excluded() {
        let layout = ConsolidationConfig::new().validate().unwrap();
        let balancer = StaffingBalancer::new(&layout, &ConsolidationConfig::new());
        let outcomes = vec![
            outcome("A", 1, vec![case("a", "A", "OR 1", 1, 480, 600)]),
            outcome("B", 1, vec![case("b", "B", "OR 1", 1, 480, 540)]),
        ];
        let supply = vec![StaffingHours::new("Standalone: A", "N1", date(1), 8.0)];
        let records = balancer.balance(&outcomes, &supply);

        let b = records.iter().find(|r| r.region == "Standalone: B").unwrap();
        assert_eq!(b.surplus_hours, 0.0);
        assert!(!b.has_supply());

        let summary = balancer.summarize(&records);
        assert!((summary.total_supply_hours - 8.0).abs() < 1e-10);
        assert!((summary.required_hours - 2.0).abs() < 1e-10);
        assert_eq!(summary.scheduled_room_days, 1);
        assert!((summary.current_utilization_pct - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_supply_without_cases_ignored() {
        let layout = ConsolidationConfig::new().validate().unwrap();
        let balancer = StaffingBalancer::new(&layout, &ConsolidationConfig::new());
        let outcomes = vec![outcome("A", 1, vec![case("a", "A", "OR 1", 1, 480, 600)])];
        let supply = vec![
            StaffingHours::new("Standalone: A", "N1", date(2), 8.0),
            StaffingHours::new("Elsewhere", "N2", date(1), 8.0),
        ];
        let records = balancer.balance(&outcomes, &supply);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].supply_hours, 0.0);
    }

    #[test]
    fn test_region_map_and_distribution() {
        let layout = ConsolidationConfig::new()
            .with_region("Metro", ["A", "B"])
            .validate()
            .unwrap();
        let config = ConsolidationConfig::new().with_productivity_factor(1.0);
        let balancer = StaffingBalancer::new(&layout, &config);

        let mut outcomes = vec![
            outcome("A", 1, vec![case("a", "A", "OR 1", 1, 480, 660)]),
            outcome("B", 1, vec![case("b", "B", "OR 1", 1, 480, 540)]),
        ];
        let supply = vec![
            StaffingHours::new("Metro", "N1", date(1), 8.0),
            StaffingHours::new("Metro", "N2", date(1), 4.0),
        ];
        let records = balancer.balance(&outcomes, &supply);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].active_rooms, 2);
        assert!((records[0].surplus_hours - 8.0).abs() < 1e-10);

        balancer.distribute(&mut outcomes, &records);
        assert!((outcomes[0].surplus_staffing_hours - 6.0).abs() < 1e-10);
        assert!((outcomes[1].surplus_staffing_hours - 2.0).abs() < 1e-10);

        let summary = balancer.summarize(&records);
        assert_eq!(summary.region_count, 1);
        assert_eq!(summary.first_date, Some(date(1)));
        assert!((summary.target_utilization_pct - 100.0 * 4.0 / 12.0).abs() < 1e-10);
    }

    #[test]
    fn test_optimized_rooms_follow_slot_sites() {
        let layout = ConsolidationConfig::new().validate().unwrap();
        let balancer = StaffingBalancer::new(&layout, &ConsolidationConfig::new());
        let mut a = case("a", "A", "OR 1", 1, 480, 540);
        let mut b = case("b", "A", "OR 2", 1, 540, 600);
        a.assigned_slot = Some(SlotAssignment::new(0, "A"));
        b.assigned_slot = Some(SlotAssignment::new(0, "A"));
        let records = balancer.balance(&[outcome("A", 1, vec![a, b])], &[]);
        assert_eq!(records[0].active_rooms, 2);
        assert_eq!(records[0].optimized_rooms, 1);
    }

    proptest! {
        #[test]
        fn test_surplus_never_negative(
            minutes in prop::collection::vec(0i64..600, 1..6),
            hours in prop::collection::vec(0.0f64..24.0, 0..4),
            factor in 0.0f64..2.0,
        ) {
            let layout = ConsolidationConfig::new().validate().unwrap();
            let config = ConsolidationConfig::new().with_productivity_factor(factor);
            let balancer = StaffingBalancer::new(&layout, &config);
            let intervals: Vec<_> = minutes
                .iter()
                .enumerate()
                .map(|(i, m)| case(&format!("c{i}"), "A", "OR 1", 1, 0, *m))
                .collect();
            let supply: Vec<_> = hours
                .iter()
                .map(|h| StaffingHours::new("Standalone: A", "N", date(1), *h))
                .collect();
            let mut outcomes = vec![outcome("A", 1, intervals)];
            let records = balancer.balance(&outcomes, &supply);
            for r in &records {
                prop_assert!(r.surplus_hours >= 0.0);
                if !r.has_supply() {
                    prop_assert_eq!(r.surplus_hours, 0.0);
                }
            }
            balancer.distribute(&mut outcomes, &records);
            prop_assert!(outcomes[0].surplus_staffing_hours >= 0.0);
        }
    }
}
