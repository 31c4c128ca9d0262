//! Consolidation summary metrics.
//!
//! Aggregates per-group outcomes into run-level indicators and weekly
//! rollups.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Rooms saved | Σ max(0, actual − optimized) |
//! | Group-days with savings | groups with rooms saved > 0 |
//! | Current utilization | occupancy minutes / (actual rooms × capacity) |
//! | Optimized utilization | occupancy minutes / (optimized rooms × capacity) |
//! | Labor yield | clinical minutes / (room-days × capacity) |
//! | Prime-time utilization | patient minutes inside 07:00-15:00 / (room-days × 480) |
//! | First case on time | room-days whose first patient-in is at or before 07:30 |
//! | Average turnover | mean gap between consecutive cases of a room-day |
//!
//! Infeasible groups count at their actual rooms on both sides. A room-day
//! is one physical room (site and room) on one date. Turnover only counts
//! positive gaps and is 0 when there are none.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{AnesthesiaSavings, GroupOutcome, ProcedureInterval, StaffingSummary};

/// Prime-time block in minutes from midnight (07:00-15:00).
pub const PRIME_TIME: (i64, i64) = (7 * 60, 15 * 60);

/// Latest on-time first-case start (07:30).
pub const FIRST_CASE_TARGET_MIN: i64 = 7 * 60 + 30;

/// Run-level consolidation indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Physical rooms used before optimization.
    pub total_actual_rooms: usize,
    /// Rooms used after optimization.
    pub total_optimized_rooms: usize,
    /// Rooms saved.
    pub total_rooms_saved: usize,
    /// Number of groups (one site or cluster on one date).
    pub group_days: usize,
    /// Groups that saved at least one room.
    pub group_days_with_savings: usize,
    /// Occupancy minutes.
    pub total_minutes: i64,
    /// Utilization of the actual rooms (%).
    pub current_utilization_pct: f64,
    /// Utilization of the optimized rooms (%).
    pub optimized_utilization_pct: f64,
    /// Clinical minutes over room-day capacity (%).
    pub labor_yield_pct: f64,
    /// Patient minutes inside the prime-time block over room-days (%).
    pub prime_time_utilization_pct: f64,
    /// Room-days starting on time (%).
    pub first_case_on_time_pct: f64,
    /// Mean gap between consecutive cases in one room (minutes).
    pub avg_turnover_minutes: f64,
    /// Anesthesia savings summed over groups.
    pub anesthesia: AnesthesiaSavings,
    /// Groups per status tag.
    pub status_counts: BTreeMap<String, usize>,
    /// Regional staffing balance.
    pub staffing: StaffingSummary,
}

impl SummaryMetrics {
    /// Computes the metrics from the outcomes of one run.
    ///
    /// # Arguments
    /// * `outcomes` - Per-group outcomes.
    /// * `capacity` - Slot capacity (minutes).
    /// * `staffing` - Regional staffing summary of the same run.
    pub fn calculate(outcomes: &[GroupOutcome], capacity: i64, staffing: StaffingSummary) -> Self {
        let mut metrics = Self {
            staffing,
            group_days: outcomes.len(),
            ..Self::default()
        };

        for outcome in outcomes {
            metrics.total_actual_rooms += outcome.actual_rooms;
            metrics.total_optimized_rooms += outcome.optimized_rooms.unwrap_or(outcome.actual_rooms);
            metrics.total_rooms_saved += outcome.rooms_saved;
            if outcome.rooms_saved > 0 {
                metrics.group_days_with_savings += 1;
            }
            metrics.total_minutes += outcome.total_minutes();
            metrics.anesthesia.accumulate(&outcome.anesthesia);
            *metrics
                .status_counts
                .entry(outcome.status.as_str().to_string())
                .or_default() += 1;
        }

        metrics.current_utilization_pct =
            utilization_pct(metrics.total_minutes, metrics.total_actual_rooms, capacity);
        metrics.optimized_utilization_pct =
            utilization_pct(metrics.total_minutes, metrics.total_optimized_rooms, capacity);
        metrics.apply_room_day_kpis(outcomes, capacity);
        metrics
    }

    fn apply_room_day_kpis(&mut self, outcomes: &[GroupOutcome], capacity: i64) {
        let mut room_days: BTreeMap<(&str, NaiveDate, &str), Vec<&ProcedureInterval>> = BTreeMap::new();
        for iv in outcomes.iter().flat_map(|o| &o.intervals) {
            room_days
                .entry((iv.site.as_str(), iv.date, iv.room.as_str()))
                .or_default()
                .push(iv);
        }
        if room_days.is_empty() {
            return;
        }

        let mut clinical_minutes = 0;
        let mut prime_minutes = 0;
        let mut on_time = 0;
        let mut turnover_total = 0;
        let mut turnovers = 0;
        for cases in room_days.values_mut() {
            cases.sort_by_key(|iv| iv.patient.start_min);
            clinical_minutes += cases.iter().map(|iv| iv.clinical.length_min()).sum::<i64>();
            prime_minutes += cases
                .iter()
                .map(|iv| (iv.patient.end_min.min(PRIME_TIME.1) - iv.patient.start_min.max(PRIME_TIME.0)).max(0))
                .sum::<i64>();
            if cases.first().is_some_and(|iv| iv.patient.start_min <= FIRST_CASE_TARGET_MIN) {
                on_time += 1;
            }
            for pair in cases.windows(2) {
                let gap = pair[1].patient.start_min - pair[0].patient.end_min;
                if gap > 0 {
                    turnover_total += gap;
                    turnovers += 1;
                }
            }
        }

        let count = room_days.len();
        self.labor_yield_pct = utilization_pct(clinical_minutes, count, capacity);
        self.prime_time_utilization_pct = utilization_pct(prime_minutes, count, PRIME_TIME.1 - PRIME_TIME.0);
        self.first_case_on_time_pct = on_time as f64 / count as f64 * 100.0;
        if turnovers > 0 {
            self.avg_turnover_minutes = turnover_total as f64 / turnovers as f64;
        }
    }
}

fn utilization_pct(minutes: i64, rooms: usize, capacity: i64) -> f64 {
    let available = rooms as i64 * capacity;
    if available <= 0 {
        0.0
    } else {
        minutes as f64 / available as f64 * 100.0
    }
}

/// One group name's totals over one ISO week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRollup {
    /// Site or cluster name.
    pub name: String,
    /// Whether `name` is a cluster id.
    pub cluster: bool,
    /// ISO week-numbering year.
    pub iso_year: i32,
    /// ISO week number.
    pub iso_week: u32,
    /// First case date in the week.
    pub week_start: NaiveDate,
    /// Dates with cases.
    pub days: usize,
    /// Number of cases.
    pub cases: usize,
    /// Physical rooms used.
    pub actual_rooms: usize,
    /// Rooms used after optimization.
    pub optimized_rooms: usize,
    /// Rooms saved.
    pub rooms_saved: usize,
    /// Occupancy minutes.
    pub minutes: i64,
    /// `optimized_rooms × capacity`.
    pub capacity_minutes: i64,
    /// Capacity minutes left unused, never negative.
    pub unused_minutes: i64,
}

/// Rolls outcomes up per group name and ISO week, sorted by name then week.
/// A cluster and a standalone site with the same name roll up apart.
pub fn weekly_rollup(outcomes: &[GroupOutcome], capacity: i64) -> Vec<WeeklyRollup> {
    let mut weeks: BTreeMap<(String, bool, i32, u32), (WeeklyRollup, BTreeSet<NaiveDate>)> = BTreeMap::new();

    for outcome in outcomes {
        let week = outcome.key.date.iso_week();
        let (rollup, dates) = weeks
            .entry((outcome.key.name.clone(), outcome.key.cluster, week.year(), week.week()))
            .or_insert_with(|| {
                (
                    WeeklyRollup {
                        name: outcome.key.name.clone(),
                        cluster: outcome.key.cluster,
                        iso_year: week.year(),
                        iso_week: week.week(),
                        week_start: outcome.key.date,
                        days: 0,
                        cases: 0,
                        actual_rooms: 0,
                        optimized_rooms: 0,
                        rooms_saved: 0,
                        minutes: 0,
                        capacity_minutes: 0,
                        unused_minutes: 0,
                    },
                    BTreeSet::new(),
                )
            });

        dates.insert(outcome.key.date);
        rollup.week_start = rollup.week_start.min(outcome.key.date);
        rollup.cases += outcome.intervals.len();
        rollup.actual_rooms += outcome.actual_rooms;
        rollup.optimized_rooms += outcome.optimized_rooms.unwrap_or(outcome.actual_rooms);
        rollup.rooms_saved += outcome.rooms_saved;
        rollup.minutes += outcome.total_minutes();
    }

    weeks
        .into_values()
        .map(|(mut rollup, dates)| {
            rollup.days = dates.len();
            rollup.capacity_minutes = rollup.optimized_rooms as i64 * capacity;
            rollup.unused_minutes = (rollup.capacity_minutes - rollup.minutes).max(0);
            rollup
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupKey, GroupStatus, ProcedureInterval, TimeWindow};

    fn outcome(name: &str, day: u32, minutes: &[i64], actual: usize, optimized: Option<usize>) -> GroupOutcome {
        let date = NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        let intervals = minutes
            .iter()
            .enumerate()
            .map(|(i, m)| {
                ProcedureInterval::new(format!("{name}-{day}-{i}"), name, date, format!("OR {i}"))
                    .with_patient_window(TimeWindow::new(0, *m))
            })
            .collect();
        let status = match optimized {
            None => GroupStatus::Infeasible,
            Some(o) if o < actual => GroupStatus::HeuristicOptimal,
            Some(_) => GroupStatus::NoSavingsPossible,
        };
        GroupOutcome::new(GroupKey::site(name, date), vec![name.to_string()], intervals, actual, optimized, status)
    }

    #[test]
    fn test_summary_totals() {
        let mut saved = outcome("A", 2, &[240, 240, 240], 3, Some(2));
        saved.anesthesia = AnesthesiaSavings::new(1, 0, 1);
        let outcomes = vec![
            saved,
            outcome("B", 2, &[480], 1, Some(1)),
            outcome("C", 2, &[600], 1, None),
        ];

        let m = SummaryMetrics::calculate(&outcomes, 480, StaffingSummary::default());
        assert_eq!(m.group_days, 3);
        assert_eq!(m.group_days_with_savings, 1);
        assert_eq!(m.total_actual_rooms, 5);
        assert_eq!(m.total_optimized_rooms, 4);
        assert_eq!(m.total_rooms_saved, 1);
        assert_eq!(m.total_minutes, 1800);
        assert_eq!(m.anesthesia.total, 2);
        assert_eq!(m.status_counts["INFEASIBLE"], 1);
        assert_eq!(m.status_counts["FFD_OPTIMAL"], 1);
        // 1800 / (5 × 480) and 1800 / (4 × 480)
        assert!((m.current_utilization_pct - 75.0).abs() < 1e-10);
        assert!((m.optimized_utilization_pct - 93.75).abs() < 1e-10);
    }

    #[test]
    fn test_summary_empty() {
        let m = SummaryMetrics::calculate(&[], 480, StaffingSummary::default());
        assert_eq!(m.group_days, 0);
        assert_eq!(m.current_utilization_pct, 0.0);
        assert_eq!(m.labor_yield_pct, 0.0);
        assert_eq!(m.first_case_on_time_pct, 0.0);
        assert_eq!(m.avg_turnover_minutes, 0.0);
        assert!(m.status_counts.is_empty());
    }

    #[test]
    fn test_room_day_kpis() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let case = |id: &str, room: &str, start: (i64, i64), end: (i64, i64)| {
            ProcedureInterval::new(id, "A", date, room).with_patient_window(TimeWindow::from_hm(start, end))
        };
        let intervals = vec![
            case("c3", "OR 2", (8, 0), (16, 0)),
            case("c2", "OR 1", (9, 30), (11, 0)),
            case("c1", "OR 1", (7, 0), (9, 0)).with_clinical_window(TimeWindow::from_hm((6, 45), (9, 0))),
        ];
        let outcome = GroupOutcome::new(
            GroupKey::site("A", date),
            vec!["A".to_string()],
            intervals,
            2,
            Some(2),
            GroupStatus::NoSavingsPossible,
        );

        let m = SummaryMetrics::calculate(&[outcome], 480, StaffingSummary::default());
        // (135 + 90 + 480) / (2 × 480)
        assert!((m.labor_yield_pct - 73.4375).abs() < 1e-10);
        // (120 + 90 + 420) / (2 × 480)
        assert!((m.prime_time_utilization_pct - 65.625).abs() < 1e-10);
        // OR 1 opens at 07:00, OR 2 at 08:00
        assert!((m.first_case_on_time_pct - 50.0).abs() < 1e-10);
        assert!((m.avg_turnover_minutes - 30.0).abs() < 1e-10);
    }

    #[test]
    fn test_touching_cases_have_no_turnover() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let intervals = vec![
            ProcedureInterval::new("a", "A", date, "OR 1").with_patient_window(TimeWindow::from_hm((7, 30), (9, 0))),
            ProcedureInterval::new("b", "A", date, "OR 1").with_patient_window(TimeWindow::from_hm((9, 0), (10, 0))),
        ];
        let outcome = GroupOutcome::new(
            GroupKey::site("A", date),
            vec!["A".to_string()],
            intervals,
            1,
            Some(1),
            GroupStatus::Skipped,
        );

        let m = SummaryMetrics::calculate(&[outcome], 480, StaffingSummary::default());
        assert_eq!(m.avg_turnover_minutes, 0.0);
        assert!((m.first_case_on_time_pct - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_weekly_rollup() {
        // 2025-06-02 is a Monday; 2025-06-09 starts the next ISO week.
        let outcomes = vec![
            outcome("A", 3, &[120, 120], 2, Some(1)),
            outcome("A", 2, &[300, 300], 2, Some(2)),
            outcome("A", 9, &[60], 1, Some(1)),
            outcome("B", 2, &[60], 1, Some(1)),
        ];
        let weeks = weekly_rollup(&outcomes, 480);
        assert_eq!(weeks.len(), 3);

        let first = &weeks[0];
        assert_eq!((first.name.as_str(), first.iso_year, first.iso_week), ("A", 2025, 23));
        assert_eq!(first.week_start, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert!(!first.cluster);
        assert_eq!(first.days, 2);
        assert_eq!(first.cases, 4);
        assert_eq!(first.actual_rooms, 4);
        assert_eq!(first.optimized_rooms, 3);
        assert_eq!(first.rooms_saved, 1);
        assert_eq!(first.minutes, 840);
        assert_eq!(first.capacity_minutes, 1440);
        assert_eq!(first.unused_minutes, 600);

        assert_eq!((weeks[1].name.as_str(), weeks[1].iso_week), ("A", 24));
        assert_eq!(weeks[2].name, "B");
    }
}
