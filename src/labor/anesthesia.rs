//! Anesthesia provider savings.
//!
//! Three complementary estimates of how many providers a consolidation
//! frees up. All of them read clinical windows widened by half the
//! configured clinical padding on each side.
//!
//! # Methods
//!
//! | Method | Counts |
//! |--------|--------|
//! | 1: room elimination | absorbable providers whose every original room was eliminated |
//! | 2: FTE efficiency | `⌊(room window minutes before − after) / threshold⌋`, minus 1 + 3 |
//! | 3: absorption | absorbable providers not counted by Method 1 |
//!
//! # Absorption
//! Providers are visited smallest caseload first. A provider is absorbable
//! when each of their padded windows fits into the timeline of some other
//! provider who has not been absorbed and is free for that whole window.
//! Absorbed cases are added to the absorber's timeline, so one gap cannot
//! host two cases, and a later absorbed provider must also hand off the
//! work it took over.
//!
//! # Eliminated rooms
//! Each consolidated slot, heaviest first, keeps the physical room that
//! contributes most of its minutes and is not yet kept by another slot.
//! Slots left without one take the first free room of their site. The
//! physical rooms nobody kept are eliminated.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{AnesthesiaMethods, ConsolidationConfig};
use crate::models::{AnesthesiaSavings, ProcedureInterval, RoomKey, SlotAssignment, TimeWindow};

/// Computes [`AnesthesiaSavings`] for one group.
#[derive(Debug, Clone)]
pub struct AnesthesiaCalculator {
    methods: AnesthesiaMethods,
    padding_per_side: i64,
    fte_threshold_minutes: i64,
}

impl AnesthesiaCalculator {
    /// Creates a calculator from the run configuration.
    pub fn new(config: &ConsolidationConfig) -> Self {
        Self {
            methods: config.anesthesia_methods,
            padding_per_side: config.clinical_padding_per_side(),
            fte_threshold_minutes: config.fte_threshold_minutes,
        }
    }

    /// Sets the method toggles.
    pub fn with_methods(mut self, methods: AnesthesiaMethods) -> Self {
        self.methods = methods;
        self
    }

    /// Sets the total clinical padding (half is applied per side).
    pub fn with_padding(mut self, total_minutes: i64) -> Self {
        self.padding_per_side = total_minutes / 2;
        self
    }

    /// Sets the Method 2 threshold.
    pub fn with_fte_threshold(mut self, minutes: i64) -> Self {
        self.fte_threshold_minutes = minutes;
        self
    }

    fn padded(&self, iv: &ProcedureInterval) -> TimeWindow {
        iv.clinical.padded(self.padding_per_side, self.padding_per_side)
    }

    /// Computes all enabled methods.
    ///
    /// `intervals` carry both their original room and their assigned slot.
    /// Disabled methods report 0.
    pub fn calculate(
        &self,
        intervals: &[ProcedureInterval],
        actual_rooms: &BTreeSet<RoomKey>,
    ) -> AnesthesiaSavings {
        if intervals.is_empty() {
            return AnesthesiaSavings::default();
        }

        let absorbable = self.absorbable_providers(intervals);
        let eliminated = eliminated_rooms(intervals, actual_rooms);

        let mut rooms_by_provider: HashMap<&str, BTreeSet<RoomKey>> = HashMap::new();
        for iv in intervals {
            if let Some(name) = iv.provider_name() {
                rooms_by_provider.entry(name).or_default().insert(iv.room_key());
            }
        }

        let method1 = absorbable
            .iter()
            .filter(|name| {
                rooms_by_provider
                    .get(name.as_str())
                    .is_some_and(|rooms| !rooms.is_empty() && rooms.is_subset(&eliminated))
            })
            .count();
        let method3 = absorbable.len().saturating_sub(method1);
        let method2 = self.fte_efficiency(intervals, method1 + method3, rooms_by_provider.len());

        AnesthesiaSavings::new(
            if self.methods.room_elimination { method1 } else { 0 },
            if self.methods.fte_efficiency { method2 } else { 0 },
            if self.methods.absorption { method3 } else { 0 },
        )
    }

    /// Providers whose whole caseload fits into colleagues' free time.
    pub fn absorbable_providers(&self, intervals: &[ProcedureInterval]) -> BTreeSet<String> {
        let mut timelines: BTreeMap<&str, Vec<TimeWindow>> = BTreeMap::new();
        for iv in intervals {
            if let Some(name) = iv.provider_name() {
                timelines.entry(name).or_default().push(self.padded(iv));
            }
        }
        if timelines.len() <= 1 {
            return BTreeSet::new();
        }

        // Ordered by original caseload; windows are read when the candidate
        // comes up so that work it already absorbed moves with it.
        let mut candidates: Vec<(&str, usize)> =
            timelines.iter().map(|(name, w)| (*name, w.len())).collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

        let mut absorbed: BTreeSet<String> = BTreeSet::new();
        for (candidate, _) in candidates {
            let mut windows = timelines.get(candidate).cloned().unwrap_or_default();
            windows.sort_by_key(|w| w.start_min);
            let mut plan: Vec<(&str, TimeWindow)> = Vec::with_capacity(windows.len());
            let feasible = windows.iter().all(|window| {
                let absorber = timelines.iter().find(|(name, timeline)| {
                    **name != candidate
                        && !absorbed.contains(**name)
                        && is_free(timeline, window)
                        && plan.iter().all(|(taken_by, taken)| taken_by != *name || !taken.overlaps(window))
                });
                match absorber {
                    Some((name, _)) => {
                        plan.push((*name, *window));
                        true
                    }
                    None => false,
                }
            });

            if feasible {
                for (name, window) in plan {
                    if let Some(timeline) = timelines.get_mut(name) {
                        timeline.push(window);
                    }
                }
                absorbed.insert(candidate.to_string());
            }
        }
        absorbed
    }

    fn fte_efficiency(&self, intervals: &[ProcedureInterval], already_saved: usize, active: usize) -> usize {
        if active == 0 || self.fte_threshold_minutes <= 0 {
            return 0;
        }
        let before = self.room_window_minutes(intervals, |iv| iv.room_key().to_string());
        let after = self.room_window_minutes(intervals, |iv| match &iv.assigned_slot {
            Some(slot) => slot.label(),
            None => "Unknown".to_string(),
        });
        let saved = (before - after).max(0);
        let ftes = (saved / self.fte_threshold_minutes) as usize;
        ftes.saturating_sub(already_saved)
            .min(active.saturating_sub(already_saved))
    }

    /// Sum over rooms of (latest padded end − earliest padded start).
    fn room_window_minutes<F>(&self, intervals: &[ProcedureInterval], room_of: F) -> i64
    where
        F: Fn(&ProcedureInterval) -> String,
    {
        let mut spans: HashMap<String, (i64, i64)> = HashMap::new();
        for iv in intervals {
            let w = self.padded(iv);
            let span = spans.entry(room_of(iv)).or_insert((w.start_min, w.end_min));
            span.0 = span.0.min(w.start_min);
            span.1 = span.1.max(w.end_min);
        }
        spans.values().map(|(start, end)| end - start).sum()
    }
}

fn is_free(timeline: &[TimeWindow], window: &TimeWindow) -> bool {
    timeline.iter().all(|busy| !busy.overlaps(window))
}

/// Physical rooms no consolidated slot keeps.
pub fn eliminated_rooms(
    intervals: &[ProcedureInterval],
    actual_rooms: &BTreeSet<RoomKey>,
) -> BTreeSet<RoomKey> {
    // minutes each physical room contributes to each slot
    let mut slots: BTreeMap<SlotAssignment, BTreeMap<RoomKey, i64>> = BTreeMap::new();
    for iv in intervals {
        if let Some(slot) = &iv.assigned_slot {
            *slots
                .entry(slot.clone())
                .or_default()
                .entry(iv.room_key())
                .or_default() += iv.duration_min;
        }
    }
    if slots.is_empty() {
        return BTreeSet::new();
    }

    let mut ordered: Vec<(&SlotAssignment, &BTreeMap<RoomKey, i64>, i64)> = slots
        .iter()
        .map(|(slot, rooms)| (slot, rooms, rooms.values().sum()))
        .collect();
    ordered.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.index.cmp(&b.0.index)));

    let mut kept: BTreeSet<RoomKey> = BTreeSet::new();
    let mut unanchored: Vec<&SlotAssignment> = Vec::new();
    for (slot, rooms, _) in &ordered {
        let anchor = rooms
            .iter()
            .filter(|(room, _)| !kept.contains(*room))
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(room, _)| room.clone());
        match anchor {
            Some(room) => {
                kept.insert(room);
            }
            None => unanchored.push(*slot),
        }
    }
    for slot in unanchored {
        let spare = actual_rooms
            .iter()
            .find(|room| room.site == slot.site && !kept.contains(*room))
            .or_else(|| actual_rooms.iter().find(|room| !kept.contains(*room)))
            .cloned();
        if let Some(room) = spare {
            kept.insert(room);
        }
    }

    actual_rooms.difference(&kept).cloned().collect()
}
