//! Lower bounds on the slot count of a group.
//!
//! # Algorithm
//!
//! - **Volume**: `ceil(Σ occupancy durations / capacity)`.
//! - **Concurrency**: peak number of simultaneous raw patient windows,
//!   found by sweeping `+1`/`-1` events sorted by time, ends before
//!   starts on ties. Padding is ignored so that it cannot inflate the
//!   bound.
//!
//! The larger of the two is authoritative.
//!
//! # Reference
//! Martello & Toth (1990), "Knapsack Problems", Ch. 8.3 (Lower bounds L1)

use crate::models::ProcedureInterval;

/// Both lower bounds of one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowerBound {
    /// Volume bound.
    pub volume: usize,
    /// Concurrency bound.
    pub concurrency: usize,
}

impl LowerBound {
    /// Computes both bounds.
    pub fn compute(intervals: &[ProcedureInterval], capacity: i64) -> Self {
        Self {
            volume: volume_bound(intervals, capacity),
            concurrency: concurrency_bound(intervals),
        }
    }

    /// The authoritative (larger) bound.
    pub fn value(&self) -> usize {
        self.volume.max(self.concurrency)
    }
}

/// `ceil(total occupancy minutes / capacity)`.
pub fn volume_bound(intervals: &[ProcedureInterval], capacity: i64) -> usize {
    if capacity <= 0 {
        return intervals.len();
    }
    let total: i64 = intervals.iter().map(|iv| iv.duration_min.max(0)).sum();
    // i64 ceiling division for non-negative operands
    ((total + capacity - 1) / capacity) as usize
}

/// Peak overlap of raw patient windows.
pub fn concurrency_bound(intervals: &[ProcedureInterval]) -> usize {
    let mut events: Vec<(i64, i32)> = Vec::with_capacity(intervals.len() * 2);
    for iv in intervals {
        events.push((iv.patient.start_min, 1));
        events.push((iv.patient.end_min, -1));
    }
    events.sort_unstable();

    let mut current: i32 = 0;
    let mut peak: i32 = 0;
    for (_, delta) in events {
        current += delta;
        peak = peak.max(current);
    }
    peak as usize
}
