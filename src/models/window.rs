//! Minute-resolution time windows.
//!
//! # Time Model
//! All times are integer minutes from midnight of the case date.
//! Windows never cross midnight; the ingestion layer rejects such rows.
//!
//! Windows are half-open: `[start_min, end_min)`. Two windows that touch
//! (`a.end_min == b.start_min`) do not overlap.

use serde::{Deserialize, Serialize};

/// A time interval `[start, end)` in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Interval start (minutes, inclusive).
    pub start_min: i64,
    /// Interval end (minutes, exclusive).
    pub end_min: i64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start_min: i64, end_min: i64) -> Self {
        Self { start_min, end_min }
    }

    /// Creates a window from `(hour, minute)` pairs.
    pub fn from_hm(start: (i64, i64), end: (i64, i64)) -> Self {
        Self::new(start.0 * 60 + start.1, end.0 * 60 + end.1)
    }

    /// Duration of this window (minutes). Negative for malformed windows.
    #[inline]
    pub fn duration_min(&self) -> i64 {
        self.end_min - self.start_min
    }

    /// Whether a timestamp falls within this window.
    #[inline]
    pub fn contains(&self, time_min: i64) -> bool {
        time_min >= self.start_min && time_min < self.end_min
    }

    /// Whether `other` lies entirely inside this window.
    pub fn encloses(&self, other: &Self) -> bool {
        self.start_min <= other.start_min && other.end_min <= self.end_min
    }

    /// Whether two windows overlap (open-interval test).
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_min < other.end_min && other.start_min < self.end_min
    }

    /// Returns the window widened by `before` minutes at the start and
    /// `after` minutes at the end.
    pub fn padded(&self, before: i64, after: i64) -> Self {
        Self::new(self.start_min - before, self.end_min + after)
    }

    /// Duration clamped at zero.
    #[inline]
    pub fn length_min(&self) -> i64 {
        self.duration_min().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_from_hm() {
        let w = TimeWindow::from_hm((8, 0), (10, 30));
        assert_eq!(w.start_min, 480);
        assert_eq!(w.end_min, 630);
        assert_eq!(w.duration_min(), 150);
    }

    #[test]
    fn test_window_overlap_is_open() {
        let a = TimeWindow::new(0, 100);
        let b = TimeWindow::new(100, 200);
        let c = TimeWindow::new(99, 150);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }

    #[test]
    fn test_window_padding() {
        let w = TimeWindow::from_hm((8, 0), (10, 0)).padded(10, 10);
        assert_eq!(w, TimeWindow::from_hm((7, 50), (10, 10)));
        assert!(w.encloses(&TimeWindow::from_hm((8, 0), (10, 0))));
    }

    #[test]
    fn test_window_contains() {
        let w = TimeWindow::new(10, 20);
        assert!(w.contains(10));
        assert!(w.contains(19));
        assert!(!w.contains(20));
        assert_eq!(TimeWindow::new(20, 10).length_min(), 0);
    }
}
