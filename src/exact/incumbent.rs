//! Incumbent shared by the parallel search workers.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use super::Assignment;

/// Best assignment found so far, readable without locking.
///
/// The objective is mirrored in an atomic so workers can prune against it
/// on every node. The assignment itself sits behind a mutex and is only
/// touched on improvement.
#[derive(Debug)]
pub struct SharedIncumbent {
    upper_bound: AtomicI64,
    solution: Mutex<Option<Assignment>>,
}

impl Default for SharedIncumbent {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedIncumbent {
    /// Creates an empty incumbent with an upper bound of `i64::MAX`.
    pub fn new() -> Self {
        Self {
            upper_bound: AtomicI64::new(i64::MAX),
            solution: Mutex::new(None),
        }
    }

    /// Objective of the incumbent, or `i64::MAX` if none.
    #[inline]
    pub fn upper_bound(&self) -> i64 {
        self.upper_bound.load(Ordering::Relaxed)
    }

    /// Copy of the incumbent assignment.
    pub fn snapshot(&self) -> Option<Assignment> {
        match self.solution.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Installs `candidate` if it strictly improves the incumbent.
    pub fn try_install(&self, candidate: &Assignment) -> bool {
        if candidate.objective >= self.upper_bound() {
            return false;
        }

        let mut guard = match self.solution.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Re-check under the lock; another worker may have won the race.
        if let Some(current) = guard.as_ref() {
            if candidate.objective >= current.objective {
                return false;
            }
        }

        *guard = Some(candidate.clone());
        self.upper_bound.store(candidate.objective, Ordering::Relaxed);
        true
    }
}
