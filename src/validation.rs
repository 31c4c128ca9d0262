//! Input validation for consolidation runs.
//!
//! Checks structural integrity of procedure intervals before grouping.
//! Detects:
//! - Duplicate IDs
//! - Negative windows
//! - Occupancy durations that disagree with their window
//! - Occupancy windows that do not cover the patient window
//! - Empty site or room names
//!
//! Every call builds its own seen-id set, so concurrent runs never share
//! validator state.
//!
//! Durations longer than the slot capacity are not validation errors. The
//! orchestrator reports them as infeasible groups and keeps going.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::ProcedureInterval;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Offending interval.
    pub interval_id: String,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two intervals share the same ID.
    DuplicateId,
    /// A window ends before it starts.
    NegativeWindow,
    /// `duration_min` differs from the occupancy window length.
    DurationMismatch,
    /// The occupancy window does not contain the patient window.
    UncoveredPatientWindow,
    /// Site or room name is blank.
    MissingLocation,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, interval_id: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            interval_id: interval_id.to_string(),
            message: message.into(),
        }
    }
}

/// Validates the intervals of one run.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_intervals(intervals: &[ProcedureInterval]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut seen_ids = HashSet::with_capacity(intervals.len());

    for iv in intervals {
        if !seen_ids.insert(iv.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                &iv.id,
                format!("Duplicate interval ID: {}", iv.id),
            ));
        }

        if iv.site.trim().is_empty() || iv.room.trim().is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingLocation,
                &iv.id,
                format!("Interval '{}' has no site or room", iv.id),
            ));
        }

        for (name, window) in [
            ("patient", iv.patient),
            ("occupancy", iv.occupancy),
            ("clinical", iv.clinical),
        ] {
            if window.duration_min() < 0 {
                errors.push(ValidationError::new(
                    ValidationErrorKind::NegativeWindow,
                    &iv.id,
                    format!(
                        "Interval '{}' {} window ends before it starts ({} > {})",
                        iv.id, name, window.start_min, window.end_min
                    ),
                ));
            }
        }

        if iv.duration_min != iv.occupancy.duration_min() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DurationMismatch,
                &iv.id,
                format!(
                    "Interval '{}' duration {} does not match occupancy window {}",
                    iv.id,
                    iv.duration_min,
                    iv.occupancy.duration_min()
                ),
            ));
        }

        if !iv.occupancy.encloses(&iv.patient) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UncoveredPatientWindow,
                &iv.id,
                format!("Interval '{}' occupancy window does not cover the patient window", iv.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;
    use chrono::NaiveDate;

    fn case(id: &str) -> ProcedureInterval {
        ProcedureInterval::new(id, "S", NaiveDate::from_ymd_opt(2025, 2, 3).unwrap(), "OR 1")
            .with_patient_window(TimeWindow::from_hm((8, 0), (9, 0)))
            .with_padding(10, 10)
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_intervals(&[case("a"), case("b")]).is_ok());
        assert!(validate_intervals(&[]).is_ok());
    }

    #[test]
    fn test_duplicate_id() {
        let errs = validate_intervals(&[case("a"), case("a")]).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].kind, ValidationErrorKind::DuplicateId);
        assert_eq!(errs[0].interval_id, "a");
    }

    #[test]
    fn test_negative_window() {
        let iv = case("a").with_clinical_window(TimeWindow::new(100, 50));
        let errs = validate_intervals(&[iv]).unwrap_err();
        assert!(errs.iter().any(|e| e.kind == ValidationErrorKind::NegativeWindow));
    }

    #[test]
    fn test_duration_mismatch() {
        let mut iv = case("a");
        iv.duration_min += 5;
        let errs = validate_intervals(&[iv]).unwrap_err();
        assert_eq!(errs[0].kind, ValidationErrorKind::DurationMismatch);
    }

    #[test]
    fn test_negative_padding() {
        let iv = case("a").with_padding(-5, 0);
        let errs = validate_intervals(&[iv]).unwrap_err();
        assert_eq!(errs[0].kind, ValidationErrorKind::UncoveredPatientWindow);
    }

    #[test]
    fn test_missing_location() {
        let mut iv = case("a");
        iv.room = " ".into();
        let errs = validate_intervals(&[iv]).unwrap_err();
        assert_eq!(errs[0].kind, ValidationErrorKind::MissingLocation);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut bad = case("a");
        bad.site.clear();
        bad.duration_min = -1;
        let errs = validate_intervals(&[bad, case("a")]).unwrap_err();
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn test_state_not_shared_between_calls() {
        assert!(validate_intervals(&[case("a")]).is_ok());
        assert!(validate_intervals(&[case("a")]).is_ok());
    }
}
