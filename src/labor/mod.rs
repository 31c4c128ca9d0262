//! Labor metrics derived from a consolidated plan.
//!
//! - [`anesthesia`]: provider savings from room elimination, FTE
//!   efficiency and absorption
//! - [`staffing`]: regional demand against staffed hours

pub mod anesthesia;
pub mod staffing;

pub use anesthesia::{eliminated_rooms, AnesthesiaCalculator};
pub use staffing::StaffingBalancer;
