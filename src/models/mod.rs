//! Consolidation domain models.
//!
//! Plain data types shared by every stage of a run. Behavior here is
//! limited to construction, derived values and time-window tests.
//!
//! # Domain Mappings
//!
//! | Type | Operating theatre term |
//! |------|------------------------|
//! | `ProcedureInterval` | Surgical case |
//! | `RoomKey` | Physical operating room |
//! | `SlotAssignment` | Consolidated room |
//! | `ResourceGroup` | Site (or cluster) day |
//! | `StaffingHours` | Anesthesia staffing roster line |

mod group;
mod interval;
mod outcome;
mod staffing;
mod window;

pub use group::{GroupKey, ResourceGroup};
pub use interval::{slot_letters, ProcedureInterval, RoomKey, SlotAssignment};
pub use outcome::{AnesthesiaSavings, GroupOutcome, GroupStatus};
pub use staffing::{RegionalStaffingRecord, StaffingHours, StaffingSummary};
pub use window::TimeWindow;
