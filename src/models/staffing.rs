//! Staffing supply and regional balance records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Hours one provider is staffed in a region on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingHours {
    /// Region the hours belong to.
    pub region: String,
    /// Provider the hours belong to.
    pub provider: String,
    /// Staffed date.
    pub date: NaiveDate,
    /// Scheduled hours.
    pub hours: f64,
}

impl StaffingHours {
    /// Creates a supply record.
    pub fn new(
        region: impl Into<String>,
        provider: impl Into<String>,
        date: NaiveDate,
        hours: f64,
    ) -> Self {
        Self {
            region: region.into(),
            provider: provider.into(),
            date,
            hours,
        }
    }
}

/// Demand and supply balance for one region on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalStaffingRecord {
    /// Region name.
    pub region: String,
    /// Date.
    pub date: NaiveDate,
    /// Clinical-window hours required.
    pub demand_hours: f64,
    /// Staffed hours.
    pub supply_hours: f64,
    /// Staffed hours after the productivity factor.
    pub effective_hours: f64,
    /// `max(0, effective - demand)`; 0 when there is no supply.
    pub surplus_hours: f64,
    /// Distinct physical rooms used in the region on the date.
    pub active_rooms: usize,
    /// Consolidated rooms hosted in the region on the date.
    pub optimized_rooms: usize,
}

impl RegionalStaffingRecord {
    /// Whether any supply was recorded for this slice.
    pub fn has_supply(&self) -> bool {
        self.supply_hours > 0.0
    }
}

/// Aggregate staffing balance over all slices with supply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaffingSummary {
    /// Staffed hours.
    pub total_supply_hours: f64,
    /// Staffed hours after productivity.
    pub effective_supply_hours: f64,
    /// Required clinical hours.
    pub required_hours: f64,
    /// Surplus hours.
    pub surplus_hours: f64,
    /// `required / supply * 100`.
    pub current_utilization_pct: f64,
    /// `required / effective * 100`.
    pub target_utilization_pct: f64,
    /// Mean active rooms per counted slice.
    pub avg_active_rooms: f64,
    /// Largest active room count of any counted slice.
    pub max_active_rooms: usize,
    /// Room-days scheduled in counted slices.
    pub scheduled_room_days: usize,
    /// Room-days required after optimization in counted slices.
    pub required_room_days: usize,
    /// Number of configured regions.
    pub region_count: usize,
    /// Earliest case date.
    pub first_date: Option<NaiveDate>,
    /// Latest case date.
    pub last_date: Option<NaiveDate>,
}
