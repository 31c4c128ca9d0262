//! Procedure interval model.
//!
//! A procedure interval is one surgical case: the physical room it ran in,
//! three time windows, and the consolidated slot it ends up in.
//!
//! # Windows
//! - **Patient**: raw patient-in/patient-out, no padding. Drives the
//!   concurrency bound and the same-room safety rule.
//! - **Occupancy**: patient window plus turnover padding. Drives packing,
//!   capacity, and conflict detection.
//! - **Clinical**: anesthesia window. Read only by the labor calculators.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TimeWindow;

/// A physical operating room, identified by site and room name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomKey {
    /// Owning site.
    pub site: String,
    /// Room name within the site.
    pub room: String,
}

impl RoomKey {
    /// Creates a room key.
    pub fn new(site: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            room: room.into(),
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.site, self.room)
    }
}

/// The consolidated slot an interval was placed in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotAssignment {
    /// Slot position in packing order (0-based).
    pub index: usize,
    /// Site the slot is hosted at.
    pub site: String,
}

impl SlotAssignment {
    /// Creates a slot assignment.
    pub fn new(index: usize, site: impl Into<String>) -> Self {
        Self {
            index,
            site: site.into(),
        }
    }

    /// Display label, e.g. `"Site A - Consolidated Room B"`.
    pub fn label(&self) -> String {
        format!("{} - Consolidated Room {}", self.site, slot_letters(self.index))
    }
}

impl fmt::Display for SlotAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Spreadsheet-style letters: 0 → A, 25 → Z, 26 → AA.
pub fn slot_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// One surgical case to be packed.
///
/// Built with the `with_*` builders. The occupancy duration is derived
/// from the occupancy window and kept in `duration_min`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureInterval {
    /// Stable case identifier.
    pub id: String,
    /// Owning site.
    pub site: String,
    /// Calendar date of the case.
    pub date: NaiveDate,
    /// Original physical room name.
    pub room: String,
    /// Raw patient-in/out window.
    pub patient: TimeWindow,
    /// Padded occupancy window used for packing.
    pub occupancy: TimeWindow,
    /// Clinical (anesthesia) window used by the labor calculators.
    pub clinical: TimeWindow,
    /// Occupancy duration (minutes).
    pub duration_min: i64,
    /// Anesthesia provider, if recorded.
    pub provider: Option<String>,
    /// Slot written by the packer chosen for this interval's group.
    pub assigned_slot: Option<SlotAssignment>,
}

impl ProcedureInterval {
    /// Creates an interval with empty windows.
    pub fn new(
        id: impl Into<String>,
        site: impl Into<String>,
        date: NaiveDate,
        room: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            site: site.into(),
            date,
            room: room.into(),
            patient: TimeWindow::default(),
            occupancy: TimeWindow::default(),
            clinical: TimeWindow::default(),
            duration_min: 0,
            provider: None,
            assigned_slot: None,
        }
    }

    /// Sets the raw patient window. Occupancy and clinical windows follow
    /// it unpadded until set explicitly.
    pub fn with_patient_window(mut self, window: TimeWindow) -> Self {
        self.patient = window;
        self.occupancy = window;
        self.clinical = window;
        self.duration_min = window.duration_min();
        self
    }

    /// Sets the occupancy window and its duration.
    pub fn with_occupancy_window(mut self, window: TimeWindow) -> Self {
        self.occupancy = window;
        self.duration_min = window.duration_min();
        self
    }

    /// Derives the occupancy window from the patient window and padding.
    pub fn with_padding(self, before_min: i64, after_min: i64) -> Self {
        let padded = self.patient.padded(before_min, after_min);
        self.with_occupancy_window(padded)
    }

    /// Sets the clinical window.
    pub fn with_clinical_window(mut self, window: TimeWindow) -> Self {
        self.clinical = window;
        self
    }

    /// Sets the anesthesia provider.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// The physical room this case originally ran in.
    pub fn room_key(&self) -> RoomKey {
        RoomKey::new(&self.site, &self.room)
    }

    /// Provider name, ignoring blank values.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Label of the assigned slot, if any.
    pub fn slot_label(&self) -> Option<String> {
        self.assigned_slot.as_ref().map(SlotAssignment::label)
    }
}
