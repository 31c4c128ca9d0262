//! Operating-room consolidation.
//!
//! Packs the surgical cases of each site (or cluster of sites) and date
//! into as few consolidated rooms as capacity and turnover safety allow,
//! then estimates the anesthesia staffing that the consolidation frees.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `ProcedureInterval`, `TimeWindow`,
//!   `RoomKey`, `SlotAssignment`, `ResourceGroup`, `GroupOutcome`,
//!   staffing records
//! - **`config`**: `ConsolidationConfig` (TOML or builders) and the
//!   validated `SiteLayout`
//! - **`validation`**: Input integrity checks (duplicate IDs, window shape)
//! - **`grouping`**: Site/cluster + date grouping
//! - **`conflict`**: Pairwise conflict rule and `ConflictGraph`
//! - **`packing`**: Lower bounds, first-fit-decreasing, cluster site mapping
//! - **`exact`**: `ExactSolver` trait and the branch-and-bound backend
//! - **`orchestrator`**: Per-group state machine and the full pipeline
//! - **`labor`**: Anesthesia savings and regional staffing balance
//! - **`summary`**: Run-level metrics and ISO-week rollups
//!
//! # Architecture
//!
//! Data flows one way: validated intervals → groups → packings → labor
//! metrics → summary. Groups never read each other's state, so they are
//! solved in parallel. The library logs through `tracing` and never
//! installs a subscriber.
//!
//! # References
//!
//! - Martello & Toth (1990), "Knapsack Problems: Algorithms and Computer
//!   Implementations"
//! - Cardoen, Demeulemeester & Beliën (2010), "Operating room planning and
//!   scheduling: A literature review", EJOR 201(3)
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"

pub mod config;
pub mod conflict;
pub mod error;
pub mod exact;
pub mod grouping;
pub mod labor;
pub mod models;
pub mod orchestrator;
pub mod packing;
pub mod summary;
pub mod validation;

pub use config::{ConsolidationConfig, SiteLayout};
pub use error::{Error, Result};
pub use orchestrator::{run, ConsolidationReport, Consolidator};
