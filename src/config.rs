//! Run configuration.
//!
//! All fields have defaults, so an empty TOML document is a valid
//! configuration:
//!
//! ```
//! use or_consolidate::config::ConsolidationConfig;
//!
//! let config = ConsolidationConfig::from_toml_str(r#"
//!     slot_capacity_minutes = 600
//!     clinical_padding_minutes = 20
//!
//!     [anesthesia_methods]
//!     fte_efficiency = false
//!
//!     [clusters]
//!     North = ["Main Campus", "Eastside"]
//! "#).unwrap();
//!
//! assert_eq!(config.slot_capacity_minutes, 600);
//! assert!(!config.anesthesia_methods.fte_efficiency);
//!
//! let layout = config.validate().unwrap();
//! assert_eq!(layout.cluster_of("Eastside"), Some("North"));
//! ```
//!
//! [`ConsolidationConfig::validate`] is the fail-fast check every run
//! performs before touching a single group. It also turns the cluster and
//! region maps into the lookup tables the grouping and staffing stages use.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_PRODUCTIVITY: f64 = 0.85;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Toggles for the three anesthesia savings methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnesthesiaMethods {
    /// Method 1: providers freed by eliminated rooms.
    pub room_elimination: bool,
    /// Method 2: FTEs freed by shorter room windows.
    pub fte_efficiency: bool,
    /// Method 3: providers absorbable by colleagues.
    pub absorption: bool,
}

impl Default for AnesthesiaMethods {
    fn default() -> Self {
        Self {
            room_elimination: true,
            fte_efficiency: true,
            absorption: true,
        }
    }
}

/// Consolidation run configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Capacity of one consolidated slot (minutes).
    pub slot_capacity_minutes: i64,
    /// Wall-clock budget for one exact solve (seconds).
    pub exact_time_budget_secs: u64,
    /// Parallel search workers per exact solve.
    pub search_workers: usize,
    /// Group-level worker pool size. `None` uses the global pool.
    pub worker_threads: Option<usize>,
    /// Pass single-room groups through unchanged.
    pub skip_single_room: bool,
    /// Total clinical padding (minutes), split evenly before and after.
    pub clinical_padding_minutes: i64,
    /// Minutes counted as one FTE by Method 2.
    pub fte_threshold_minutes: i64,
    /// Share of staffed hours that is productive.
    pub productivity_factor: f64,
    /// Method toggles.
    pub anesthesia_methods: AnesthesiaMethods,
    /// Cluster id to member sites. The first member is the hub.
    pub clusters: BTreeMap<String, Vec<String>>,
    /// Region name to member sites.
    pub regions: BTreeMap<String, Vec<String>>,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            slot_capacity_minutes: 480,
            exact_time_budget_secs: 10,
            search_workers: 4,
            worker_threads: None,
            skip_single_room: true,
            clinical_padding_minutes: 0,
            fte_threshold_minutes: 480,
            productivity_factor: DEFAULT_PRODUCTIVITY,
            anesthesia_methods: AnesthesiaMethods::default(),
            clusters: BTreeMap::new(),
            regions: BTreeMap::new(),
        }
    }
}

impl ConsolidationConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Sets the slot capacity.
    pub fn with_slot_capacity(mut self, minutes: i64) -> Self {
        self.slot_capacity_minutes = minutes;
        self
    }

    /// Sets the exact-solve budget.
    pub fn with_time_budget_secs(mut self, secs: u64) -> Self {
        self.exact_time_budget_secs = secs;
        self
    }

    /// Sets the number of exact-search workers.
    pub fn with_search_workers(mut self, workers: usize) -> Self {
        self.search_workers = workers;
        self
    }

    /// Sets the group-level worker pool size.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Sets the single-room skip rule.
    pub fn with_skip_single_room(mut self, skip: bool) -> Self {
        self.skip_single_room = skip;
        self
    }

    /// Sets the total clinical padding.
    pub fn with_clinical_padding(mut self, minutes: i64) -> Self {
        self.clinical_padding_minutes = minutes;
        self
    }

    /// Sets the Method 2 FTE threshold.
    pub fn with_fte_threshold(mut self, minutes: i64) -> Self {
        self.fte_threshold_minutes = minutes;
        self
    }

    /// Sets the productivity factor.
    pub fn with_productivity_factor(mut self, factor: f64) -> Self {
        self.productivity_factor = factor;
        self
    }

    /// Sets the anesthesia method toggles.
    pub fn with_anesthesia_methods(mut self, methods: AnesthesiaMethods) -> Self {
        self.anesthesia_methods = methods;
        self
    }

    /// Adds a cluster. The first site is the hub.
    pub fn with_cluster<S: Into<String>>(
        mut self,
        id: impl Into<String>,
        sites: impl IntoIterator<Item = S>,
    ) -> Self {
        self.clusters
            .insert(id.into(), sites.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a staffing region.
    pub fn with_region<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        sites: impl IntoIterator<Item = S>,
    ) -> Self {
        self.regions
            .insert(name.into(), sites.into_iter().map(Into::into).collect());
        self
    }

    /// Exact-solve budget as a duration.
    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.exact_time_budget_secs)
    }

    /// Productivity factor clamped to `[0.5, 1.0]`.
    pub fn effective_productivity(&self) -> f64 {
        if self.productivity_factor.is_nan() {
            return DEFAULT_PRODUCTIVITY;
        }
        self.productivity_factor.clamp(0.5, 1.0)
    }

    /// Padding applied on each side of a clinical window.
    pub fn clinical_padding_per_side(&self) -> i64 {
        self.clinical_padding_minutes / 2
    }

    /// Checks preconditions and builds the site lookup tables.
    pub fn validate(&self) -> Result<SiteLayout, ConfigError> {
        if self.slot_capacity_minutes <= 0 {
            return Err(ConfigError::Invalid(format!(
                "slot_capacity_minutes must be positive, got {}",
                self.slot_capacity_minutes
            )));
        }
        if self.fte_threshold_minutes <= 0 {
            return Err(ConfigError::Invalid(format!(
                "fte_threshold_minutes must be positive, got {}",
                self.fte_threshold_minutes
            )));
        }
        if self.search_workers == 0 {
            return Err(ConfigError::Invalid("search_workers must be at least 1".into()));
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::Invalid("worker_threads must be at least 1".into()));
        }
        if self.clinical_padding_minutes < 0 {
            return Err(ConfigError::Invalid(format!(
                "clinical_padding_minutes must not be negative, got {}",
                self.clinical_padding_minutes
            )));
        }

        let mut layout = SiteLayout::default();

        for (cluster, sites) in &self.clusters {
            if sites.is_empty() {
                return Err(ConfigError::Invalid(format!("cluster '{cluster}' has no sites")));
            }
            let mut members = Vec::with_capacity(sites.len());
            for site in sites {
                let site = site.trim();
                if site.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "cluster '{cluster}' lists an empty site name"
                    )));
                }
                if let Some(other) = layout.site_to_cluster.insert(site.to_string(), cluster.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "site '{site}' is listed in clusters '{other}' and '{cluster}'"
                    )));
                }
                members.push(site.to_string());
            }
            layout.cluster_members.insert(cluster.clone(), members);
        }

        for (region, sites) in &self.regions {
            for site in sites {
                let site = site.trim();
                if site.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "region '{region}' lists an empty site name"
                    )));
                }
                if let Some(other) = layout.site_to_region.insert(site.to_string(), region.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "site '{site}' is listed in regions '{other}' and '{region}'"
                    )));
                }
            }
        }
        layout.region_count = self.regions.len();

        Ok(layout)
    }
}

/// Validated site lookup tables, built once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteLayout {
    /// Site to owning cluster.
    pub site_to_cluster: HashMap<String, String>,
    /// Cluster to ordered member sites (hub first).
    pub cluster_members: HashMap<String, Vec<String>>,
    /// Site to staffing region.
    pub site_to_region: HashMap<String, String>,
    /// Number of configured regions.
    pub region_count: usize,
}

impl SiteLayout {
    /// Cluster a site belongs to, if any.
    pub fn cluster_of(&self, site: &str) -> Option<&str> {
        self.site_to_cluster.get(site).map(String::as_str)
    }

    /// Ordered member sites of a cluster.
    pub fn members(&self, cluster: &str) -> Option<&[String]> {
        self.cluster_members.get(cluster).map(Vec::as_slice)
    }

    /// Staffing region of a site. Unmapped sites form their own region.
    pub fn region_of(&self, site: &str) -> String {
        match self.site_to_region.get(site) {
            Some(region) => region.clone(),
            None => format!("Standalone: {site}"),
        }
    }
}
