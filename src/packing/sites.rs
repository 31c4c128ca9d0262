//! Slot → site mapping for cluster groups.
//!
//! # Algorithm
//!
//! 1. Count the physical rooms each member site actually used.
//! 2. Order member sites by that count, largest first (ties keep the
//!    configured order, so the hub wins ties).
//! 3. Hand out slot indices site by site, each site receiving as many
//!    slots as it has rooms.
//! 4. Any remaining slots spill into the hub.
//!
//! The mapping of slot `j` depends only on `j`, so a shorter packing
//! always maps to a prefix of a longer packing's sites.

use std::collections::{BTreeSet, HashMap};

use crate::models::RoomKey;

/// Site of each of `num_slots` slots.
///
/// Returns an empty vector for groups with fewer than two sites; their
/// slots keep each member's own site.
pub fn site_of_slot(num_slots: usize, actual_rooms: &BTreeSet<RoomKey>, sites: &[String]) -> Vec<String> {
    if sites.len() < 2 {
        return Vec::new();
    }

    let mut rooms_by_site: HashMap<&str, usize> = HashMap::new();
    for room in actual_rooms {
        *rooms_by_site.entry(room.site.as_str()).or_default() += 1;
    }

    let mut ordered: Vec<&String> = sites.iter().collect();
    ordered.sort_by(|a, b| {
        let ra = rooms_by_site.get(a.as_str()).copied().unwrap_or(0);
        let rb = rooms_by_site.get(b.as_str()).copied().unwrap_or(0);
        rb.cmp(&ra)
    });

    let mut mapping = Vec::with_capacity(num_slots);
    for site in &ordered {
        let count = rooms_by_site.get(site.as_str()).copied().unwrap_or(0);
        for _ in 0..count {
            if mapping.len() == num_slots {
                return mapping;
            }
            mapping.push((*site).clone());
        }
    }

    let hub = &sites[0];
    while mapping.len() < num_slots {
        mapping.push(hub.clone());
    }
    mapping
}
