use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::RwLock;
use tracing::warn;

use crate::core::error::CoreError;
use crate::db::models::location::{Location, NewLocation, UpdateLocation};

/// Keyed location records. No invariants beyond the key; `area_name`
/// collisions are allowed but logged, since they confuse users.
pub struct LocationStore {
    locations: RwLock<BTreeMap<i32, Location>>,
    next_id: AtomicI32,
}

impl LocationStore {
    pub fn new() -> Self {
        Self {
            locations: RwLock::new(BTreeMap::new()),
            next_id: AtomicI32::new(1),
        }
    }

    pub fn create(&self, new: NewLocation) -> Result<Location, CoreError> {
        let area_name = new.area_name.trim().to_string();
        if area_name.is_empty() {
            return Err(CoreError::validation("area_name must not be empty"));
        }
        let mut locations = self.locations.write();
        if locations
            .values()
            .any(|l| l.area_name.eq_ignore_ascii_case(&area_name))
        {
            warn!(%area_name, "creating location with a duplicate area_name");
        }
        let location_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let location = Location {
            location_id,
            area_name,
            is_network_available: new.is_network_available,
        };
        locations.insert(location_id, location.clone());
        Ok(location)
    }

    pub fn get(&self, location_id: i32) -> Result<Location, CoreError> {
        self.locations
            .read()
            .get(&location_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("location {location_id}")))
    }

    /// `available_only` narrows to locations where network service can be
    /// requested; the create-request form lists only those.
    pub fn list(&self, available_only: bool) -> Vec<Location> {
        self.locations
            .read()
            .values()
            .filter(|l| !available_only || l.is_network_available)
            .cloned()
            .collect()
    }

    pub fn update(&self, location_id: i32, update: UpdateLocation) -> Result<Location, CoreError> {
        if update.is_empty() {
            return Err(CoreError::validation("no fields to update"));
        }
        let mut locations = self.locations.write();
        let location = locations
            .get_mut(&location_id)
            .ok_or_else(|| CoreError::not_found(format!("location {location_id}")))?;
        if let Some(area_name) = update.area_name {
            let area_name = area_name.trim();
            if area_name.is_empty() {
                return Err(CoreError::validation("area_name must not be empty"));
            }
            location.area_name = area_name.to_string();
        }
        if let Some(available) = update.is_network_available {
            location.is_network_available = available;
        }
        Ok(location.clone())
    }

    pub fn delete(&self, location_id: i32) -> Result<(), CoreError> {
        self.locations
            .write()
            .remove(&location_id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found(format!("location {location_id}")))
    }
}

impl Default for LocationStore {
    fn default() -> Self {
        Self::new()
    }
}
