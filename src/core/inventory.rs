use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{error, info};

use crate::core::error::CoreError;
use crate::db::models::resource::{NewResource, ResourceType, UpdateResource};

/// Counters for one resource, guarded by that resource's own lock.
#[derive(Debug)]
struct SlotState {
    resource_name: String,
    quantity_total: u32,
    quantity_available: u32,
}

#[derive(Debug)]
struct Slot {
    resource_id: i32,
    state: Mutex<SlotState>,
}

impl Slot {
    fn to_record(&self) -> ResourceType {
        let state = self.state.lock();
        ResourceType {
            resource_id: self.resource_id,
            resource_name: state.resource_name.clone(),
            quantity_total: state.quantity_total,
            quantity_available: state.quantity_available,
        }
    }
}

/// Authoritative available/total counters per resource.
///
/// All mutation of the counters goes through [`try_reserve`] and
/// [`release`]; no caller can read-then-write a counter from outside.
/// Multi-resource operations lock the involved resources in ascending
/// resource-id order (the `BTreeMap` key order of the line map), so two
/// overlapping reservations can never deadlock. Every lock acquisition is
/// bounded; a miss surfaces as [`CoreError::LockTimeout`] for the caller to
/// retry.
///
/// [`try_reserve`]: ResourceInventory::try_reserve
/// [`release`]: ResourceInventory::release
pub struct ResourceInventory {
    slots: RwLock<BTreeMap<i32, Arc<Slot>>>,
    next_id: AtomicI32,
    lock_timeout: Duration,
}

impl ResourceInventory {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
            next_id: AtomicI32::new(1),
            lock_timeout,
        }
    }

    /// Atomically reserve every line or nothing at all.
    ///
    /// Two-phase under the ordered locks: first every availability check,
    /// then every decrement. A shortfall on any line leaves all counters
    /// untouched and names the offending resource.
    pub fn try_reserve(&self, lines: &BTreeMap<i32, u32>) -> Result<(), CoreError> {
        // The registry read lock is held for the whole operation so a
        // concurrent resource deletion cannot strand the decrements.
        let registry = self
            .slots
            .try_read_for(self.lock_timeout)
            .ok_or(CoreError::LockTimeout)?;
        let slots = Self::collect(&registry, lines)?;

        let mut guards = Vec::with_capacity(slots.len());
        for slot in &slots {
            let guard = slot
                .state
                .try_lock_for(self.lock_timeout)
                .ok_or(CoreError::LockTimeout)?;
            guards.push(guard);
        }

        for (guard, (&resource_id, &quantity)) in guards.iter().zip(lines.iter()) {
            if guard.quantity_available < quantity {
                return Err(CoreError::InsufficientResource { resource_id });
            }
        }
        for (guard, &quantity) in guards.iter_mut().zip(lines.values()) {
            guard.quantity_available -= quantity;
        }
        Ok(())
    }

    /// Return previously reserved quantities to the pool.
    ///
    /// A release that would push `quantity_available` past `quantity_total`
    /// means some request double-released; that is a consistency error and
    /// nothing is applied.
    pub fn release(&self, lines: &BTreeMap<i32, u32>) -> Result<(), CoreError> {
        let registry = self
            .slots
            .try_read_for(self.lock_timeout)
            .ok_or(CoreError::LockTimeout)?;
        let slots = Self::collect(&registry, lines)?;

        let mut guards = Vec::with_capacity(slots.len());
        for slot in &slots {
            let guard = slot
                .state
                .try_lock_for(self.lock_timeout)
                .ok_or(CoreError::LockTimeout)?;
            guards.push(guard);
        }

        for (guard, (&resource_id, &quantity)) in guards.iter().zip(lines.iter()) {
            let released = guard.quantity_available as u64 + quantity as u64;
            if released > guard.quantity_total as u64 {
                error!(
                    resource_id,
                    quantity_available = guard.quantity_available,
                    quantity_total = guard.quantity_total,
                    release = quantity,
                    "release would exceed quantity_total, refusing"
                );
                return Err(CoreError::Consistency(format!(
                    "release of {quantity} units on resource {resource_id} exceeds quantity_total"
                )));
            }
        }
        for (guard, &quantity) in guards.iter_mut().zip(lines.values()) {
            guard.quantity_available += quantity;
        }
        Ok(())
    }

    /// Point-in-time copy of every resource's counters. Holds each
    /// per-resource lock only long enough to copy it.
    pub fn snapshot(&self) -> Vec<ResourceType> {
        let registry = self.slots.read();
        registry.values().map(|slot| slot.to_record()).collect()
    }

    pub fn create(&self, new: NewResource) -> Result<ResourceType, CoreError> {
        let name = new.resource_name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("resource_name must not be empty"));
        }
        let resource_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot {
            resource_id,
            state: Mutex::new(SlotState {
                resource_name: name.to_string(),
                quantity_total: new.quantity_total,
                quantity_available: new.quantity_total,
            }),
        });
        let record = slot.to_record();
        self.slots.write().insert(resource_id, slot);
        info!(resource_id, resource_name = %record.resource_name, "resource created");
        Ok(record)
    }

    pub fn get(&self, resource_id: i32) -> Result<ResourceType, CoreError> {
        let registry = self.slots.read();
        registry
            .get(&resource_id)
            .map(|slot| slot.to_record())
            .ok_or_else(|| CoreError::not_found(format!("resource {resource_id}")))
    }

    pub fn list(&self) -> Vec<ResourceType> {
        self.snapshot()
    }

    /// Admin edit. Shrinking `quantity_total` below the reserved amount
    /// would force `quantity_available` negative and is rejected.
    pub fn update(&self, resource_id: i32, update: UpdateResource) -> Result<ResourceType, CoreError> {
        if update.is_empty() {
            return Err(CoreError::validation("no fields to update"));
        }
        let registry = self.slots.read();
        let slot = registry
            .get(&resource_id)
            .ok_or_else(|| CoreError::not_found(format!("resource {resource_id}")))?;

        let mut state = slot
            .state
            .try_lock_for(self.lock_timeout)
            .ok_or(CoreError::LockTimeout)?;
        if let Some(name) = update.resource_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CoreError::validation("resource_name must not be empty"));
            }
            state.resource_name = name.to_string();
        }
        if let Some(total) = update.quantity_total {
            let reserved = state.quantity_total - state.quantity_available;
            if total < reserved {
                return Err(CoreError::validation(format!(
                    "quantity_total {total} is below the {reserved} units currently reserved"
                )));
            }
            state.quantity_total = total;
            state.quantity_available = total - reserved;
        }
        Ok(ResourceType {
            resource_id,
            resource_name: state.resource_name.clone(),
            quantity_total: state.quantity_total,
            quantity_available: state.quantity_available,
        })
    }

    /// Remove a resource with no outstanding reservations.
    ///
    /// Callers are expected to have already rejected deletion when a
    /// pending request references the resource; the counter check here
    /// additionally closes the window against a reservation that is
    /// in flight but not yet persisted as a request.
    pub fn remove(&self, resource_id: i32) -> Result<(), CoreError> {
        let mut registry = self.slots.write();
        let slot = registry
            .get(&resource_id)
            .ok_or_else(|| CoreError::not_found(format!("resource {resource_id}")))?;
        {
            let state = slot.state.lock();
            if state.quantity_available != state.quantity_total {
                return Err(CoreError::conflict(format!(
                    "resource {resource_id} has outstanding reservations"
                )));
            }
        }
        registry.remove(&resource_id);
        info!(resource_id, "resource deleted");
        Ok(())
    }

    fn collect<'a>(
        registry: &'a BTreeMap<i32, Arc<Slot>>,
        lines: &BTreeMap<i32, u32>,
    ) -> Result<Vec<&'a Arc<Slot>>, CoreError> {
        lines
            .keys()
            .map(|id| {
                registry
                    .get(id)
                    .ok_or_else(|| CoreError::not_found(format!("resource {id}")))
            })
            .collect()
    }
}
