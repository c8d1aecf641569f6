use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::core::error::CoreError;
use crate::db::models::request::{NetworkRequest, RequestStatus};

/// Listing filter. Reads copy matching rows; they never hand out live
/// references into the store.
#[derive(Debug, Default, Clone)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub user_id: Option<i32>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl RequestFilter {
    fn matches(&self, request: &NetworkRequest) -> bool {
        if let Some(status) = self.status {
            if request.status != status {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if request.user_id != user_id {
                return false;
            }
        }
        if let Some(from) = self.from {
            if request.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if request.created_at > to {
                return false;
            }
        }
        true
    }
}

struct RequestRow {
    record: Mutex<NetworkRequest>,
}

/// Requests and their lines, keyed by request id.
///
/// Each row carries its own lock so a status transition serializes with
/// other transitions and reads of that request only. Row locks are never
/// held while waiting for the row map, and the lifecycle acquires resource
/// locks only from inside a row transition (never the other way around),
/// which keeps the lock graph acyclic.
pub struct RequestStore {
    rows: RwLock<BTreeMap<i32, Arc<RequestRow>>>,
    next_id: AtomicI32,
    lock_timeout: Duration,
}

impl RequestStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI32::new(1),
            lock_timeout,
        }
    }

    /// Persist a new request, assigning its id. The only failure is a map
    /// lock timeout; the caller undoes its reservation in that case.
    pub fn insert(&self, mut record: NetworkRequest) -> Result<NetworkRequest, CoreError> {
        let mut rows = self
            .rows
            .try_write_for(self.lock_timeout)
            .ok_or(CoreError::LockTimeout)?;
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        record.request_id = request_id;
        rows.insert(
            request_id,
            Arc::new(RequestRow {
                record: Mutex::new(record.clone()),
            }),
        );
        Ok(record)
    }

    pub fn get(&self, request_id: i32) -> Result<NetworkRequest, CoreError> {
        let row = self.row(request_id)?;
        let record = row
            .record
            .try_lock_for(self.lock_timeout)
            .ok_or(CoreError::LockTimeout)?;
        Ok(record.clone())
    }

    /// Run `f` against the row under its lock and return the updated copy.
    /// `f` must not mutate the record on its own error paths.
    pub fn transition<F>(&self, request_id: i32, f: F) -> Result<NetworkRequest, CoreError>
    where
        F: FnOnce(&mut NetworkRequest) -> Result<(), CoreError>,
    {
        let row = self.row(request_id)?;
        let mut record = row
            .record
            .try_lock_for(self.lock_timeout)
            .ok_or(CoreError::LockTimeout)?;
        f(&mut record)?;
        Ok(record.clone())
    }

    /// Copy-on-read listing, newest first.
    pub fn list(&self, filter: &RequestFilter) -> Result<Vec<NetworkRequest>, CoreError> {
        let rows: Vec<Arc<RequestRow>> = {
            let map = self
                .rows
                .try_read_for(self.lock_timeout)
                .ok_or(CoreError::LockTimeout)?;
            map.values().cloned().collect()
        };

        let mut out = Vec::new();
        for row in rows {
            let record = row
                .record
                .try_lock_for(self.lock_timeout)
                .ok_or(CoreError::LockTimeout)?;
            if filter.matches(&record) {
                out.push(record.clone());
            }
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.request_id.cmp(&a.request_id)));
        Ok(out)
    }

    /// True while any pending request holds a line on the resource.
    pub fn references_resource(&self, resource_id: i32) -> Result<bool, CoreError> {
        let pending = self.list(&RequestFilter {
            status: Some(RequestStatus::Pending),
            ..RequestFilter::default()
        })?;
        Ok(pending
            .iter()
            .any(|request| request.lines.iter().any(|line| line.resource_id == resource_id)))
    }

    fn row(&self, request_id: i32) -> Result<Arc<RequestRow>, CoreError> {
        let rows = self
            .rows
            .try_read_for(self.lock_timeout)
            .ok_or(CoreError::LockTimeout)?;
        rows.get(&request_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("request {request_id}")))
    }
}
