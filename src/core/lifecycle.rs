use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::core::error::CoreError;
use crate::core::inventory::ResourceInventory;
use crate::core::store::{RequestFilter, RequestStore};
use crate::db::locations::LocationStore;
use crate::db::models::request::{
    NetworkRequest, NewRequest, RequestLine, RequestStatus,
};
use crate::db::models::user::ROLE_ADMIN;

/// The authenticated principal an operation runs as. Built once per request
/// by the rbac middleware; every role and ownership check in the engine
/// goes through this value, regardless of what any client claims.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i32,
    pub role: String,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// Orchestrates the request state machine over the inventory and the
/// request store.
///
/// Create reserves first and persists second; the reservation is undone if
/// persistence fails, so no observer ever sees reserved quantities without
/// a pending request to explain them. Reject and Cancel release under the
/// row lock before flipping the status, so a reporter never sees a
/// terminal request still holding resources.
pub struct RequestLifecycle {
    inventory: Arc<ResourceInventory>,
    store: Arc<RequestStore>,
    locations: Arc<LocationStore>,
}

impl RequestLifecycle {
    pub fn new(
        inventory: Arc<ResourceInventory>,
        store: Arc<RequestStore>,
        locations: Arc<LocationStore>,
    ) -> Self {
        Self {
            inventory,
            store,
            locations,
        }
    }

    pub fn create(&self, actor: &Actor, payload: &NewRequest) -> Result<NetworkRequest, CoreError> {
        if payload.resources.is_empty() {
            return Err(CoreError::validation("at least one resource line is required"));
        }
        let mut lines = BTreeMap::new();
        for line in &payload.resources {
            if line.quantity == 0 {
                return Err(CoreError::validation(format!(
                    "quantity for resource {} must be positive",
                    line.resource_id
                )));
            }
            if lines.insert(line.resource_id, line.quantity).is_some() {
                return Err(CoreError::validation(format!(
                    "resource {} appears more than once",
                    line.resource_id
                )));
            }
        }
        let location = self
            .locations
            .get(payload.location_id)
            .map_err(|_| CoreError::validation(format!("unknown location {}", payload.location_id)))?;
        if !location.is_network_available {
            return Err(CoreError::validation(format!(
                "location {:?} has no network service",
                location.area_name
            )));
        }

        self.inventory.try_reserve(&lines)?;

        let record = NetworkRequest {
            request_id: 0,
            user_id: actor.user_id,
            location_id: location.location_id,
            area_name: location.area_name,
            connection_type: payload.connection_type,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            decided_by: None,
            decided_at: None,
            lines: payload.resources.clone(),
        };
        match self.store.insert(record) {
            Ok(saved) => {
                info!(
                    request_id = saved.request_id,
                    user_id = saved.user_id,
                    location_id = saved.location_id,
                    "request created"
                );
                Ok(saved)
            }
            Err(err) => {
                // Undo the reservation before surfacing the failure.
                if let Err(rollback) = self.inventory.release(&lines) {
                    error!(%rollback, "failed to roll back reservation after persistence failure");
                }
                Err(err)
            }
        }
    }

    pub fn approve(&self, actor: &Actor, request_id: i32) -> Result<NetworkRequest, CoreError> {
        if !actor.is_admin() {
            return Err(CoreError::forbidden("only administrators can approve requests"));
        }
        let approved = self.store.transition(request_id, |request| {
            Self::ensure_pending(request)?;
            request.status = RequestStatus::Approved;
            request.decided_by = Some(actor.user_id);
            request.decided_at = Some(Utc::now());
            Ok(())
        })?;
        info!(request_id, admin_id = actor.user_id, "request approved");
        Ok(approved)
    }

    pub fn reject(&self, actor: &Actor, request_id: i32) -> Result<NetworkRequest, CoreError> {
        if !actor.is_admin() {
            return Err(CoreError::forbidden("only administrators can reject requests"));
        }
        let rejected = self.store.transition(request_id, |request| {
            Self::ensure_pending(request)?;
            self.inventory.release(&line_map(&request.lines))?;
            request.status = RequestStatus::Rejected;
            request.decided_by = Some(actor.user_id);
            request.decided_at = Some(Utc::now());
            Ok(())
        })?;
        info!(request_id, admin_id = actor.user_id, "request rejected");
        Ok(rejected)
    }

    pub fn cancel(&self, actor: &Actor, request_id: i32) -> Result<NetworkRequest, CoreError> {
        let cancelled = self.store.transition(request_id, |request| {
            if !actor.is_admin() && request.user_id != actor.user_id {
                return Err(CoreError::forbidden("you can only cancel your own requests"));
            }
            if request.status != RequestStatus::Pending {
                return Err(CoreError::conflict(format!(
                    "cannot cancel a request in status {}",
                    request.status
                )));
            }
            self.inventory.release(&line_map(&request.lines))?;
            request.status = RequestStatus::Cancelled;
            request.decided_by = Some(actor.user_id);
            request.decided_at = Some(Utc::now());
            Ok(())
        })?;
        info!(request_id, user_id = actor.user_id, "request cancelled");
        Ok(cancelled)
    }

    pub fn get(&self, actor: &Actor, request_id: i32) -> Result<NetworkRequest, CoreError> {
        let request = self.store.get(request_id)?;
        if !actor.is_admin() && request.user_id != actor.user_id {
            return Err(CoreError::forbidden("you can only view your own requests"));
        }
        Ok(request)
    }

    /// Non-admin callers are forcibly scoped to their own requests; their
    /// `user_id` filter is overwritten, not validated.
    pub fn list(
        &self,
        actor: &Actor,
        mut filter: RequestFilter,
    ) -> Result<Vec<NetworkRequest>, CoreError> {
        if !actor.is_admin() {
            filter.user_id = Some(actor.user_id);
        }
        self.store.list(&filter)
    }

    /// Admin resource deletion, guarded against pending references. The
    /// inventory additionally refuses while any units are reserved.
    pub fn delete_resource(&self, resource_id: i32) -> Result<(), CoreError> {
        if self.store.references_resource(resource_id)? {
            return Err(CoreError::conflict(format!(
                "resource {resource_id} is referenced by a pending request"
            )));
        }
        self.inventory.remove(resource_id)
    }

    fn ensure_pending(request: &NetworkRequest) -> Result<(), CoreError> {
        if request.status.is_terminal() {
            return Err(CoreError::conflict(format!(
                "request {} is already {}",
                request.request_id, request.status
            )));
        }
        Ok(())
    }
}

fn line_map(lines: &[RequestLine]) -> BTreeMap<i32, u32> {
    lines
        .iter()
        .map(|line| (line.resource_id, line.quantity))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::models::location::NewLocation;
    use crate::db::models::request::ConnectionType;
    use crate::db::models::resource::NewResource;

    struct Fixture {
        lifecycle: RequestLifecycle,
        inventory: Arc<ResourceInventory>,
        location_id: i32,
        offline_location_id: i32,
        router_id: i32,
        switch_id: i32,
    }

    fn admin() -> Actor {
        Actor {
            user_id: 1,
            role: "admin".to_string(),
        }
    }

    fn user(user_id: i32) -> Actor {
        Actor {
            user_id,
            role: "user".to_string(),
        }
    }

    fn fixture() -> Fixture {
        let timeout = Duration::from_millis(250);
        let inventory = Arc::new(ResourceInventory::new(timeout));
        let store = Arc::new(RequestStore::new(timeout));
        let locations = Arc::new(LocationStore::new());

        let location_id = locations
            .create(NewLocation {
                area_name: "North Campus".to_string(),
                is_network_available: true,
            })
            .unwrap()
            .location_id;
        let offline_location_id = locations
            .create(NewLocation {
                area_name: "Old Depot".to_string(),
                is_network_available: false,
            })
            .unwrap()
            .location_id;
        let router_id = inventory
            .create(NewResource {
                resource_name: "Core Router".to_string(),
                quantity_total: 10,
            })
            .unwrap()
            .resource_id;
        let switch_id = inventory
            .create(NewResource {
                resource_name: "Edge Switch".to_string(),
                quantity_total: 10,
            })
            .unwrap()
            .resource_id;

        Fixture {
            lifecycle: RequestLifecycle::new(Arc::clone(&inventory), store, locations),
            inventory,
            location_id,
            offline_location_id,
            router_id,
            switch_id,
        }
    }

    fn payload(fx: &Fixture, lines: &[(i32, u32)]) -> NewRequest {
        NewRequest {
            location_id: fx.location_id,
            connection_type: ConnectionType::Fiber,
            resources: lines
                .iter()
                .map(|&(resource_id, quantity)| RequestLine {
                    resource_id,
                    quantity,
                })
                .collect(),
        }
    }

    fn available(fx: &Fixture, resource_id: i32) -> u32 {
        fx.inventory.get(resource_id).unwrap().quantity_available
    }

    #[test]
    fn create_reserves_and_persists_pending() {
        let fx = fixture();
        let request = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 3)]))
            .unwrap();

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.user_id, 7);
        assert_eq!(request.area_name, "North Campus");
        assert_eq!(available(&fx, fx.router_id), 7);
    }

    #[test]
    fn validation_failures_reserve_nothing() {
        let fx = fixture();

        let empty = fx.lifecycle.create(&user(7), &payload(&fx, &[]));
        assert!(matches!(empty, Err(CoreError::Validation(_))));

        let zero = fx.lifecycle.create(&user(7), &payload(&fx, &[(fx.router_id, 0)]));
        assert!(matches!(zero, Err(CoreError::Validation(_))));

        let duplicate = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 1), (fx.router_id, 2)]));
        assert!(matches!(duplicate, Err(CoreError::Validation(_))));

        let mut unknown_location = payload(&fx, &[(fx.router_id, 1)]);
        unknown_location.location_id = 9999;
        let unknown = fx.lifecycle.create(&user(7), &unknown_location);
        assert!(matches!(unknown, Err(CoreError::Validation(_))));

        let mut offline = payload(&fx, &[(fx.router_id, 1)]);
        offline.location_id = fx.offline_location_id;
        let offline = fx.lifecycle.create(&user(7), &offline);
        assert!(matches!(offline, Err(CoreError::Validation(_))));

        assert_eq!(available(&fx, fx.router_id), 10);
        assert!(fx.lifecycle.list(&admin(), RequestFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn insufficient_line_fails_whole_request_without_partial_reservation() {
        let fx = fixture();
        let err = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 5), (fx.switch_id, 100)]))
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::InsufficientResource { resource_id } if resource_id == fx.switch_id
        ));
        assert_eq!(available(&fx, fx.router_id), 10);
        assert_eq!(available(&fx, fx.switch_id), 10);
        assert!(fx.lifecycle.list(&admin(), RequestFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn approve_keeps_reservation_and_ends_the_lifecycle() {
        let fx = fixture();
        let request = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 3)]))
            .unwrap();
        assert_eq!(available(&fx, fx.router_id), 7);

        let approved = fx.lifecycle.approve(&admin(), request.request_id).unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.decided_by, Some(1));
        assert_eq!(available(&fx, fx.router_id), 7);

        // A decided request can no longer be cancelled.
        let err = fx.lifecycle.cancel(&user(7), request.request_id).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        assert_eq!(available(&fx, fx.router_id), 7);
    }

    #[test]
    fn reject_releases_the_reservation() {
        let fx = fixture();
        let request = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 3)]))
            .unwrap();
        assert_eq!(available(&fx, fx.router_id), 7);

        let rejected = fx.lifecycle.reject(&admin(), request.request_id).unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(available(&fx, fx.router_id), 10);
    }

    #[test]
    fn cancel_releases_and_is_owner_or_admin_only() {
        let fx = fixture();
        let request = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 4)]))
            .unwrap();

        let err = fx.lifecycle.cancel(&user(8), request.request_id).unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert_eq!(available(&fx, fx.router_id), 6);

        let cancelled = fx.lifecycle.cancel(&user(7), request.request_id).unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
        assert_eq!(available(&fx, fx.router_id), 10);
    }

    #[test]
    fn approve_is_idempotent_in_effect() {
        let fx = fixture();
        let request = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 3)]))
            .unwrap();

        fx.lifecycle.approve(&admin(), request.request_id).unwrap();
        let err = fx.lifecycle.approve(&admin(), request.request_id).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
        // One transition, one inventory effect.
        assert_eq!(available(&fx, fx.router_id), 7);
    }

    #[test]
    fn non_admin_cannot_decide() {
        let fx = fixture();
        let request = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 3)]))
            .unwrap();

        assert!(matches!(
            fx.lifecycle.approve(&user(7), request.request_id),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            fx.lifecycle.reject(&user(7), request.request_id),
            Err(CoreError::Forbidden(_))
        ));
        assert_eq!(available(&fx, fx.router_id), 7);
    }

    #[test]
    fn terminal_states_accept_no_transition() {
        let fx = fixture();
        for terminal in [
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ] {
            let request = fx
                .lifecycle
                .create(&user(7), &payload(&fx, &[(fx.router_id, 1)]))
                .unwrap();
            match terminal {
                RequestStatus::Approved => fx.lifecycle.approve(&admin(), request.request_id),
                RequestStatus::Rejected => fx.lifecycle.reject(&admin(), request.request_id),
                _ => fx.lifecycle.cancel(&admin(), request.request_id),
            }
            .unwrap();

            for op in ["approve", "reject", "cancel"] {
                let result = match op {
                    "approve" => fx.lifecycle.approve(&admin(), request.request_id),
                    "reject" => fx.lifecycle.reject(&admin(), request.request_id),
                    _ => fx.lifecycle.cancel(&admin(), request.request_id),
                };
                assert!(matches!(result, Err(CoreError::Conflict(_))), "{terminal} {op}");
            }
        }
    }

    #[test]
    fn list_scopes_non_admins_to_their_own_requests() {
        let fx = fixture();
        fx.lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 1)]))
            .unwrap();
        fx.lifecycle
            .create(&user(8), &payload(&fx, &[(fx.router_id, 1)]))
            .unwrap();

        let all = fx.lifecycle.list(&admin(), RequestFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        // A non-admin asking for someone else's requests still gets their own.
        let scoped = fx
            .lifecycle
            .list(
                &user(7),
                RequestFilter {
                    user_id: Some(8),
                    ..RequestFilter::default()
                },
            )
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].user_id, 7);
    }

    #[test]
    fn get_is_owner_or_admin_only() {
        let fx = fixture();
        let request = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 1)]))
            .unwrap();

        assert!(fx.lifecycle.get(&user(7), request.request_id).is_ok());
        assert!(fx.lifecycle.get(&admin(), request.request_id).is_ok());
        assert!(matches!(
            fx.lifecycle.get(&user(8), request.request_id),
            Err(CoreError::Forbidden(_))
        ));
    }

    #[test]
    fn resource_deletion_blocked_by_pending_reference() {
        let fx = fixture();
        let request = fx
            .lifecycle
            .create(&user(7), &payload(&fx, &[(fx.router_id, 2)]))
            .unwrap();

        let err = fx.lifecycle.delete_resource(fx.router_id).unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));

        fx.lifecycle.cancel(&user(7), request.request_id).unwrap();
        fx.lifecycle.delete_resource(fx.router_id).unwrap();
        assert!(matches!(
            fx.inventory.get(fx.router_id),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn concurrent_creates_admit_exactly_one_when_short() {
        let fx = fixture();
        let lifecycle = Arc::new(fx.lifecycle);
        let router_id = fx.router_id;
        let location_id = fx.location_id;

        let mut handles = Vec::new();
        for user_id in [21, 22] {
            let lifecycle = Arc::clone(&lifecycle);
            handles.push(std::thread::spawn(move || {
                let payload = NewRequest {
                    location_id,
                    connection_type: ConnectionType::Wireless,
                    resources: vec![RequestLine {
                        resource_id: router_id,
                        quantity: 6,
                    }],
                };
                lifecycle.create(&user(user_id), &payload).is_ok()
            }));
        }
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(fx.inventory.get(router_id).unwrap().quantity_available, 4);
    }
}
