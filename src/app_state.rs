use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::core::inventory::ResourceInventory;
use crate::core::report::ReportView;
use crate::core::store::RequestStore;
use crate::core::RequestLifecycle;
use crate::db::locations::LocationStore;
use crate::db::users::{NewUser, UserStore};
use crate::db::models::user::ROLE_ADMIN;

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub locations: Arc<LocationStore>,
    pub inventory: Arc<ResourceInventory>,
    pub requests: Arc<RequestStore>,
    pub lifecycle: Arc<RequestLifecycle>,
    pub reports: Arc<ReportView>,
}

impl AppState {
    pub fn new(lock_timeout: Duration) -> Self {
        let users = Arc::new(UserStore::new());
        let locations = Arc::new(LocationStore::new());
        let inventory = Arc::new(ResourceInventory::new(lock_timeout));
        let requests = Arc::new(RequestStore::new(lock_timeout));
        let lifecycle = Arc::new(RequestLifecycle::new(
            Arc::clone(&inventory),
            Arc::clone(&requests),
            Arc::clone(&locations),
        ));
        let reports = Arc::new(ReportView::new(
            Arc::clone(&requests),
            Arc::clone(&inventory),
        ));
        Self {
            users,
            locations,
            inventory,
            requests,
            lifecycle,
            reports,
        }
    }

    /// Create the bootstrap administrator when configured and not present.
    pub fn seed_admin(&self, config: &Config) {
        let (Some(username), Some(password)) =
            (config.admin_username.as_ref(), config.admin_password.as_ref())
        else {
            return;
        };
        if self.users.find_by_username(username).is_some() {
            return;
        }
        match self.users.create(NewUser {
            username: username.clone(),
            password: password.clone(),
            full_name: None,
            email: None,
            role: ROLE_ADMIN.to_string(),
        }) {
            Ok(admin) => tracing::info!(username = %admin.username, "seeded administrator account"),
            Err(err) => tracing::error!(%err, "failed to seed administrator account"),
        }
    }
}
