use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use parking_lot::RwLock;
use tracing::info;

use crate::core::error::CoreError;
use crate::db::models::user::{UpdateUser, User, UserInfo, ROLE_ADMIN, ROLE_USER};

pub struct NewUser {
    pub username: String,
    pub password: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: String,
}

/// Keyed user records with unique usernames. Passwords are stored as
/// bcrypt hashes only.
pub struct UserStore {
    users: RwLock<BTreeMap<i32, User>>,
    next_id: AtomicI32,
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicI32::new(1),
        }
    }

    pub fn create(&self, new: NewUser) -> Result<UserInfo, CoreError> {
        let username = new.username.trim().to_string();
        if username.is_empty() {
            return Err(CoreError::validation("username must not be empty"));
        }
        if new.password.is_empty() {
            return Err(CoreError::validation("password must not be empty"));
        }
        if new.role != ROLE_ADMIN && new.role != ROLE_USER {
            return Err(CoreError::validation(format!("unknown role {:?}", new.role)));
        }
        let password_hash = hash(&new.password, DEFAULT_COST)
            .map_err(|e| CoreError::Consistency(format!("password hashing failed: {e}")))?;

        let mut users = self.users.write();
        if users.values().any(|u| u.username == username) {
            return Err(CoreError::conflict("username already taken"));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let user = User {
            id,
            username,
            password_hash,
            full_name: new.full_name,
            email: new.email,
            role: new.role,
            created_at: Utc::now(),
        };
        let info = user.info();
        users.insert(id, user);
        info!(user_id = id, username = %info.username, role = %info.role, "user created");
        Ok(info)
    }

    pub fn get(&self, id: i32) -> Result<User, CoreError> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("user {id}")))
    }

    pub fn find_by_username(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    pub fn list(&self) -> Vec<UserInfo> {
        self.users.read().values().map(User::info).collect()
    }

    pub fn update(&self, id: i32, update: UpdateUser) -> Result<UserInfo, CoreError> {
        if update.is_empty() {
            return Err(CoreError::validation("no fields to update"));
        }
        if let Some(role) = update.role.as_deref() {
            if role != ROLE_ADMIN && role != ROLE_USER {
                return Err(CoreError::validation(format!("unknown role {role:?}")));
            }
        }
        let password_hash = match update.password.as_deref() {
            Some("") => return Err(CoreError::validation("password must not be empty")),
            Some(password) => Some(
                hash(password, DEFAULT_COST)
                    .map_err(|e| CoreError::Consistency(format!("password hashing failed: {e}")))?,
            ),
            None => None,
        };

        let mut users = self.users.write();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("user {id}")))?;
        if let Some(full_name) = update.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(email) = update.email {
            user.email = Some(email);
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        if let Some(password_hash) = password_hash {
            user.password_hash = password_hash;
        }
        Ok(user.info())
    }

    pub fn delete(&self, id: i32) -> Result<(), CoreError> {
        self.users
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found(format!("user {id}")))
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}
