//! User accounts and password verification

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::SignedInUser;
use crate::store::StoreError;

/// Built-in organization role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Viewer,
    Editor,
    Admin,
}

impl Role {
    /// Roles whose permissions this role inherits
    pub fn children(self) -> &'static [Role] {
        match self {
            Role::Admin => &[Role::Editor, Role::Viewer],
            Role::Editor => &[Role::Viewer],
            Role::Viewer => &[],
        }
    }

    /// This role followed by its children
    pub fn with_children(self) -> impl Iterator<Item = Role> {
        std::iter::once(self).chain(self.children().iter().copied())
    }

    pub fn can_edit(self) -> bool {
        self >= Role::Editor
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub org_id: i64,
    pub role: Role,
    salt: String,
    password_digest: String,
}

impl User {
    pub fn signed_in(&self) -> SignedInUser {
        SignedInUser {
            user_id: self.id,
            org_id: self.org_id,
            login: self.login.clone(),
            role: self.role,
        }
    }

    fn verify_password(&self, password: &str) -> bool {
        digest_password(&self.salt, password) == self.password_digest
    }
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn random_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

/// User accounts indexed by login
pub struct UserStore {
    users: DashMap<String, User>,
    next_id: AtomicI64,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn create_user(
        &self,
        login: &str,
        password: &str,
        org_id: i64,
        role: Role,
    ) -> Result<User, StoreError> {
        match self.users.entry(login.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::AlreadyExists(format!("user '{}'", login)))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let salt = random_salt();
                let user = User {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst),
                    login: login.to_string(),
                    org_id,
                    role,
                    password_digest: digest_password(&salt, password),
                    salt,
                };
                entry.insert(user.clone());
                Ok(user)
            }
        }
    }

    /// Check credentials, returning the user on success
    pub fn authenticate(&self, login: &str, password: &str) -> Option<User> {
        self.users
            .get(login)
            .filter(|user| user.verify_password(password))
            .map(|user| user.clone())
    }

    pub fn get(&self, id: i64) -> Option<User> {
        self.users
            .iter()
            .find(|entry| entry.value().id == id)
            .map(|entry| entry.value().clone())
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}
