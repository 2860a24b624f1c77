//! Folder read grants for users and built-in roles

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use dashmap::DashMap;

use crate::auth::{Role, SignedInUser};

/// Folders a grant applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FolderScope {
    /// Every folder in the org
    All,
    Uid(String),
}

impl FolderScope {
    pub fn uid(uid: impl Into<String>) -> Self {
        FolderScope::Uid(uid.into())
    }

    pub fn covers(&self, folder_uid: &str) -> bool {
        match self {
            FolderScope::All => true,
            FolderScope::Uid(uid) => uid == folder_uid,
        }
    }
}

impl fmt::Display for FolderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderScope::All => write!(f, "folders:*"),
            FolderScope::Uid(uid) => write!(f, "folders:uid:{}", uid),
        }
    }
}

/// Persistent folder permission grants
#[derive(Default)]
pub struct PermissionStore {
    /// (org, user) grants
    user_grants: DashMap<(i64, i64), HashSet<FolderScope>>,
    /// (org, role) grants
    role_grants: DashMap<(i64, Role), HashSet<FolderScope>>,
}

impl PermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_user(&self, org_id: i64, user_id: i64, scope: FolderScope) {
        self.user_grants
            .entry((org_id, user_id))
            .or_default()
            .insert(scope);
    }

    pub fn grant_role(&self, org_id: i64, role: Role, scope: FolderScope) {
        self.role_grants
            .entry((org_id, role))
            .or_default()
            .insert(scope);
    }

    /// Default grants for a freshly created folder: its creator plus Editor and Viewer
    pub fn grant_folder_defaults(&self, creator: &SignedInUser, folder_uid: &str) {
        self.grant_user(creator.org_id, creator.user_id, FolderScope::uid(folder_uid));
        for role in [Role::Editor, Role::Viewer] {
            self.grant_role(creator.org_id, role, FolderScope::uid(folder_uid));
        }
    }

    /// Remove a folder's grant from the user, the role and every role it includes
    pub fn remove_folder_permissions(&self, org_id: i64, user_id: i64, role: Role, folder_uid: &str) {
        let scope = FolderScope::uid(folder_uid);
        if let Some(mut grants) = self.user_grants.get_mut(&(org_id, user_id)) {
            grants.remove(&scope);
        }
        for r in role.with_children() {
            if let Some(mut grants) = self.role_grants.get_mut(&(org_id, r)) {
                grants.remove(&scope);
            }
        }
    }

    /// Effective read scopes of a user: own grants plus those of their role hierarchy
    pub fn effective_scopes(&self, user: &SignedInUser) -> BTreeSet<FolderScope> {
        let mut scopes = BTreeSet::new();

        if user.role == Role::Admin {
            scopes.insert(FolderScope::All);
        }
        if let Some(grants) = self.user_grants.get(&(user.org_id, user.user_id)) {
            scopes.extend(grants.iter().cloned());
        }
        for role in user.role.with_children() {
            if let Some(grants) = self.role_grants.get(&(user.org_id, role)) {
                scopes.extend(grants.iter().cloned());
            }
        }
        scopes
    }
}
