//! Cached per-user permission snapshots
//!
//! Requests read an immutable `Arc<PermissionSnapshot>`; a reload computes a
//! fresh snapshot from the [`PermissionStore`] and swaps it in. Grant changes
//! are therefore only observed after a reload or once the entry's TTL expires.
//!
//! Snapshots are computed and inserted under `fill_lock`, so a first-time
//! computation can never land on top of a newer reload.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use parking_lot::Mutex;

use super::permissions::{FolderScope, PermissionStore};
use crate::auth::SignedInUser;
use crate::rules::RuleGroup;
use crate::store::Folder;

/// A user's folder read scopes at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionSnapshot {
    pub scopes: BTreeSet<FolderScope>,
}

impl PermissionSnapshot {
    pub fn can_read_folder(&self, folder_uid: &str) -> bool {
        self.scopes.iter().any(|scope| scope.covers(folder_uid))
    }

    /// Scopes rendered as strings, sorted
    pub fn scope_strings(&self) -> Vec<String> {
        self.scopes.iter().map(ToString::to_string).collect()
    }
}

pub struct PermissionCache {
    store: Arc<PermissionStore>,
    /// (org, user) -> snapshot
    snapshots: Cache<(i64, i64), Arc<PermissionSnapshot>>,
    /// Serializes compute-then-insert
    fill_lock: Mutex<()>,
}

impl PermissionCache {
    pub fn new(store: Arc<PermissionStore>, ttl: Duration) -> Self {
        Self {
            store,
            snapshots: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
            fill_lock: Mutex::new(()),
        }
    }

    /// Cached snapshot for the user, computed on first use
    pub fn snapshot(&self, user: &SignedInUser) -> Arc<PermissionSnapshot> {
        let key = (user.org_id, user.user_id);
        if let Some(snapshot) = self.snapshots.get(&key) {
            return snapshot;
        }

        let _guard = self.fill_lock.lock();
        // a reload may have won the race for the lock
        if let Some(snapshot) = self.snapshots.get(&key) {
            return snapshot;
        }
        let snapshot = self.compute(user);
        self.snapshots.insert(key, Arc::clone(&snapshot));
        snapshot
    }

    /// Recompute the user's snapshot and replace the cached one
    pub fn reload(&self, user: &SignedInUser) -> Arc<PermissionSnapshot> {
        let snapshot = {
            let _guard = self.fill_lock.lock();
            let snapshot = self.compute(user);
            self.snapshots
                .insert((user.org_id, user.user_id), Arc::clone(&snapshot));
            snapshot
        };
        tracing::debug!(
            user_id = user.user_id,
            org_id = user.org_id,
            scopes = snapshot.scopes.len(),
            "Reloaded permission snapshot"
        );
        snapshot
    }

    /// Drop every cached snapshot
    pub fn invalidate_all(&self) {
        self.snapshots.invalidate_all();
    }

    /// Keep only groups whose namespace the user may read, preserving order
    pub fn filter_visible(&self, user: &SignedInUser, groups: Vec<RuleGroup>) -> Vec<RuleGroup> {
        let snapshot = self.snapshot(user);
        groups
            .into_iter()
            .filter(|group| {
                group.org_id == user.org_id && snapshot.can_read_folder(&group.namespace_uid)
            })
            .collect()
    }

    /// Keep only folders the user may read
    pub fn filter_folders(&self, user: &SignedInUser, folders: Vec<Folder>) -> Vec<Folder> {
        let snapshot = self.snapshot(user);
        folders
            .into_iter()
            .filter(|folder| snapshot.can_read_folder(&folder.uid))
            .collect()
    }

    fn compute(&self, user: &SignedInUser) -> Arc<PermissionSnapshot> {
        Arc::new(PermissionSnapshot {
            scopes: self.store.effective_scopes(user),
        })
    }
}
