use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

use super::StoreError;

/// A folder (rule namespace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub uid: String,
    pub title: String,
}

/// Folders per organization, kept in creation order
#[derive(Default)]
pub struct FolderStore {
    orgs: RwLock<HashMap<i64, Vec<Folder>>>,
}

impl FolderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        org_id: i64,
        uid: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Folder, StoreError> {
        let uid = uid.into();
        let mut orgs = self.orgs.write();
        let folders = orgs.entry(org_id).or_default();

        if folders.iter().any(|f| f.uid == uid) {
            return Err(StoreError::AlreadyExists(format!("folder '{}'", uid)));
        }

        let folder = Folder {
            uid,
            title: title.into(),
        };
        folders.push(folder.clone());
        Ok(folder)
    }

    pub fn get(&self, org_id: i64, uid: &str) -> Option<Folder> {
        self.orgs
            .read()
            .get(&org_id)
            .and_then(|folders| folders.iter().find(|f| f.uid == uid).cloned())
    }

    pub fn list(&self, org_id: i64) -> Vec<Folder> {
        self.orgs
            .read()
            .get(&org_id)
            .cloned()
            .unwrap_or_default()
    }
}
