//! Folder-scoped access control

pub mod cache;
pub mod permissions;

pub use cache::{PermissionCache, PermissionSnapshot};
pub use permissions::{FolderScope, PermissionStore};
