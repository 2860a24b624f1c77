pub mod folder_store;
pub mod rule_store;

pub use folder_store::{Folder, FolderStore};
pub use rule_store::{InMemoryRuleStore, RuleGroupStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("{0} already exists")]
    AlreadyExists(String),
}
