use exo_core::{ResourceIdentity, ResourceRecord, ResourceSpec};
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::BoxFuture;

/// Change notification emitted after every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub identity: ResourceIdentity,
    pub generation: u64,
    /// `None` when the record was just created.
    pub previous_generation: Option<u64>,
    /// The record is gone from the store.
    pub removed: bool,
}

impl WatchEvent {
    /// The declared state changed: created, spec edited, or deletion
    /// requested. Status-only writes and removals don't qualify.
    pub fn desired_state_changed(&self) -> bool {
        !self.removed && self.previous_generation != Some(self.generation)
    }
}

/// Versioned store of declared resources.
///
/// Methods return boxed futures for dyn compatibility.
pub trait RecordStore: Send + Sync {
    fn get(&self, identity: &ResourceIdentity)
    -> BoxFuture<'_, Result<ResourceRecord, StoreError>>;

    fn list(&self) -> BoxFuture<'_, Result<Vec<ResourceRecord>, StoreError>>;

    /// Declare or redeclare a resource. Bumps the generation when the spec
    /// changes.
    fn apply(
        &self,
        identity: ResourceIdentity,
        spec: ResourceSpec,
    ) -> BoxFuture<'_, Result<ResourceRecord, StoreError>>;

    /// Mark the record for deletion. Records without finalizers are removed
    /// right away.
    fn request_deletion(&self, identity: &ResourceIdentity)
    -> BoxFuture<'_, Result<(), StoreError>>;

    /// Compare-and-swap write of finalizers and status. Returns the new
    /// version. A deleting record written without finalizers is removed.
    fn update(
        &self,
        record: &ResourceRecord,
        expected_version: u64,
    ) -> BoxFuture<'_, Result<u64, StoreError>>;

    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}
