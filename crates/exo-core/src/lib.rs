//! exo-core
//!
//! Pure domain types for the provider: resource identities, declared and
//! observed state, status conditions and secret references.
//! No I/O — this is the shared vocabulary of the store, the engine and the
//! adapters.

pub mod condition;
pub mod error;
pub mod identity;
pub mod phase;
pub mod record;
pub mod secret;

pub use crate::condition::{Condition, ConditionSet, ConditionStatus, ConditionType};
pub use crate::error::CoreError;
pub use crate::identity::ResourceIdentity;
pub use crate::phase::LifecyclePhase;
pub use crate::record::{
    DeletionPolicy, ObservedState, RecordMeta, ResourceRecord, ResourceSpec, FINALIZER,
};
pub use crate::secret::{SecretData, SecretRef};
