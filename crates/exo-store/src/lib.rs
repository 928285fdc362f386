//! exo-store
//!
//! Record and secret store interfaces consumed by the reconciler, plus
//! in-memory implementations. The record store is the only shared mutable
//! resource of the engine: every engine write is a compare-and-swap against
//! the record version.

pub mod error;
pub mod memory;
pub mod persistence;
pub mod record;
pub mod secret;

use std::future::Future;
use std::pin::Pin;

pub use crate::error::StoreError;
pub use crate::memory::{MemoryRecordStore, MemorySecretStore};
pub use crate::persistence::SnapshotPersistence;
pub use crate::record::{RecordStore, WatchEvent};
pub use crate::secret::SecretStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
