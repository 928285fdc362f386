use std::collections::HashMap;

use exo_core::{ResourceIdentity, ResourceRecord, ResourceSpec, SecretData, SecretRef};
use jiff::Timestamp;
use tokio::sync::{broadcast, RwLock};

use crate::error::StoreError;
use crate::record::{RecordStore, WatchEvent};
use crate::secret::SecretStore;
use crate::BoxFuture;

const WATCH_CAPACITY: usize = 1024;

/// Record store held in process memory.
pub struct MemoryRecordStore {
    records: RwLock<HashMap<ResourceIdentity, ResourceRecord>>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            records: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Seed the store with previously persisted records, keeping their
    /// metadata as-is.
    pub async fn restore(&self, records: Vec<ResourceRecord>) {
        let mut guard = self.records.write().await;
        for record in records {
            guard.insert(record.identity.clone(), record);
        }
    }

    fn emit(&self, event: WatchEvent) {
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(event);
    }
}

fn not_found(identity: &ResourceIdentity) -> StoreError {
    StoreError::NotFound {
        key: identity.to_string(),
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(
        &self,
        identity: &ResourceIdentity,
    ) -> BoxFuture<'_, Result<ResourceRecord, StoreError>> {
        let identity = identity.clone();
        Box::pin(async move {
            self.records
                .read()
                .await
                .get(&identity)
                .cloned()
                .ok_or_else(|| not_found(&identity))
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<ResourceRecord>, StoreError>> {
        Box::pin(async {
            let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
            records.sort_by(|a, b| a.identity.cmp(&b.identity));
            Ok(records)
        })
    }

    fn apply(
        &self,
        identity: ResourceIdentity,
        spec: ResourceSpec,
    ) -> BoxFuture<'_, Result<ResourceRecord, StoreError>> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            match records.get_mut(&identity) {
                Some(existing) => {
                    if existing.spec == spec {
                        return Ok(existing.clone());
                    }
                    let previous = existing.metadata.generation;
                    existing.spec = spec;
                    existing.metadata.generation += 1;
                    existing.metadata.version += 1;
                    tracing::debug!(
                        resource = %identity,
                        generation = existing.metadata.generation,
                        "desired state updated"
                    );
                    let record = existing.clone();
                    self.emit(WatchEvent {
                        identity,
                        generation: record.metadata.generation,
                        previous_generation: Some(previous),
                        removed: false,
                    });
                    Ok(record)
                }
                None => {
                    let mut record = ResourceRecord::new(identity.clone(), spec);
                    record.metadata.version = 1;
                    records.insert(identity.clone(), record.clone());
                    tracing::debug!(resource = %identity, "resource declared");
                    self.emit(WatchEvent {
                        identity,
                        generation: record.metadata.generation,
                        previous_generation: None,
                        removed: false,
                    });
                    Ok(record)
                }
            }
        })
    }

    fn request_deletion(
        &self,
        identity: &ResourceIdentity,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        let identity = identity.clone();
        Box::pin(async move {
            let mut records = self.records.write().await;
            let record = records
                .get_mut(&identity)
                .ok_or_else(|| not_found(&identity))?;
            if record.is_deleting() {
                return Ok(());
            }

            let previous = record.metadata.generation;
            record.metadata.deletion_timestamp = Some(Timestamp::now());
            record.metadata.generation += 1;
            record.metadata.version += 1;
            let generation = record.metadata.generation;
            let removed = record.metadata.finalizers.is_empty();
            if removed {
                records.remove(&identity);
            }

            tracing::debug!(resource = %identity, removed, "deletion requested");
            self.emit(WatchEvent {
                identity,
                generation,
                previous_generation: Some(previous),
                removed,
            });
            Ok(())
        })
    }

    fn update(
        &self,
        record: &ResourceRecord,
        expected_version: u64,
    ) -> BoxFuture<'_, Result<u64, StoreError>> {
        let incoming = record.clone();
        Box::pin(async move {
            let mut records = self.records.write().await;
            let identity = incoming.identity.clone();
            let current = records
                .get_mut(&identity)
                .ok_or_else(|| not_found(&identity))?;

            if current.metadata.version != expected_version {
                return Err(StoreError::Conflict {
                    key: identity.to_string(),
                    expected: expected_version,
                    actual: current.metadata.version,
                });
            }

            current.metadata.finalizers = incoming.metadata.finalizers;
            current.status = incoming.status;
            current.metadata.version += 1;

            let version = current.metadata.version;
            let generation = current.metadata.generation;
            let removed = current.is_deleting() && current.metadata.finalizers.is_empty();
            if removed {
                records.remove(&identity);
                tracing::debug!(resource = %identity, "finalizers cleared, record removed");
            }

            self.emit(WatchEvent {
                identity,
                generation,
                previous_generation: Some(generation),
                removed,
            });
            Ok(version)
        })
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}

/// Secret store held in process memory.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: RwLock<HashMap<SecretRef, SecretData>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a secret wholesale. Used to seed credentials.
    pub async fn insert(&self, secret: SecretRef, data: SecretData) {
        self.secrets.write().await.insert(secret, data);
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, secret: &SecretRef) -> BoxFuture<'_, Result<SecretData, StoreError>> {
        let secret = secret.clone();
        Box::pin(async move {
            self.secrets
                .read()
                .await
                .get(&secret)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    key: secret.to_string(),
                })
        })
    }

    fn apply(
        &self,
        secret: &SecretRef,
        data: SecretData,
    ) -> BoxFuture<'_, Result<bool, StoreError>> {
        let secret = secret.clone();
        Box::pin(async move {
            let mut secrets = self.secrets.write().await;
            let existing = secrets.entry(secret).or_default();
            let mut changed = false;
            for (key, value) in data {
                if existing.get(&key) != Some(&value) {
                    existing.insert(key, value);
                    changed = true;
                }
            }
            Ok(changed)
        })
    }

    fn delete(&self, secret: &SecretRef) -> BoxFuture<'_, Result<(), StoreError>> {
        let secret = secret.clone();
        Box::pin(async move {
            self.secrets.write().await.remove(&secret);
            Ok(())
        })
    }
}
