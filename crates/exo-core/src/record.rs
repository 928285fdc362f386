use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::ConditionSet;
use crate::error::CoreError;
use crate::identity::ResourceIdentity;
use crate::secret::SecretRef;

/// Finalizer the engine places on every record before mutating the remote.
pub const FINALIZER: &str = "finalizer.managedresource.exo.io";

/// A declared resource together with its engine-owned status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub identity: ResourceIdentity,
    pub metadata: RecordMeta,
    pub spec: ResourceSpec,
    #[serde(default)]
    pub status: ObservedState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    /// Store-assigned, bumped on every write. Used for compare-and-swap.
    pub version: u64,
    /// Bumped when the spec changes or deletion is requested.
    pub generation: u64,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
}

/// Desired state. Owned by the declaring user; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// Adapter-specific parameters; the shape varies per resource kind.
    pub for_provider: Value,
    #[serde(default = "default_provider_config")]
    pub provider_config_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to: Option<SecretRef>,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

fn default_provider_config() -> String {
    "default".to_string()
}

impl ResourceSpec {
    pub fn new(for_provider: Value) -> Self {
        Self {
            for_provider,
            provider_config_ref: default_provider_config(),
            write_connection_secret_to: None,
            deletion_policy: DeletionPolicy::default(),
        }
    }

    pub fn with_connection_secret(mut self, secret: SecretRef) -> Self {
        self.write_connection_secret_to = Some(secret);
        self
    }

    pub fn with_deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = policy;
        self
    }

    /// Deserialize `for_provider` into the adapter's parameter type.
    pub fn parameters<T: serde::de::DeserializeOwned>(&self) -> Result<T, CoreError> {
        Ok(serde_json::from_value(self.for_provider.clone())?)
    }
}

/// What happens to the external resource when its record is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    /// Release the record but leave the external resource in place.
    Orphan,
}

/// Status written back by the engine. Never user-writable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub conditions: ConditionSet,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub at_provider: Value,
    #[serde(default)]
    pub observed_generation: u64,
}

impl ResourceRecord {
    pub fn new(identity: ResourceIdentity, spec: ResourceSpec) -> Self {
        Self {
            identity,
            metadata: RecordMeta {
                version: 0,
                generation: 1,
                created_at: Timestamp::now(),
                deletion_timestamp: None,
                finalizers: Vec::new(),
            },
            spec,
            status: ObservedState::default(),
        }
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self) -> bool {
        self.metadata.finalizers.iter().any(|f| f == FINALIZER)
    }

    /// Returns true when the finalizer was added.
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.metadata.finalizers.push(FINALIZER.to_string());
        true
    }

    /// Returns true when the finalizer was removed.
    pub fn remove_finalizer(&mut self) -> bool {
        let before = self.metadata.finalizers.len();
        self.metadata.finalizers.retain(|f| f != FINALIZER);
        before != self.metadata.finalizers.len()
    }
}
