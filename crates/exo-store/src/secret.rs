use exo_core::{SecretData, SecretRef};

use crate::error::StoreError;
use crate::BoxFuture;

/// Durable key/value secret storage: credentials in, connection details out.
pub trait SecretStore: Send + Sync {
    fn get(&self, secret: &SecretRef) -> BoxFuture<'_, Result<SecretData, StoreError>>;

    /// Merge `data` into the secret, creating it if needed. Returns whether
    /// anything changed.
    fn apply(&self, secret: &SecretRef, data: SecretData)
    -> BoxFuture<'_, Result<bool, StoreError>>;

    /// Drop the secret. Missing secrets are not an error.
    fn delete(&self, secret: &SecretRef) -> BoxFuture<'_, Result<(), StoreError>>;
}
