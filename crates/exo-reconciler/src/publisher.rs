use std::sync::Arc;

use exo_core::ResourceRecord;
use exo_store::SecretStore;

use crate::error::ProviderError;
use crate::external::{BoxFuture, ConnectionDetails};

/// Persists connection details for downstream consumers.
pub trait ConnectionPublisher: Send + Sync {
    /// Merge `details` into the record's connection target. Returns whether
    /// anything changed; publishing the same details twice changes nothing.
    fn publish<'a>(
        &'a self,
        record: &'a ResourceRecord,
        details: &'a ConnectionDetails,
    ) -> BoxFuture<'a, Result<bool, ProviderError>>;

    /// Remove everything published for the record.
    fn unpublish<'a>(&'a self, record: &'a ResourceRecord)
    -> BoxFuture<'a, Result<(), ProviderError>>;
}

/// Writes connection details to the secret named by
/// `spec.write_connection_secret_to`. Records without a target are skipped.
pub struct SecretPublisher {
    secrets: Arc<dyn SecretStore>,
}

impl SecretPublisher {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }
}

impl ConnectionPublisher for SecretPublisher {
    fn publish<'a>(
        &'a self,
        record: &'a ResourceRecord,
        details: &'a ConnectionDetails,
    ) -> BoxFuture<'a, Result<bool, ProviderError>> {
        Box::pin(async move {
            let Some(target) = &record.spec.write_connection_secret_to else {
                return Ok(false);
            };
            if details.is_empty() {
                return Ok(false);
            }

            let changed = self.secrets.apply(target, details.clone()).await?;
            if changed {
                tracing::info!(
                    resource = %record.identity,
                    secret = %target,
                    keys = details.len(),
                    "connection details published"
                );
            }
            Ok(changed)
        })
    }

    fn unpublish<'a>(
        &'a self,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let Some(target) = &record.spec.write_connection_secret_to else {
                return Ok(());
            };
            self.secrets.delete(target).await?;
            tracing::debug!(resource = %record.identity, secret = %target, "connection secret removed");
            Ok(())
        })
    }
}
