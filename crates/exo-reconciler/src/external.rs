use std::future::Future;
use std::pin::Pin;

use exo_core::{ResourceRecord, SecretData};
use serde_json::Value;

use crate::context::ReconcileContext;
use crate::error::ProviderError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque key/value details a consumer needs to reach the external resource.
pub type ConnectionDetails = SecretData;

/// The adapter's verdict from `observe`. Consumed by the engine only.
#[derive(Debug, Clone, Default)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    pub connection_details: ConnectionDetails,
    /// Adapter-shaped observation, mirrored into `status.at_provider`.
    pub at_provider: Option<Value>,
}

impl ExternalObservation {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn present(up_to_date: bool) -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExternalCreation {
    /// Remote identifier of the new resource, when the API returns one.
    pub external_id: Option<String>,
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Clone, Default)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// Lifecycle contract for one resource kind.
///
/// Implementations talk to the remote system and must not retry on their
/// own; retry and backoff belong to the engine. Methods return boxed futures
/// for dyn compatibility.
pub trait ExternalClient: Send + Sync {
    /// Read-only. A missing resource is `resource_exists = false`, never an
    /// error; any other failure must be an error so an outage is not taken
    /// for a deletion.
    fn observe<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<ExternalObservation, ProviderError>>;

    /// Create the resource. The engine always observes again before a
    /// repeated create.
    fn create<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<ExternalCreation, ProviderError>>;

    /// Bring an existing resource in line with the desired state.
    fn update<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
        observation: &'a ExternalObservation,
    ) -> BoxFuture<'a, Result<ExternalUpdate, ProviderError>>;

    /// Tear down the resource. Already gone counts as success.
    fn delete<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;
}
