use std::collections::HashMap;
use std::sync::Arc;

use exo_core::ResourceRecord;

use crate::context::ReconcileContext;
use crate::error::ConnectError;
use crate::external::{BoxFuture, ExternalClient};

/// Produces the adapter for a resource: resolves its provider config and
/// credentials and builds a client.
///
/// A connector may cache transport clients keyed by credential identity. It
/// must never cache observations.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<Box<dyn ExternalClient>, ConnectError>>;
}

/// Connectors keyed by resource kind.
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(kind.into(), connector);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Connector>> {
        self.connectors.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.connectors.keys().map(String::as_str)
    }

    /// Resolve the connector for the record's kind and connect.
    pub async fn connect(
        &self,
        ctx: &ReconcileContext,
        record: &ResourceRecord,
    ) -> Result<Box<dyn ExternalClient>, ConnectError> {
        let connector = self
            .get(&record.identity.kind)
            .ok_or_else(|| ConnectError::UnsupportedKind(record.identity.kind.clone()))?;
        connector.connect(ctx, record).await
    }
}
