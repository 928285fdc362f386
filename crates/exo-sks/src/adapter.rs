use exo_core::ResourceRecord;
use exo_reconciler::{
    BoxFuture, ConnectionDetails, ExternalClient, ExternalCreation, ExternalObservation,
    ExternalUpdate, ProviderError, ReconcileContext,
};
use serde_json::json;

use crate::api::{ApiError, ExoscaleClient, SksCluster, UpdateSksCluster};
use crate::params::SksParameters;

const LABEL: &str = "SKS cluster";
const RUNNING: &str = "running";

/// Lifecycle of one SKS cluster against the Exoscale API.
pub struct SksExternal {
    client: ExoscaleClient,
}

impl SksExternal {
    pub fn new(client: ExoscaleClient) -> Self {
        Self { client }
    }

    /// Locate the cluster, by recorded id first and by name otherwise.
    async fn lookup(
        &self,
        record: &ResourceRecord,
        params: &SksParameters,
    ) -> Result<Option<SksCluster>, ApiError> {
        if let Some(id) = &record.status.external_id {
            match self.client.get_cluster(&params.zone, id).await {
                Ok(cluster) if cluster.name == params.name => return Ok(Some(cluster)),
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let Some(listed) = self.client.find_cluster(&params.zone, &params.name).await? else {
            return Ok(None);
        };
        let Some(id) = listed.id.clone() else {
            return Ok(Some(listed));
        };
        match self.client.get_cluster(&params.zone, &id).await {
            Ok(cluster) => Ok(Some(cluster)),
            // Deleted between list and get.
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn err(e: impl Into<ProviderError>, name: &str) -> ProviderError {
    e.into().with_resource(LABEL, name)
}

fn connection_details(cluster: &SksCluster) -> ConnectionDetails {
    let mut details = ConnectionDetails::new();
    if let Some(endpoint) = &cluster.endpoint {
        details.insert("endpoint".into(), endpoint.clone().into_bytes());
    }
    if let Some(id) = &cluster.id {
        details.insert("cluster-id".into(), id.clone().into_bytes());
    }
    if let Some(version) = &cluster.version {
        details.insert("version".into(), version.clone().into_bytes());
    }
    details
}

fn up_to_date(cluster: &SksCluster, params: &SksParameters) -> bool {
    let description_ok = params.description.is_none() || cluster.description == params.description;
    let nodepool_ok = cluster
        .nodepool(&params.nodepool_name)
        .is_some_and(|np| np.size == params.nodepool_size);
    description_ok && nodepool_ok
}

impl ExternalClient for SksExternal {
    fn observe<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<ExternalObservation, ProviderError>> {
        Box::pin(async move {
            let params = SksParameters::from_record(record)?;
            let Some(cluster) = self
                .lookup(record, &params)
                .await
                .map_err(|e| err(e, &params.name))?
            else {
                tracing::debug!(cluster = %params.name, zone = %params.zone, "SKS cluster not found");
                return Ok(ExternalObservation::absent());
            };

            if let Some(cni) = cluster.cni.as_ref().filter(|cni| **cni != params.cni) {
                return Err(ProviderError::FatalAdapter(format!(
                    "cni is immutable: cluster runs {cni}, desired {}",
                    params.cni
                ))
                .with_resource(LABEL, &params.name));
            }

            let fresh = up_to_date(&cluster, &params);
            tracing::debug!(
                cluster = %params.name,
                id = ?cluster.id,
                state = ?cluster.state,
                up_to_date = fresh,
                "SKS cluster observed"
            );
            Ok(ExternalObservation {
                resource_exists: true,
                resource_up_to_date: fresh,
                connection_details: connection_details(&cluster),
                at_provider: Some(json!({
                    "id": cluster.id.clone().unwrap_or_default(),
                    "state": cluster.state.clone().unwrap_or_default(),
                })),
            })
        })
    }

    fn create<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<ExternalCreation, ProviderError>> {
        Box::pin(async move {
            let params = SksParameters::from_record(record)?;
            tracing::info!(
                cluster = %params.name,
                zone = %params.zone,
                version = %params.version,
                "creating SKS cluster"
            );
            let operation = self
                .client
                .create_cluster(&params.zone, &params.cluster_request())
                .await
                .map_err(|e| err(e, &params.name))?;
            Ok(ExternalCreation {
                external_id: operation.reference.map(|r| r.id),
                connection_details: ConnectionDetails::new(),
            })
        })
    }

    fn update<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
        _observation: &'a ExternalObservation,
    ) -> BoxFuture<'a, Result<ExternalUpdate, ProviderError>> {
        Box::pin(async move {
            let params = SksParameters::from_record(record)?;
            let name = params.name.as_str();
            let cluster = self
                .lookup(record, &params)
                .await
                .map_err(|e| err(e, name))?
                .ok_or_else(|| ProviderError::NotFound(format!("{LABEL} {name}")))?;
            let id = cluster
                .id
                .clone()
                .ok_or_else(|| ProviderError::FatalAdapter(format!("{LABEL} {name} has no id")))?;

            if params.description.is_some() && cluster.description != params.description {
                tracing::info!(cluster = name, "updating SKS cluster description");
                let update = UpdateSksCluster {
                    description: params.description.clone(),
                };
                self.client
                    .update_cluster(&params.zone, &id, &update)
                    .await
                    .map_err(|e| err(e, name))?;
            }

            if cluster.state.as_deref() != Some(RUNNING) {
                // Nodepool calls are rejected until the control plane is up.
                tracing::debug!(cluster = name, state = ?cluster.state, "SKS cluster not running yet");
                return Ok(ExternalUpdate::default());
            }

            match cluster.nodepool(&params.nodepool_name) {
                None => {
                    tracing::info!(
                        cluster = name,
                        nodepool = %params.nodepool_name,
                        size = params.nodepool_size,
                        "creating SKS nodepool"
                    );
                    self.client
                        .create_nodepool(&params.zone, &id, &params.nodepool_request())
                        .await
                        .map_err(|e| err(e, name))?;
                }
                Some(np) if np.size != params.nodepool_size => {
                    let np_id = np.id.clone().ok_or_else(|| {
                        ProviderError::FatalAdapter(format!("nodepool {} has no id", np.name))
                    })?;
                    tracing::info!(
                        cluster = name,
                        nodepool = %np.name,
                        from = np.size,
                        to = params.nodepool_size,
                        "scaling SKS nodepool"
                    );
                    self.client
                        .scale_nodepool(&params.zone, &id, &np_id, params.nodepool_size)
                        .await
                        .map_err(|e| err(e, name))?;
                }
                Some(_) => {}
            }

            Ok(ExternalUpdate {
                connection_details: connection_details(&cluster),
            })
        })
    }

    fn delete<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let params = SksParameters::from_record(record)?;
            let name = params.name.as_str();
            let Some(cluster) = self.lookup(record, &params).await.map_err(|e| err(e, name))?
            else {
                return Ok(());
            };
            let Some(id) = cluster.id else {
                return Err(ProviderError::FatalAdapter(format!("{LABEL} {name} has no id")));
            };

            tracing::info!(cluster = name, id = %id, "deleting SKS cluster");
            match self.client.delete_cluster(&params.zone, &id).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(err(e, name)),
            }
        })
    }
}
