use exo_core::ResourceRecord;
use exo_reconciler::ProviderError;
use serde::{Deserialize, Serialize};

use crate::api::{IdRef, SksCluster, SksNodepool};

pub const DEFAULT_VERSION: &str = "1.28.4";
pub const DEFAULT_CNI: &str = "calico";

/// Desired state of one SKS cluster and its single nodepool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SksParameters {
    pub name: String,
    pub zone: String,
    #[serde(default = "default_cni")]
    pub cni: String,
    pub service_level: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: String,
    pub nodepool_name: String,
    pub nodepool_size: u64,
    #[serde(default)]
    pub nodepool_security_group: Option<String>,
    #[serde(default)]
    pub nodepool_instance_type: Option<String>,
    #[serde(default)]
    pub nodepool_disk_size: Option<u64>,
    #[serde(default)]
    pub nodepool_private_network: Option<String>,
}

fn default_cni() -> String {
    DEFAULT_CNI.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

impl SksParameters {
    pub fn from_record(record: &ResourceRecord) -> Result<Self, ProviderError> {
        let params: Self = record
            .spec
            .parameters()
            .map_err(|e| ProviderError::Config(format!("invalid parameters: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        for (field, value) in [
            ("name", &self.name),
            ("zone", &self.zone),
            ("serviceLevel", &self.service_level),
            ("nodepoolName", &self.nodepool_name),
        ] {
            if value.trim().is_empty() {
                return Err(ProviderError::Config(format!("{field} is required")));
            }
        }
        if self.nodepool_size == 0 {
            return Err(ProviderError::Config("nodepoolSize must be at least 1".into()));
        }
        Ok(())
    }

    pub fn cluster_request(&self) -> SksCluster {
        SksCluster {
            name: self.name.clone(),
            description: self.description.clone(),
            cni: Some(self.cni.clone()),
            level: Some(self.service_level.clone()),
            version: Some(self.version.clone()),
            ..Default::default()
        }
    }

    pub fn nodepool_request(&self) -> SksNodepool {
        SksNodepool {
            name: self.nodepool_name.clone(),
            size: self.nodepool_size,
            instance_type: self.nodepool_instance_type.as_deref().map(IdRef::new),
            disk_size: self.nodepool_disk_size,
            security_groups: self
                .nodepool_security_group
                .iter()
                .map(IdRef::new)
                .collect(),
            private_networks: self
                .nodepool_private_network
                .iter()
                .map(IdRef::new)
                .collect(),
            ..Default::default()
        }
    }
}
