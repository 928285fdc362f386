use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use std::collections::HashSet;

use exo_core::{ResourceIdentity, ResourceSpec, SecretData, SecretRef};
use exo_reconciler::ReconcilerConfig;
use exo_store::{RecordStore, StoreError};
use serde::{Deserialize, Serialize};

use crate::connector::ProviderConfig;
use crate::SKS_KIND;

pub const CONFIG_ENV: &str = "EXO_PROVIDER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "exo-provider.json";

/// The provider process configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderFile {
    pub reconciler: ReconcilerConfig,
    pub provider_configs: Vec<ProviderConfig>,
    /// Secrets loaded into the secret store at startup, typically the API
    /// credentials.
    pub secrets: Vec<SeededSecret>,
    /// SKS clusters to declare at startup.
    pub resources: Vec<DeclaredResource>,
    /// Where the record snapshot lives between runs.
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeededSecret {
    #[serde(flatten)]
    pub secret_ref: SecretRef,
    pub data: BTreeMap<String, String>,
}

impl SeededSecret {
    pub fn data(&self) -> SecretData {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone().into_bytes()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclaredResource {
    pub name: String,
    pub spec: ResourceSpec,
}

impl ProviderFile {
    pub async fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| eyre::eyre!("cannot read {}: {e}", path.display()))?;
        let file: Self = serde_json::from_slice(&raw)
            .map_err(|e| eyre::eyre!("cannot parse {}: {e}", path.display()))?;
        Ok(file)
    }

    /// Make the store match the declared resources: apply every declared
    /// cluster and request deletion of SKS records that are no longer
    /// declared. Returns how many deletions were requested.
    pub async fn declare(&self, store: &dyn RecordStore) -> Result<usize, StoreError> {
        let mut declared = HashSet::new();
        for resource in &self.resources {
            let identity = ResourceIdentity::new(SKS_KIND, &resource.name);
            store.apply(identity.clone(), resource.spec.clone()).await?;
            declared.insert(identity);
        }

        let mut removed = 0;
        for record in store.list().await? {
            if record.identity.kind != SKS_KIND
                || record.is_deleting()
                || declared.contains(&record.identity)
            {
                continue;
            }
            tracing::info!(resource = %record.identity, "no longer declared, requesting deletion");
            store.request_deletion(&record.identity).await?;
            removed += 1;
        }
        Ok(removed)
    }
}
