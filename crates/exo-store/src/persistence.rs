use std::path::PathBuf;

use exo_core::ResourceRecord;

use crate::error::StoreError;

/// Local snapshot of the record store so declared resources, finalizers and
/// conditions survive a restart of the provider process.
pub struct SnapshotPersistence {
    pub local_path: PathBuf,
}

impl SnapshotPersistence {
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
        }
    }

    /// Atomic write: tmp file + rename.
    pub async fn flush(&self, records: &[ResourceRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)?;
        if let Some(parent) = self.local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.local_path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json).await?;
        tokio::fs::rename(&tmp_path, &self.local_path).await?;

        tracing::debug!(
            path = %self.local_path.display(),
            records = records.len(),
            "snapshot flushed to local disk"
        );
        Ok(())
    }

    /// Load the snapshot, or an empty list if none exists yet.
    pub async fn load(&self) -> Result<Vec<ResourceRecord>, StoreError> {
        match tokio::fs::read(&self.local_path).await {
            Ok(json) => {
                let records: Vec<ResourceRecord> = serde_json::from_slice(&json)?;
                tracing::debug!(
                    path = %self.local_path.display(),
                    records = records.len(),
                    "snapshot loaded from local disk"
                );
                Ok(records)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no existing snapshot found, starting fresh");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}
