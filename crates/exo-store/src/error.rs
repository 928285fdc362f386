use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {key}")]
    NotFound { key: String },

    #[error("version conflict on {key} (expected {expected}, got {actual})")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
