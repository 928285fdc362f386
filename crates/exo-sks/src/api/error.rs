use exo_reconciler::{format_err_chain, ProviderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{path} not found")]
    NotFound { path: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("cannot decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),

    #[error("cannot sign request: {0}")]
    Signing(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<ApiError> for ProviderError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::NotFound { path } => Self::NotFound(path),
            ApiError::Http { status, ref message } => match status {
                401 | 403 => Self::Config(format!("credentials rejected ({status}): {message}")),
                409 => Self::Conflict(e.to_string()),
                429 | 500..=599 => Self::TransientRemote(e.to_string()),
                _ => Self::FatalAdapter(e.to_string()),
            },
            ApiError::Transport(ref inner) => Self::TransientRemote(format_err_chain(inner)),
            ApiError::Decode(_) => Self::FatalAdapter(e.to_string()),
            ApiError::InvalidEndpoint(_) | ApiError::Signing(_) => Self::Config(e.to_string()),
        }
    }
}
