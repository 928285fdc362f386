use std::time::Duration;

use exo_store::StoreError;
use thiserror::Error;

/// Errors surfaced by adapters and by the engine itself.
///
/// The engine only looks at [`ProviderError::class`]; adapter-specific
/// detail travels in the message.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Bad reference or spec. Needs a user edit before a retry can help.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network failure, 5xx, throttling. Retried with backoff.
    #[error("remote error: {0}")]
    TransientRemote(String),

    /// The remote resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("version conflict: {0}")]
    Conflict(String),

    /// The adapter cannot make progress with this desired state.
    #[error("adapter error: {0}")]
    FatalAdapter(String),

    #[error("reconcile timed out after {0:?}")]
    Timeout(Duration),

    #[error("reconcile cancelled")]
    Cancelled,

    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("store error: {0}")]
    Store(#[source] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Retry classification the engine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Config,
    Transient,
    NotFound,
    Conflict,
    Fatal,
}

impl ProviderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::Serialization(_) => ErrorClass::Config,
            Self::TransientRemote(_) | Self::Timeout(_) | Self::Cancelled | Self::Connect(_) => {
                ErrorClass::Transient
            }
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::Conflict(_) => ErrorClass::Conflict,
            Self::FatalAdapter(_) => ErrorClass::Fatal,
            Self::Store(e) if e.is_conflict() => ErrorClass::Conflict,
            Self::Store(_) => ErrorClass::Transient,
        }
    }

    /// Prepend resource identity to the error message.
    pub fn with_resource(self, label: &str, name: &str) -> Self {
        match self {
            Self::Config(msg) => Self::Config(format!("{label} ({name}): {msg}")),
            Self::TransientRemote(msg) => Self::TransientRemote(format!("{label} ({name}): {msg}")),
            Self::FatalAdapter(msg) => Self::FatalAdapter(format!("{label} ({name}): {msg}")),
            other => other,
        }
    }
}

impl From<StoreError> for ProviderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { .. } => Self::Conflict(e.to_string()),
            other => Self::Store(other),
        }
    }
}

/// Failure to produce an adapter for a resource. Kept apart from
/// [`ProviderError`] so the engine reports it under its own reason.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no connector registered for kind {0}")]
    UnsupportedKind(String),

    #[error("cannot get provider config {name}")]
    ReferenceNotFound { name: String },

    #[error("cannot get credentials from {secret}: {reason}")]
    CredentialFetch { secret: String, reason: String },

    #[error("cannot create new client: {0}")]
    Client(String),
}

/// Walk the full error chain and join all causes into one string.
///
/// HTTP client errors often have terse `Display` impls (e.g. "error sending
/// request") but useful detail in the source chain.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
