use std::future::Future;
use std::time::Duration;

use exo_core::ResourceIdentity;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::error::ProviderError;

/// Per-reconcile context handed to connectors and adapters.
///
/// Carries the logging span, the deadline and the cancellation signal so
/// nothing about a reconcile lives in process-wide state.
#[derive(Clone)]
pub struct ReconcileContext {
    identity: ResourceIdentity,
    deadline: Instant,
    timeout: Duration,
    cancel: CancellationToken,
    span: Span,
}

impl ReconcileContext {
    pub fn new(identity: ResourceIdentity, timeout: Duration, cancel: CancellationToken) -> Self {
        let span = tracing::info_span!("reconcile", resource = %identity);
        Self {
            identity,
            deadline: Instant::now() + timeout,
            timeout,
            cancel,
            span,
        }
    }

    pub fn identity(&self) -> &ResourceIdentity {
        &self.identity
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Same reconcile with a fresh deadline `grace` from now, for recording
    /// the result of one that ran out of time.
    pub fn extended(&self, grace: Duration) -> Self {
        Self {
            deadline: Instant::now() + grace,
            ..self.clone()
        }
    }

    /// Await a suspension point, giving up when the reconcile is cancelled
    /// or its deadline passes. The call's own result is passed through.
    pub async fn run<F>(&self, call: F) -> Result<F::Output, ProviderError>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProviderError::Cancelled),
            res = tokio::time::timeout_at(self.deadline, call) => {
                res.map_err(|_| ProviderError::Timeout(self.timeout))
            }
        }
    }
}
