use std::sync::Arc;
use std::time::Duration;

use exo_core::condition::reason;
use exo_core::{Condition, DeletionPolicy, ObservedState, ResourceIdentity, ResourceRecord};
use exo_store::RecordStore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::ReconcilerConfig;
use crate::connector::AdapterRegistry;
use crate::context::ReconcileContext;
use crate::error::{ErrorClass, ProviderError};
use crate::external::{ConnectionDetails, ExternalClient, ExternalObservation};
use crate::publisher::ConnectionPublisher;

/// Time allowed to record a timeout in status after the deadline passed.
const TIMEOUT_WRITE_GRACE: Duration = Duration::from_secs(30);

/// When the identity should be reconciled again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Healthy: come back after a fixed delay.
    After(Duration),
    /// Retry right away without counting a failure.
    Immediate,
    /// Failed: retry after the identity's backoff delay.
    Backoff,
    /// Nothing left to do until the record changes.
    Never,
}

#[derive(Debug)]
pub struct ReconcileOutcome {
    pub requeue: Requeue,
    pub error: Option<ProviderError>,
}

impl ReconcileOutcome {
    pub fn done() -> Self {
        Self {
            requeue: Requeue::Never,
            error: None,
        }
    }

    pub fn after(delay: Duration) -> Self {
        Self {
            requeue: Requeue::After(delay),
            error: None,
        }
    }

    /// Requeue policy for a failed step, chosen by error class.
    pub fn failed(error: ProviderError) -> Self {
        if matches!(error, ProviderError::Cancelled) {
            return Self::cancelled();
        }
        let requeue = match error.class() {
            ErrorClass::Transient | ErrorClass::NotFound => Requeue::Backoff,
            ErrorClass::Conflict => Requeue::Immediate,
            ErrorClass::Config | ErrorClass::Fatal => Requeue::Never,
        };
        Self {
            requeue,
            error: Some(error),
        }
    }

    /// Like `failed`, but never gives up: used while deleting so the remote
    /// delete is attempted until it is confirmed.
    pub fn retry(error: ProviderError) -> Self {
        if matches!(error, ProviderError::Cancelled) {
            return Self::cancelled();
        }
        let requeue = match error.class() {
            ErrorClass::Conflict => Requeue::Immediate,
            _ => Requeue::Backoff,
        };
        Self {
            requeue,
            error: Some(error),
        }
    }

    /// Shutdown interrupted the reconcile: no failure is counted.
    fn cancelled() -> Self {
        Self {
            requeue: Requeue::Immediate,
            error: Some(ProviderError::Cancelled),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives one resource toward its desired state per call.
///
/// Assumes single-writer access to the record for the duration of a call;
/// the work queue guarantees it. Every write is a compare-and-swap on the
/// version read at the start of the call.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    registry: AdapterRegistry,
    publishers: Vec<Arc<dyn ConnectionPublisher>>,
    config: ReconcilerConfig,
    shutdown: CancellationToken,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        registry: AdapterRegistry,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            registry,
            publishers: Vec::new(),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ConnectionPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    /// In-flight reconciles are cancelled when `token` is.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub async fn reconcile(&self, identity: &ResourceIdentity) -> ReconcileOutcome {
        let ctx = ReconcileContext::new(
            identity.clone(),
            self.config.timeout,
            self.shutdown.child_token(),
        );
        let span = ctx.span().clone();
        let outcome = self.reconcile_inner(&ctx).instrument(span.clone()).await;

        match &outcome.error {
            None => tracing::debug!(parent: &span, requeue = ?outcome.requeue, "reconcile finished"),
            Some(e) => tracing::warn!(
                parent: &span,
                requeue = ?outcome.requeue,
                error = %e,
                "reconcile failed"
            ),
        }
        outcome
    }

    async fn reconcile_inner(&self, ctx: &ReconcileContext) -> ReconcileOutcome {
        let mut record = match ctx
            .run(self.store.get(ctx.identity()))
            .await
            .and_then(|r| r.map_err(ProviderError::from))
        {
            Ok(record) => record,
            Err(ProviderError::Store(e)) if e.is_not_found() => {
                tracing::debug!("resource no longer exists");
                return ReconcileOutcome::done();
            }
            Err(e) => return ReconcileOutcome::failed(e),
        };

        if record.is_deleting() {
            return self.reconcile_deletion(ctx, record).await;
        }

        if record.add_finalizer() {
            if let Err(e) = self.write(ctx, &mut record).await {
                return ReconcileOutcome::failed(e);
            }
            tracing::debug!("finalizer added");
        }
        let before = record.status.clone();

        let client = match self.connect(ctx, &record).await {
            Ok(client) => client,
            Err(e) => {
                return self
                    .fail(ctx, &mut record, &before, reason::CONNECT_ERROR, e, false)
                    .await;
            }
        };

        let observation = match self.observe(ctx, client.as_ref(), &record).await {
            Ok(observation) => observation,
            Err(e) => {
                return self
                    .fail(ctx, &mut record, &before, reason::OBSERVE_ERROR, e, false)
                    .await;
            }
        };
        if let Some(at_provider) = &observation.at_provider {
            record.status.at_provider = at_provider.clone();
        }

        if !observation.resource_exists {
            record.status.conditions.set(Condition::creating());
            let creation = match ctx
                .run(client.create(ctx, &record))
                .await
                .and_then(|r| r)
            {
                Ok(creation) => creation,
                Err(e) => {
                    return self
                        .fail(ctx, &mut record, &before, reason::CREATE_ERROR, e, false)
                        .await;
                }
            };
            tracing::info!(external_id = ?creation.external_id, "external resource created");
            if creation.external_id.is_some() {
                record.status.external_id = creation.external_id;
            }
            if let Err(e) = self.publish(&record, &creation.connection_details).await {
                return self
                    .fail(ctx, &mut record, &before, reason::PUBLISH_ERROR, e, false)
                    .await;
            }
            record.status.conditions.set(Condition::reconcile_success());
            // Re-observe soon instead of trusting the create to have settled.
            return self
                .finish(
                    ctx,
                    &mut record,
                    &before,
                    ReconcileOutcome::after(self.config.short_wait),
                )
                .await;
        }

        if !observation.resource_up_to_date {
            let update = match ctx
                .run(client.update(ctx, &record, &observation))
                .await
                .and_then(|r| r)
            {
                Ok(update) => update,
                Err(e) => {
                    return self
                        .fail(ctx, &mut record, &before, reason::UPDATE_ERROR, e, false)
                        .await;
                }
            };
            tracing::info!("external resource updated");
            if let Err(e) = self.publish(&record, &update.connection_details).await {
                return self
                    .fail(ctx, &mut record, &before, reason::PUBLISH_ERROR, e, false)
                    .await;
            }
            record.status.conditions.set(Condition::updating());
            record.status.conditions.set(Condition::reconcile_success());
            return self
                .finish(
                    ctx,
                    &mut record,
                    &before,
                    ReconcileOutcome::after(self.config.short_wait),
                )
                .await;
        }

        if let Err(e) = self.publish(&record, &observation.connection_details).await {
            return self
                .fail(ctx, &mut record, &before, reason::PUBLISH_ERROR, e, false)
                .await;
        }
        tracing::debug!("external resource is up to date");
        record.status.conditions.set(Condition::available());
        record.status.conditions.set(Condition::reconcile_success());
        self.finish(
            ctx,
            &mut record,
            &before,
            ReconcileOutcome::after(self.config.poll_interval),
        )
        .await
    }

    /// Delete branch: the finalizer stays until the remote delete is
    /// confirmed, so deletes are attempted at least once.
    async fn reconcile_deletion(
        &self,
        ctx: &ReconcileContext,
        mut record: ResourceRecord,
    ) -> ReconcileOutcome {
        if !record.has_finalizer() {
            tracing::debug!("deleting without our finalizer, nothing to do");
            return ReconcileOutcome::done();
        }
        let before = record.status.clone();

        if record.spec.deletion_policy == DeletionPolicy::Orphan {
            tracing::info!("deletion policy is Orphan, leaving external resource in place");
            return self.release(ctx, &mut record, &before).await;
        }

        record.status.conditions.set(Condition::deleting());

        let client = match self.connect(ctx, &record).await {
            Ok(client) => client,
            Err(e) => {
                return self
                    .fail(ctx, &mut record, &before, reason::CONNECT_ERROR, e, true)
                    .await;
            }
        };

        let observation = match self.observe(ctx, client.as_ref(), &record).await {
            Ok(observation) => observation,
            Err(e) => {
                return self
                    .fail(ctx, &mut record, &before, reason::OBSERVE_ERROR, e, true)
                    .await;
            }
        };

        if observation.resource_exists {
            if let Err(e) = ctx.run(client.delete(ctx, &record)).await.and_then(|r| r) {
                return self
                    .fail(ctx, &mut record, &before, reason::DELETE_ERROR, e, true)
                    .await;
            }
            tracing::info!("external resource deleted");
        } else {
            tracing::debug!("external resource already gone");
        }

        self.release(ctx, &mut record, &before).await
    }

    /// Drop published connection details and our finalizer. The store
    /// removes the record once the write lands.
    async fn release(
        &self,
        ctx: &ReconcileContext,
        record: &mut ResourceRecord,
        before: &ObservedState,
    ) -> ReconcileOutcome {
        for publisher in &self.publishers {
            if let Err(e) = publisher.unpublish(record).await {
                return self
                    .fail(ctx, record, before, reason::PUBLISH_ERROR, e, true)
                    .await;
            }
        }

        record.remove_finalizer();
        match self.write(ctx, record).await {
            Ok(()) => {
                tracing::info!("finalizer removed");
                ReconcileOutcome::done()
            }
            Err(e) => ReconcileOutcome::retry(e),
        }
    }

    async fn connect(
        &self,
        ctx: &ReconcileContext,
        record: &ResourceRecord,
    ) -> Result<Box<dyn ExternalClient>, ProviderError> {
        ctx.run(self.registry.connect(ctx, record))
            .await
            .and_then(|r| r.map_err(ProviderError::from))
    }

    /// A `NotFound` from the adapter means the resource is absent.
    async fn observe(
        &self,
        ctx: &ReconcileContext,
        client: &dyn ExternalClient,
        record: &ResourceRecord,
    ) -> Result<ExternalObservation, ProviderError> {
        match ctx.run(client.observe(ctx, record)).await.and_then(|r| r) {
            Err(e) if e.class() == ErrorClass::NotFound => {
                tracing::debug!(error = %e, "observe reported not found");
                Ok(ExternalObservation::absent())
            }
            other => other,
        }
    }

    async fn publish(
        &self,
        record: &ResourceRecord,
        details: &ConnectionDetails,
    ) -> Result<(), ProviderError> {
        for publisher in &self.publishers {
            publisher.publish(record, details).await?;
        }
        Ok(())
    }

    /// Record the failure as `Synced=False` and pick the requeue policy.
    async fn fail(
        &self,
        ctx: &ReconcileContext,
        record: &mut ResourceRecord,
        before: &ObservedState,
        step: &str,
        error: ProviderError,
        deleting: bool,
    ) -> ReconcileOutcome {
        if matches!(error, ProviderError::Cancelled) {
            // Shutting down; leave the status alone.
            return ReconcileOutcome::cancelled();
        }

        let (step, ctx) = if matches!(error, ProviderError::Timeout(_)) {
            (reason::RECONCILE_TIMEOUT, ctx.extended(TIMEOUT_WRITE_GRACE))
        } else {
            (step, ctx.clone())
        };
        tracing::warn!(reason = step, error = %error, "reconcile step failed");
        record
            .status
            .conditions
            .set(Condition::reconcile_error(step, error.to_string()));

        let outcome = if deleting {
            ReconcileOutcome::retry(error)
        } else {
            ReconcileOutcome::failed(error)
        };
        self.finish(&ctx, record, before, outcome).await
    }

    /// Persist the status if it changed. A lost write overrides the
    /// outcome: conflicts retry immediately, other store errors back off.
    async fn finish(
        &self,
        ctx: &ReconcileContext,
        record: &mut ResourceRecord,
        before: &ObservedState,
        outcome: ReconcileOutcome,
    ) -> ReconcileOutcome {
        record.status.observed_generation = record.metadata.generation;
        if record.status == *before {
            return outcome;
        }
        match self.write(ctx, record).await {
            Ok(()) => outcome,
            Err(e) => {
                tracing::debug!(error = %e, "status write lost");
                ReconcileOutcome::retry(e)
            }
        }
    }

    async fn write(
        &self,
        ctx: &ReconcileContext,
        record: &mut ResourceRecord,
    ) -> Result<(), ProviderError> {
        let version = ctx
            .run(self.store.update(record, record.metadata.version))
            .await
            .and_then(|r| r.map_err(ProviderError::from))?;
        record.metadata.version = version;
        Ok(())
    }
}
