use std::sync::Arc;

use exo_core::ResourceIdentity;
use exo_store::RecordStore;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ReconcilerConfig;
use crate::error::ProviderError;
use crate::queue::WorkQueue;
use crate::ratelimit::RateLimiter;
use crate::reconciler::{ReconcileOutcome, Reconciler, Requeue};

/// Worker pool feeding the reconciler from the work queue, plus the watch
/// that keeps the queue filled.
pub struct Controller {
    reconciler: Arc<Reconciler>,
    queue: Arc<WorkQueue>,
    workers: usize,
}

impl Controller {
    pub fn new(reconciler: Reconciler) -> Self {
        let config: &ReconcilerConfig = reconciler.config();
        let queue = WorkQueue::new(
            config.backoff(),
            RateLimiter::new(config.max_reconcile_rate, config.burst),
        );
        let workers = config.workers.max(1);
        Self {
            reconciler: Arc::new(reconciler),
            queue: Arc::new(queue),
            workers,
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Run until `shutdown` is cancelled. In-flight reconciles finish (or
    /// observe the cancellation) before this returns.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ProviderError> {
        let store = Arc::clone(self.reconciler.store());
        // Subscribe before listing so nothing declared in between is missed.
        let mut events = store.watch();
        enqueue_all(store.as_ref(), &self.queue).await?;

        tracing::info!(workers = self.workers, "starting reconcile workers");
        let mut tasks = JoinSet::new();
        for worker in 0..self.workers {
            let reconciler = Arc::clone(&self.reconciler);
            let queue = Arc::clone(&self.queue);
            tasks.spawn(async move { run_worker(worker, reconciler, queue).await });
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) if event.desired_state_changed() => {
                        tracing::debug!(resource = %event.identity, generation = event.generation, "desired state changed");
                        self.queue.add(event.identity);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "watch lagged, relisting");
                        if let Err(e) = enqueue_all(store.as_ref(), &self.queue).await {
                            tracing::warn!(error = %e, "relist failed");
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("watch closed");
                        break;
                    }
                },
            }
        }

        tracing::info!("shutting down reconcile workers");
        self.queue.shutdown();
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "reconcile worker panicked");
            }
        }
        Ok(())
    }
}

async fn enqueue_all(store: &dyn RecordStore, queue: &WorkQueue) -> Result<(), ProviderError> {
    let records = store.list().await?;
    tracing::debug!(count = records.len(), "enqueueing all records");
    for record in records {
        queue.add(record.identity);
    }
    Ok(())
}

async fn run_worker(worker: usize, reconciler: Arc<Reconciler>, queue: Arc<WorkQueue>) {
    while let Some(identity) = queue.next().await {
        let outcome = reconciler.reconcile(&identity).await;
        apply_outcome(&queue, &identity, &outcome);
        queue.done(&identity);
    }
    tracing::debug!(worker, "reconcile worker stopped");
}

/// Translate the outcome into queue operations. Runs before `done`, so a
/// requeue of a still-running identity is parked until the worker lets go.
pub fn apply_outcome(queue: &WorkQueue, identity: &ResourceIdentity, outcome: &ReconcileOutcome) {
    match outcome.requeue {
        Requeue::After(delay) => {
            queue.forget(identity);
            queue.add_after(identity.clone(), delay);
        }
        Requeue::Immediate => queue.add(identity.clone()),
        Requeue::Backoff => {
            let delay = queue.add_rate_limited(identity.clone());
            tracing::debug!(resource = %identity, delay_secs = delay.as_secs(), "requeued with backoff");
        }
        // Terminal: only a desired-state change brings it back.
        Requeue::Never => queue.cancel(identity),
    }
}
