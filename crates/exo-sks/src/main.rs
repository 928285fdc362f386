use std::env;
use std::sync::Arc;

use exo_reconciler::{AdapterRegistry, Controller, Reconciler, SecretPublisher};
use exo_sks::config::{CONFIG_ENV, DEFAULT_CONFIG_PATH};
use exo_sks::{ProviderFile, SksConnector, SKS_KIND};
use exo_store::{MemoryRecordStore, MemorySecretStore, RecordStore, SnapshotPersistence};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let file = ProviderFile::load(&path).await?;
    let config = file.reconciler.clone().with_env()?;

    let store = Arc::new(MemoryRecordStore::new());
    let persistence = file.state_path.clone().map(SnapshotPersistence::new);
    if let Some(persistence) = &persistence {
        store.restore(persistence.load().await?).await;
    }

    let secrets = Arc::new(MemorySecretStore::new());
    for seeded in &file.secrets {
        secrets.insert(seeded.secret_ref.clone(), seeded.data()).await;
    }
    let removed = file.declare(store.as_ref()).await?;

    let connector = SksConnector::new(file.provider_configs.clone(), secrets.clone());
    let registry = AdapterRegistry::new().register(SKS_KIND, Arc::new(connector));
    let kinds: Vec<&str> = registry.kinds().collect();

    tracing::info!(
        config = %path,
        provider_configs = file.provider_configs.len(),
        resources = file.resources.len(),
        removed,
        kinds = ?kinds,
        "starting exo-provider"
    );

    let shutdown = CancellationToken::new();
    let reconciler = Reconciler::new(store.clone(), registry, config)
        .with_publisher(Arc::new(SecretPublisher::new(secrets.clone())))
        .with_shutdown(shutdown.clone());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("shutdown requested");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!(error = %e, "cannot listen for ctrl-c"),
            }
        });
    }

    Controller::new(reconciler).run(shutdown).await?;

    if let Some(persistence) = &persistence {
        persistence.flush(&store.list().await?).await?;
    }
    tracing::info!("exo-provider stopped");
    Ok(())
}
