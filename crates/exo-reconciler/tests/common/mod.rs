#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use exo_core::{ResourceIdentity, ResourceRecord, ResourceSpec, SecretData, SecretRef};
use exo_reconciler::{
    AdapterRegistry, BoxFuture, ConnectError, Connector, ExternalClient, ExternalCreation,
    ExternalObservation, ExternalUpdate, ProviderError, ReconcileContext, Reconciler,
    ReconcilerConfig, SecretPublisher,
};
use exo_store::{MemoryRecordStore, MemorySecretStore, RecordStore, StoreError, WatchEvent};
use serde_json::{json, Value};
use tokio::sync::broadcast;

pub const KIND: &str = "SksCluster";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Connect,
    Observe,
    Create,
    Update,
    Delete,
}

/// Remote side of the fake adapter: one resource per name.
#[derive(Default)]
pub struct FakeCloud {
    inner: Mutex<CloudState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_connect: AtomicBool,
}

#[derive(Default)]
struct CloudState {
    /// name -> desired size last applied
    resources: std::collections::HashMap<String, u64>,
    calls: Vec<Call>,
    failures: VecDeque<(Call, ProviderError)>,
    call_delay: Option<Duration>,
}

impl FakeCloud {
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// The next `call` fails with `error`.
    pub fn fail_next(&self, call: Call, error: ProviderError) {
        self.inner.lock().unwrap().failures.push_back((call, error));
    }

    pub fn set_call_delay(&self, delay: Duration) {
        self.inner.lock().unwrap().call_delay = Some(delay);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn exists(&self, name: &str) -> bool {
        self.inner.lock().unwrap().resources.contains_key(name)
    }

    pub fn size_of(&self, name: &str) -> Option<u64> {
        self.inner.lock().unwrap().resources.get(name).copied()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: Call) -> Result<(), ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let (delay, failure) = {
            let mut state = self.inner.lock().unwrap();
            state.calls.push(call);
            let failure = match state.failures.front() {
                Some((c, _)) if *c == call => state.failures.pop_front().map(|(_, e)| e),
                _ => None,
            };
            (state.call_delay, failure)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn desired_size(record: &ResourceRecord) -> u64 {
    record.spec.for_provider["nodepoolSize"].as_u64().unwrap_or(1)
}

fn endpoint(record: &ResourceRecord) -> SecretData {
    let mut details = SecretData::new();
    details.insert(
        "endpoint".to_string(),
        format!("https://{}.sks", record.identity.name).into_bytes(),
    );
    details
}

pub struct FakeClient {
    cloud: Arc<FakeCloud>,
}

impl ExternalClient for FakeClient {
    fn observe<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<ExternalObservation, ProviderError>> {
        Box::pin(async move {
            self.cloud.enter(Call::Observe).await?;
            let Some(size) = self.cloud.size_of(&record.identity.name) else {
                return Ok(ExternalObservation::absent());
            };
            let mut observation = ExternalObservation::present(size == desired_size(record));
            observation.connection_details = endpoint(record);
            observation.at_provider = Some(json!({"state": "running", "size": size}));
            Ok(observation)
        })
    }

    fn create<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<ExternalCreation, ProviderError>> {
        Box::pin(async move {
            self.cloud.enter(Call::Create).await?;
            self.cloud
                .inner
                .lock()
                .unwrap()
                .resources
                .insert(record.identity.name.clone(), desired_size(record));
            Ok(ExternalCreation {
                external_id: Some(format!("id-{}", record.identity.name)),
                connection_details: endpoint(record),
            })
        })
    }

    fn update<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
        _observation: &'a ExternalObservation,
    ) -> BoxFuture<'a, Result<ExternalUpdate, ProviderError>> {
        Box::pin(async move {
            self.cloud.enter(Call::Update).await?;
            self.cloud
                .inner
                .lock()
                .unwrap()
                .resources
                .insert(record.identity.name.clone(), desired_size(record));
            Ok(ExternalUpdate::default())
        })
    }

    fn delete<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            self.cloud.enter(Call::Delete).await?;
            self.cloud
                .inner
                .lock()
                .unwrap()
                .resources
                .remove(&record.identity.name);
            Ok(())
        })
    }
}

pub struct FakeConnector {
    pub cloud: Arc<FakeCloud>,
}

impl Connector for FakeConnector {
    fn connect<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        _record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<Box<dyn ExternalClient>, ConnectError>> {
        Box::pin(async move {
            self.cloud.inner.lock().unwrap().calls.push(Call::Connect);
            if self.cloud.fail_connect.load(Ordering::SeqCst) {
                return Err(ConnectError::ReferenceNotFound {
                    name: "default".into(),
                });
            }
            Ok(Box::new(FakeClient {
                cloud: Arc::clone(&self.cloud),
            }) as Box<dyn ExternalClient>)
        })
    }
}

/// Record store whose writes take `write_delay` to land.
pub struct SlowStore {
    pub inner: Arc<MemoryRecordStore>,
    pub write_delay: Duration,
}

impl RecordStore for SlowStore {
    fn get(
        &self,
        identity: &ResourceIdentity,
    ) -> BoxFuture<'_, Result<ResourceRecord, StoreError>> {
        self.inner.get(identity)
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<ResourceRecord>, StoreError>> {
        self.inner.list()
    }

    fn apply(
        &self,
        identity: ResourceIdentity,
        spec: ResourceSpec,
    ) -> BoxFuture<'_, Result<ResourceRecord, StoreError>> {
        self.inner.apply(identity, spec)
    }

    fn request_deletion(
        &self,
        identity: &ResourceIdentity,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        self.inner.request_deletion(identity)
    }

    fn update(
        &self,
        record: &ResourceRecord,
        expected_version: u64,
    ) -> BoxFuture<'_, Result<u64, StoreError>> {
        let delay = self.write_delay;
        let write = self.inner.update(record, expected_version);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            write.await
        })
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.watch()
    }
}

pub struct Harness {
    pub store: Arc<MemoryRecordStore>,
    pub secrets: Arc<MemorySecretStore>,
    pub cloud: Arc<FakeCloud>,
    pub reconciler: Reconciler,
}

pub fn config() -> ReconcilerConfig {
    ReconcilerConfig {
        max_reconcile_rate: 0.0,
        ..ReconcilerConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: ReconcilerConfig) -> Harness {
    let store = Arc::new(MemoryRecordStore::new());
    let secrets = Arc::new(MemorySecretStore::new());
    let cloud = Arc::new(FakeCloud::default());
    let registry = AdapterRegistry::new().register(
        KIND,
        Arc::new(FakeConnector {
            cloud: Arc::clone(&cloud),
        }),
    );
    let reconciler = Reconciler::new(store.clone(), registry, config)
        .with_publisher(Arc::new(SecretPublisher::new(secrets.clone())));
    Harness {
        store,
        secrets,
        cloud,
        reconciler,
    }
}

/// A reconciler for the fake adapter backed by an arbitrary record store.
pub fn reconciler_on(
    store: Arc<dyn RecordStore>,
    config: ReconcilerConfig,
) -> (Arc<FakeCloud>, Reconciler) {
    let cloud = Arc::new(FakeCloud::default());
    let registry = AdapterRegistry::new().register(
        KIND,
        Arc::new(FakeConnector {
            cloud: Arc::clone(&cloud),
        }),
    );
    (cloud, Reconciler::new(store, registry, config))
}

pub fn id(name: &str) -> ResourceIdentity {
    ResourceIdentity::new(KIND, name)
}

pub fn conn_secret(name: &str) -> SecretRef {
    SecretRef::new("default", format!("{name}-conn"))
}

pub fn cluster_spec(name: &str, size: u64) -> ResourceSpec {
    ResourceSpec::new(params(name, size)).with_connection_secret(conn_secret(name))
}

pub fn params(name: &str, size: u64) -> Value {
    json!({
        "name": name,
        "zone": "ch-gva-2",
        "nodepoolName": format!("{name}-pool"),
        "nodepoolSize": size,
    })
}
