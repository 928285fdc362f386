use exo_core::{ResourceIdentity, ResourceSpec, SecretData, SecretRef};
use exo_store::{
    MemoryRecordStore, MemorySecretStore, RecordStore, SecretStore, SnapshotPersistence,
    StoreError,
};
use serde_json::json;

fn cluster(name: &str) -> ResourceIdentity {
    ResourceIdentity::new("SksCluster", name)
}

fn spec(size: u32) -> ResourceSpec {
    ResourceSpec::new(json!({"name": "c1", "zone": "ch-gva-2", "nodepoolSize": size}))
}

#[tokio::test]
async fn apply_bumps_generation_only_on_spec_change() {
    let store = MemoryRecordStore::new();
    let mut watch = store.watch();

    let first = store.apply(cluster("c1"), spec(3)).await.unwrap();
    assert_eq!(first.metadata.generation, 1);
    assert_eq!(first.metadata.version, 1);
    let event = watch.recv().await.unwrap();
    assert_eq!(event.previous_generation, None);
    assert!(event.desired_state_changed());

    let same = store.apply(cluster("c1"), spec(3)).await.unwrap();
    assert_eq!(same.metadata.version, 1);
    assert!(watch.try_recv().is_err());

    let changed = store.apply(cluster("c1"), spec(5)).await.unwrap();
    assert_eq!(changed.metadata.generation, 2);
    assert!(watch.recv().await.unwrap().desired_state_changed());
}

#[tokio::test]
async fn update_is_compare_and_swap() {
    let store = MemoryRecordStore::new();
    let mut record = store.apply(cluster("c1"), spec(3)).await.unwrap();
    record.add_finalizer();

    let version = store.update(&record, record.metadata.version).await.unwrap();
    assert_eq!(version, 2);

    // Stale version loses.
    let err = store.update(&record, 1).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Conflict {
            expected: 1,
            actual: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn update_never_overwrites_spec() {
    let store = MemoryRecordStore::new();
    let mut record = store.apply(cluster("c1"), spec(3)).await.unwrap();
    record.spec = spec(99);
    record.status.external_id = Some("abc".into());
    store.update(&record, 1).await.unwrap();

    let stored = store.get(&cluster("c1")).await.unwrap();
    assert_eq!(stored.spec, spec(3));
    assert_eq!(stored.status.external_id.as_deref(), Some("abc"));
}

#[tokio::test]
async fn status_writes_do_not_look_like_desired_state_changes() {
    let store = MemoryRecordStore::new();
    let record = store.apply(cluster("c1"), spec(3)).await.unwrap();
    let mut watch = store.watch();

    store.update(&record, 1).await.unwrap();
    let event = watch.recv().await.unwrap();
    assert!(!event.desired_state_changed());
}

#[tokio::test]
async fn deletion_waits_for_finalizers() {
    let store = MemoryRecordStore::new();
    let mut record = store.apply(cluster("c1"), spec(3)).await.unwrap();
    record.add_finalizer();
    store.update(&record, 1).await.unwrap();

    let mut watch = store.watch();
    store.request_deletion(&cluster("c1")).await.unwrap();
    let event = watch.recv().await.unwrap();
    assert!(event.desired_state_changed());
    assert!(!event.removed);

    let mut deleting = store.get(&cluster("c1")).await.unwrap();
    assert!(deleting.is_deleting());

    deleting.remove_finalizer();
    store
        .update(&deleting, deleting.metadata.version)
        .await
        .unwrap();
    assert!(watch.recv().await.unwrap().removed);
    assert!(store.get(&cluster("c1")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn deletion_without_finalizer_removes_immediately() {
    let store = MemoryRecordStore::new();
    store.apply(cluster("c1"), spec(3)).await.unwrap();
    store.request_deletion(&cluster("c1")).await.unwrap();
    assert!(store.get(&cluster("c1")).await.unwrap_err().is_not_found());
    assert!(
        store
            .request_deletion(&cluster("c1"))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn secret_apply_merges_and_reports_changes() {
    let secrets = MemorySecretStore::new();
    let target = SecretRef::new("exo-system", "c1-conn");

    let mut first = SecretData::new();
    first.insert("endpoint".into(), b"https://c1.sks".to_vec());
    assert!(secrets.apply(&target, first.clone()).await.unwrap());
    assert!(!secrets.apply(&target, first).await.unwrap());

    let mut second = SecretData::new();
    second.insert("version".into(), b"1.28.4".to_vec());
    assert!(secrets.apply(&target, second).await.unwrap());

    let stored = secrets.get(&target).await.unwrap();
    assert_eq!(stored.len(), 2);

    secrets.delete(&target).await.unwrap();
    assert!(secrets.get(&target).await.unwrap_err().is_not_found());
    secrets.delete(&target).await.unwrap();
}

#[tokio::test]
async fn snapshot_round_trips_records() {
    let dir = tempfile::tempdir().unwrap();
    let persistence = SnapshotPersistence::new(dir.path().join("state/records.json"));
    assert!(persistence.load().await.unwrap().is_empty());

    let store = MemoryRecordStore::new();
    store.apply(cluster("c1"), spec(3)).await.unwrap();
    store.apply(cluster("c2"), spec(1)).await.unwrap();
    persistence.flush(&store.list().await.unwrap()).await.unwrap();

    let restored = MemoryRecordStore::new();
    restored.restore(persistence.load().await.unwrap()).await;
    let records = restored.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].identity, cluster("c1"));
}
