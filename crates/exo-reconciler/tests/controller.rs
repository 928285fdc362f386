mod common;

use std::time::Duration;

use common::{cluster_spec, harness_with, id, Call, Harness};
use exo_reconciler::{Controller, ProviderError, ReconcilerConfig};
use exo_store::RecordStore;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

fn config(workers: usize) -> ReconcilerConfig {
    ReconcilerConfig {
        workers,
        ..common::config()
    }
}

#[tokio::test(start_paused = true)]
async fn one_reconcile_per_identity_at_a_time() {
    let token = CancellationToken::new();
    let Harness {
        store,
        cloud,
        reconciler,
        ..
    } = harness_with(config(4));
    cloud.set_call_delay(Duration::from_millis(500));
    store.apply(id("c1"), cluster_spec("c1", 1)).await.unwrap();

    let controller = Controller::new(reconciler.with_shutdown(token.clone()));
    let run = tokio::spawn(controller.run(token.clone()));

    for size in 2..=5 {
        sleep(Duration::from_millis(200)).await;
        store.apply(id("c1"), cluster_spec("c1", size)).await.unwrap();
    }
    sleep(Duration::from_secs(30)).await;

    assert_eq!(cloud.max_in_flight(), 1);
    assert_eq!(cloud.size_of("c1"), Some(5));

    token.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn distinct_identities_run_in_parallel() {
    let token = CancellationToken::new();
    let Harness {
        store,
        cloud,
        reconciler,
        ..
    } = harness_with(config(3));
    cloud.set_call_delay(Duration::from_secs(1));
    for name in ["c1", "c2", "c3"] {
        store.apply(id(name), cluster_spec(name, 3)).await.unwrap();
    }

    let controller = Controller::new(reconciler.with_shutdown(token.clone()));
    let run = tokio::spawn(controller.run(token.clone()));
    sleep(Duration::from_secs(10)).await;

    assert!(cloud.max_in_flight() > 1);
    for name in ["c1", "c2", "c3"] {
        assert!(cloud.exists(name), "{name} not created");
    }

    token.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn failures_back_off_and_reset_on_success() {
    let token = CancellationToken::new();
    let Harness {
        store,
        cloud,
        reconciler,
        ..
    } = harness_with(config(1));
    cloud.set_fail_connect(true);
    store.apply(id("c1"), cluster_spec("c1", 3)).await.unwrap();

    let controller = Controller::new(reconciler.with_shutdown(token.clone()));
    let queue = controller.queue().clone();
    let run = tokio::spawn(controller.run(token.clone()));

    // Attempts at 0s, 60s and 180s: the delay doubles from the 60s floor.
    sleep(Duration::from_secs(30)).await;
    assert_eq!(cloud.count(Call::Connect), 1);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(cloud.count(Call::Connect), 2);
    sleep(Duration::from_secs(110)).await;
    assert_eq!(cloud.count(Call::Connect), 3);
    assert_eq!(queue.failures(&id("c1")), 3);

    cloud.set_fail_connect(false);
    sleep(Duration::from_secs(250)).await;
    assert!(cloud.exists("c1"));
    assert_eq!(queue.failures(&id("c1")), 0);

    token.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn deletion_request_reaches_the_remote() {
    let token = CancellationToken::new();
    let Harness {
        store,
        cloud,
        reconciler,
        ..
    } = harness_with(config(2));
    store.apply(id("c1"), cluster_spec("c1", 3)).await.unwrap();

    let controller = Controller::new(reconciler.with_shutdown(token.clone()));
    let queue = controller.queue().clone();
    let run = tokio::spawn(controller.run(token.clone()));
    sleep(Duration::from_secs(1)).await;
    assert!(cloud.exists("c1"));

    store.request_deletion(&id("c1")).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert!(!cloud.exists("c1"));
    assert!(store.get(&id("c1")).await.unwrap_err().is_not_found());

    // Nothing is left scheduled for the removed record.
    assert_eq!(queue.delayed(), 0);
    cloud.clear_calls();
    sleep(Duration::from_secs(120)).await;
    assert!(cloud.calls().is_empty(), "{:?}", cloud.calls());

    token.cancel();
    run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn terminal_outcome_stops_polling() {
    let token = CancellationToken::new();
    let Harness {
        store,
        cloud,
        reconciler,
        ..
    } = harness_with(config(1));
    store.apply(id("c1"), cluster_spec("c1", 3)).await.unwrap();

    let controller = Controller::new(reconciler.with_shutdown(token.clone()));
    let queue = controller.queue().clone();
    let run = tokio::spawn(controller.run(token.clone()));

    // Created at 0s, in sync at 5s, next poll due at 65s.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(queue.delayed(), 1);

    cloud.fail_next(Call::Observe, ProviderError::FatalAdapter("cni is immutable".into()));
    store.apply(id("c1"), cluster_spec("c1", 4)).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(cloud.count(Call::Update), 0);
    assert_eq!(queue.delayed(), 0);

    cloud.clear_calls();
    sleep(Duration::from_secs(120)).await;
    assert!(cloud.calls().is_empty(), "{:?}", cloud.calls());

    // An edit brings it back.
    store.apply(id("c1"), cluster_spec("c1", 5)).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(cloud.size_of("c1"), Some(5));

    token.cancel();
    run.await.unwrap().unwrap();
}
