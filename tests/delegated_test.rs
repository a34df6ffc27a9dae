mod common;

use assert2::{check, let_assert};
use common::{delegated_api, documents};
use futures::future::join_all;
use resource_search::{
    DelegatedBackend, DispatchPolicy, FieldDescriptor, IndexResource, RecordId, SearchApi,
    SearchBackend, SearchConfig, SearchError,
};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn backend(config: SearchConfig) -> Arc<DelegatedBackend> {
    resource_search::tracing::init();
    Arc::new(DelegatedBackend::spawn(&config).expect("delegated backend should start"))
}

/// Test: Many concurrent searches each get their own answer.
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_searches_are_correlated() {
    let api = delegated_api();
    api.index_resource(documents()).await.unwrap();
    api.index_resource(
        IndexResource::new("numbers", vec!["word"]).resources(
            (0..50)
                .map(|i| json!({"id": i, "word": format!("n{}", i)}))
                .collect(),
        ),
    )
    .await
    .unwrap();

    let queries: Vec<String> = (0..50).map(|i| format!("n{}", i)).collect();
    let results = join_all(queries.iter().map(|q| api.perform_search("numbers", q))).await;

    for (i, result) in results.into_iter().enumerate() {
        let found = result.unwrap();
        let i = i64::try_from(i).unwrap();
        // "n1" also matches n10..n19
        check!(found.first() == Some(&RecordId::from(i)));
        check!(found.iter().all(|id| id.to_string().starts_with(&i.to_string())));
    }

    let found = api.perform_search("documents", "two").await.unwrap();
    check!(found == vec![RecordId::from(2)]);
    api.terminate().await;
}

/// Test: Clones of the facade issuing requests from separate tasks.
#[tokio::test(flavor = "multi_thread")]
async fn searches_from_spawned_tasks() {
    let api = delegated_api();
    api.index_resource(documents()).await.unwrap();

    let handles: Vec<_> = ["one", "two", "three"]
        .into_iter()
        .map(|query| {
            let api = api.clone();
            tokio::spawn(async move { api.perform_search("documents", query).await })
        })
        .collect();

    let mut found = Vec::new();
    for handle in handles {
        found.extend(handle.await.unwrap().unwrap());
    }
    check!(found == vec![RecordId::from(1), RecordId::from(2), RecordId::from(3)]);
    api.terminate().await;
}

/// Test: A request outliving its deadline fails with Timeout.
#[tokio::test(flavor = "multi_thread")]
async fn slow_request_times_out() {
    let api = SearchApi::from_config(SearchConfig {
        request_timeout_ms: 50,
        ..SearchConfig::delegated(1)
    })
    .unwrap();

    let slow = FieldDescriptor::function(|record, _| {
        std::thread::sleep(Duration::from_millis(300));
        Ok(vec![record["name"].as_str().unwrap_or_default().to_string()])
    });
    let_assert!(
        Err(SearchError::Timeout { after, .. }) = api
            .index_resource(
                IndexResource::new("slow", slow).resources(vec![json!({"id": 1, "name": "Late"})])
            )
            .await
    );
    check!(after == Duration::from_millis(50));

    // The worker still finishes the batch; later requests queue behind it
    tokio::time::sleep(Duration::from_millis(400)).await;
    check!(api.perform_search("slow", "late").await.unwrap() == vec![RecordId::from(1)]);
    api.terminate().await;
}

/// Test: Terminating one worker fails its collections until re-registered.
#[tokio::test(flavor = "multi_thread")]
async fn terminated_worker_and_reregistration() {
    let backend = backend(SearchConfig::delegated(2));
    let api = SearchApi::with_backend(backend.clone());

    api.index_resource(documents()).await.unwrap();
    api.index_resource(
        IndexResource::new("other", vec!["name"]).resources(vec![json!({"id": 7, "name": "Seven"})]),
    )
    .await
    .unwrap();
    let_assert!(Some(worker) = backend.worker_for("documents"));
    check!(backend.worker_for("other") != Some(worker));

    check!(backend.terminate_worker(worker));
    check!(backend.live_workers() == 1);

    let_assert!(
        Err(SearchError::WorkerUnavailable { worker: failed }) =
            api.perform_search("documents", "one").await
    );
    check!(failed == worker);

    // Collections on the surviving worker are untouched
    check!(api.perform_search("other", "sev").await.unwrap() == vec![RecordId::from(7)]);

    // Re-registering moves the collection to a live worker with a fresh index
    api.index_resource(documents()).await.unwrap();
    check!(backend.worker_for("documents") != Some(worker));
    check!(api.perform_search("documents", "one").await.unwrap() == vec![RecordId::from(1)]);
    api.terminate().await;
}

/// Test: Requests queued before a worker stops are still answered.
#[tokio::test(flavor = "multi_thread")]
async fn queued_requests_drain_before_stop() {
    let backend = backend(SearchConfig::delegated(1));

    let indexing = backend.index_resource(documents());
    let searching = backend.perform_search("documents", "three");
    check!(backend.terminate_worker(0));

    check!(indexing.await.is_ok());
    check!(searching.await.unwrap() == vec![RecordId::from(3)]);
    let_assert!(
        Err(SearchError::WorkerUnavailable { worker: 0 }) =
            backend.perform_search("documents", "three").await
    );
}

#[rstest]
#[case::round_robin(DispatchPolicy::RoundRobin)]
#[case::least_busy(DispatchPolicy::LeastBusy)]
#[tokio::test(flavor = "multi_thread")]
async fn collections_spread_across_workers(#[case] dispatch: DispatchPolicy) {
    let backend = backend(SearchConfig {
        dispatch,
        ..SearchConfig::delegated(2)
    });

    for name in ["a", "b"] {
        backend
            .index_resource(IndexResource::new(name, vec!["name"]))
            .await
            .unwrap();
    }

    let_assert!(Some(first) = backend.worker_for("a"));
    let_assert!(Some(second) = backend.worker_for("b"));
    check!(first != second);
    backend.terminate().await;
}

/// Test: After terminate, nothing is registered and new work is refused.
#[tokio::test(flavor = "multi_thread")]
async fn terminate_stops_everything() {
    let backend = backend(SearchConfig::delegated(2));
    let api = SearchApi::with_backend(backend.clone());
    api.index_resource(documents()).await.unwrap();

    api.terminate().await;

    check!(backend.live_workers() == 0);
    check!(backend.worker_for("documents").is_none());
    let_assert!(
        Err(SearchError::UnknownCollection { .. }) = api.perform_search("documents", "one").await
    );
    let_assert!(
        Err(SearchError::WorkerUnavailable { .. }) = api.index_resource(documents()).await
    );
}
