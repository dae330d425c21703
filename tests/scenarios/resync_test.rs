use std::sync::Arc;
use std::time::Duration;

use release_relay::DeliveryPolicy;
use release_relay::Engine;
use release_relay::RunMode;
use release_relay::SinkRegistration;

use crate::common::fast_config;
use crate::common::listing;
use crate::common::release;
use crate::common::CollectingSink;
use crate::common::ScriptedSource;

// Case: the watch stream keeps ending while nothing changes
//
// ## Setup:
// - three objects; three watch sessions that end without events
//
// ## Criterias:
// - four listings happen, only the first produces events
//
#[tokio::test(start_paused = true)]
async fn test_resync_with_identical_state_emits_nothing() {
    let objects = || vec![release("a", 1), release("b", 2), release("c", 3)];
    let source = Arc::new(
        ScriptedSource::new()
            .list(listing(objects(), 3))
            .watch(vec![])
            .watch(vec![])
            .watch(vec![]),
    );
    let sink = Arc::new(CollectingSink::healthy());
    let config = fast_config();
    let policy = DeliveryPolicy::from_config(&config);
    let engine = Engine::new(config, source.clone(), vec![SinkRegistration::new("audit", sink.clone(), policy)]);
    let handle = engine.handle();

    let run = tokio::spawn(engine.run(RunMode::Watch));
    sink.wait_for_events(3).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    handle.stop();
    let report = run.await.unwrap().unwrap();

    assert_eq!(source.list_calls(), 4);
    assert_eq!(sink.events().len(), 3);
    assert_eq!(report.relayed, 3);
    assert_eq!(report.suppressed, 9);
}

#[tokio::test(start_paused = true)]
async fn test_changes_between_resyncs_are_relayed_once() {
    let source = Arc::new(
        ScriptedSource::new()
            .list(listing(vec![release("a", 1)], 1))
            .watch(vec![])
            .list(listing(vec![release("a", 4), release("b", 5)], 5)),
    );
    let sink = Arc::new(CollectingSink::healthy());
    let config = fast_config();
    let policy = DeliveryPolicy::from_config(&config);
    let engine = Engine::new(config, source.clone(), vec![SinkRegistration::new("audit", sink.clone(), policy)]);
    let handle = engine.handle();

    let run = tokio::spawn(engine.run(RunMode::Watch));
    sink.wait_for_events(3).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.stop();
    run.await.unwrap().unwrap();

    let seen: Vec<(String, u64)> = sink
        .events()
        .iter()
        .map(|e| (e.key.name.clone(), e.generation))
        .collect();
    assert_eq!(
        seen,
        vec![("a".to_string(), 1), ("a".to_string(), 4), ("b".to_string(), 5)]
    );
}
