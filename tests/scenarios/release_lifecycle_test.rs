use std::sync::Arc;
use std::time::Duration;

use release_relay::DeletePolicy;
use release_relay::DeliveryPolicy;
use release_relay::Engine;
use release_relay::EngineState;
use release_relay::EventKind;
use release_relay::RunMode;
use release_relay::SinkRegistration;
use release_relay::WatchEvent;

use crate::common::enable_logger;
use crate::common::fast_config;
use crate::common::listing;
use crate::common::release;
use crate::common::CollectingSink;
use crate::common::ScriptedSource;

// Case: a release goes through create, resync, update and delete
//
// ## Setup:
// - list r1@1; watch ends; resync lists r1@1 again
// - watch MODIFIED r1@2, DELETED r1@3; the final resync is empty
//
// ## Criterias:
// - sink receives Created(1) then Updated(2), nothing else
// - the engine moves Running -> Stopping -> Stopped on stop()
//
#[tokio::test(start_paused = true)]
async fn test_release_lifecycle_end_to_end() {
    enable_logger();
    let source = ScriptedSource::new()
        .list(listing(vec![release("r1", 1)], 1))
        .watch(vec![])
        .list(listing(vec![release("r1", 1)], 1))
        .watch(vec![
            WatchEvent::Modified(release("r1", 2)),
            WatchEvent::Deleted(release("r1", 3)),
        ])
        .list(listing(vec![], 3));
    let sink = Arc::new(CollectingSink::healthy());
    let config = fast_config();
    let policy = DeliveryPolicy::from_config(&config);
    let engine = Engine::new(config, Arc::new(source), vec![SinkRegistration::new("audit", sink.clone(), policy)]);

    let mut handle = engine.handle();
    let mut states = handle.subscribe();
    let run = tokio::spawn(engine.run(RunMode::Watch));
    handle.wait_for(EngineState::Running).await.unwrap();

    sink.wait_for_events(2).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.stop();
    let report = run.await.unwrap().unwrap();

    let seen: Vec<(EventKind, u64)> = sink.events().iter().map(|e| (e.kind, e.generation)).collect();
    assert_eq!(seen, vec![(EventKind::Created, 1), (EventKind::Updated, 2)]);
    assert_eq!(report.relayed, 2);
    assert_eq!(*states.borrow_and_update(), EngineState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_tombstones_are_relayed_when_configured() {
    let source = ScriptedSource::new()
        .list(listing(vec![release("r1", 1), release("r2", 2)], 2))
        .watch(vec![WatchEvent::Deleted(release("r2", 3))])
        .list(listing(vec![release("r1", 1)], 3));
    let sink = Arc::new(CollectingSink::healthy());
    let mut config = fast_config();
    config.engine.delete_policy = DeletePolicy::Tombstone;
    let policy = DeliveryPolicy::from_config(&config);
    let engine = Engine::new(config, Arc::new(source), vec![SinkRegistration::new("audit", sink.clone(), policy)]);
    let handle = engine.handle();

    let run = tokio::spawn(engine.run(RunMode::Watch));
    sink.wait_for_events(3).await;
    handle.stop();
    run.await.unwrap().unwrap();

    let last = sink.events().pop().unwrap();
    assert_eq!(last.kind, EventKind::Deleted);
    assert_eq!(last.key.name, "r2");
}
