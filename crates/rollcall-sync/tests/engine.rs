mod common;

use std::sync::Arc;
use std::time::Duration;

use rollcall_sync::{EngineConfig, SyncError};
use rollcall_types::events::LiveEvent;

use common::{StubSource, engine_with, engine_with_config};

const DAY: &str = "2025-01-01";

#[tokio::test]
async fn concurrent_refreshes_share_one_fetch() {
    let source = StubSource::with_guests(&["a@x.com", "b@x.com"]);
    source.set_delay(Duration::from_millis(100));
    let engine = engine_with("ev1", source.clone());

    let (first, second) = tokio::join!(engine.refresh("ev1", DAY), engine.refresh("ev1", DAY));

    assert_eq!(source.calls(), 1);
    assert_eq!(first.unwrap().registered_count(), 2);
    assert_eq!(second.unwrap().registered_count(), 2);

    // Once settled, the next refresh fetches again.
    engine.refresh("ev1", DAY).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn many_waiters_share_one_failure() {
    let source = StubSource::with_guests(&["a@x.com"]);
    source.set_delay(Duration::from_millis(50));
    source.set_failing(true);
    let engine = engine_with("ev1", source.clone());

    let results = refresh_from_tasks(&engine, 5).await;

    assert_eq!(source.calls(), 1);
    for result in results {
        assert!(matches!(result, Err(SyncError::Source(ref e)) if e.status == Some(503)));
    }
}

async fn refresh_from_tasks(
    engine: &rollcall_sync::Engine,
    n: usize,
) -> Vec<Result<rollcall_sync::ReconciledView, SyncError>> {
    let mut handles = Vec::new();
    for _ in 0..n {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { engine.refresh("ev1", DAY).await }));
    }
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let source = StubSource::with_guests(&["a@x.com", "b@x.com", "c@x.com"]);
    let engine = engine_with("ev1", source.clone());

    engine.refresh("ev1", DAY).await.unwrap();
    let before = engine.current_view("ev1", DAY).await.unwrap();

    source.set_failing(true);
    let err = engine.refresh("ev1", DAY).await.unwrap_err();
    assert!(matches!(err, SyncError::Source(_)));

    let after = engine.current_view("ev1", DAY).await.unwrap();
    assert!(Arc::ptr_eq(&before.guests, &after.guests));
    assert_eq!(after.registered_count(), 3);
    assert!(after.last_error.is_some());
    assert!(after.tracker().last_error.unwrap().contains("upstream down"));

    // Recovery clears the error.
    source.set_failing(false);
    let recovered = engine.refresh("ev1", DAY).await.unwrap();
    assert!(recovered.last_error.is_none());
}

#[tokio::test]
async fn refresh_replaces_snapshot_wholesale() {
    let source = StubSource::with_guests(&["a@x.com", "b@x.com"]);
    let engine = engine_with("ev1", source.clone());
    engine.refresh("ev1", DAY).await.unwrap();

    source.set_guests(&["c@x.com"]);
    let view = engine.refresh("ev1", DAY).await.unwrap();

    assert_eq!(view.registered_count(), 1);
    assert!(view.guests.contains("c@x.com"));
    assert!(!view.guests.contains("a@x.com"));
}

#[tokio::test]
async fn current_view_before_first_refresh_is_empty() {
    let engine = engine_with("ev1", StubSource::with_guests(&["a@x.com"]));

    let view = engine.current_view("ev1", DAY).await.unwrap();

    assert_eq!(view.registered_count(), 0);
    assert!(view.guests.fetched_at().is_none());
}

#[tokio::test]
async fn current_view_ignores_refresh_in_flight() {
    let source = StubSource::with_guests(&["a@x.com"]);
    let engine = engine_with("ev1", source.clone());
    engine.refresh("ev1", DAY).await.unwrap();

    source.set_guests(&["a@x.com", "b@x.com"]);
    source.set_delay(Duration::from_millis(200));
    let background = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.refresh("ev1", DAY).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let view = tokio::time::timeout(Duration::from_millis(100), engine.current_view("ev1", DAY))
        .await
        .expect("current_view must not wait for the refresh")
        .unwrap();
    assert_eq!(view.registered_count(), 1);

    assert_eq!(background.await.unwrap().unwrap().registered_count(), 2);
}

#[tokio::test]
async fn unknown_and_duplicate_events() {
    let engine = engine_with("ev1", StubSource::with_guests(&[]));

    assert!(matches!(engine.current_view("nope", DAY).await, Err(SyncError::UnknownEvent(_))));
    assert!(matches!(engine.refresh("nope", DAY).await, Err(SyncError::UnknownEvent(_))));
    assert!(matches!(engine.start("nope"), Err(SyncError::UnknownEvent(_))));
    assert!(matches!(
        engine.register("ev1", StubSource::with_guests(&[])),
        Err(SyncError::DuplicateEvent(_))
    ));
}

#[tokio::test]
async fn timer_polls_until_stopped() {
    let source = StubSource::with_guests(&["a@x.com"]);
    let config = EngineConfig {
        refresh_interval: Duration::from_millis(30),
        ..Default::default()
    };
    let engine = engine_with_config("ev1", source.clone(), config);

    engine.start("ev1").unwrap();
    engine.start("ev1").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(engine.status("ev1").unwrap().polling);
    let polled = source.calls();
    assert!(polled >= 3, "expected periodic fetches, got {}", polled);
    assert_eq!(engine.snapshot("ev1").unwrap().len(), 1);

    assert!(engine.stop("ev1").unwrap());
    assert!(!engine.stop("ev1").unwrap());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after_stop = source.calls();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(source.calls(), after_stop);
    assert!(!engine.status("ev1").unwrap().polling);
}

#[tokio::test]
async fn remove_stops_timer_and_drops_view() {
    let source = StubSource::with_guests(&["a@x.com"]);
    let config = EngineConfig {
        refresh_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let engine = engine_with_config("ev1", source.clone(), config);
    engine.start("ev1").unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(engine.remove("ev1"));
    assert!(!engine.remove("ev1"));
    tokio::time::sleep(Duration::from_millis(30)).await;
    let after_remove = source.calls();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(source.calls(), after_remove);
    assert!(engine.event_ids().is_empty());
    assert!(matches!(engine.snapshot("ev1"), Err(SyncError::UnknownEvent(_))));
}

#[tokio::test]
async fn shutdown_stops_every_timer() {
    let a = StubSource::with_guests(&["a@x.com"]);
    let b = StubSource::with_guests(&["b@x.com"]);
    let config = EngineConfig {
        refresh_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let engine = engine_with_config("ev1", a.clone(), config);
    engine.register("ev2", b.clone()).unwrap();
    engine.start("ev1").unwrap();
    engine.start("ev2").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    engine.shutdown();

    assert!(engine.statuses().iter().all(|s| !s.polling));
    tokio::time::sleep(Duration::from_millis(30)).await;
    let (ca, cb) = (a.calls(), b.calls());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!((a.calls(), b.calls()), (ca, cb));
}

#[tokio::test]
async fn refresh_outcomes_are_broadcast() {
    let source = StubSource::with_guests(&["a@x.com"]);
    let engine = engine_with("ev1", source.clone());
    let mut live = engine.subscribe();

    engine.refresh("ev1", DAY).await.unwrap();
    source.set_failing(true);
    let _ = engine.refresh("ev1", DAY).await;

    match live.recv().await.unwrap() {
        LiveEvent::SnapshotRefreshed { event_id, registered_count, .. } => {
            assert_eq!(event_id, "ev1");
            assert_eq!(registered_count, 1);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(live.recv().await.unwrap().kind(), "refresh_failed");
}

#[tokio::test]
async fn status_reports_source_and_counts() {
    let engine = engine_with("ev1", StubSource::with_guests(&["a@x.com", "b@x.com"]));
    engine.refresh("ev1", DAY).await.unwrap();

    let status = engine.status("ev1").unwrap();

    assert_eq!(status.source, "stub:stub-event");
    assert_eq!(status.registered_count, 2);
    assert!(status.last_updated.is_some());
    assert!(status.last_attempt.is_some());
    assert!(!status.polling);

    assert!(matches!(engine.status("nope"), Err(SyncError::UnknownEvent(_))));
}

#[tokio::test]
async fn abandoned_refresh_keeps_running_for_the_next_caller() {
    let source = StubSource::with_guests(&["a@x.com", "b@x.com"]);
    source.set_delay(Duration::from_millis(100));
    let engine = engine_with("ev1", source.clone());

    let abandoned = tokio::time::timeout(Duration::from_millis(20), engine.refresh("ev1", DAY)).await;
    assert!(abandoned.is_err());

    let view = engine.refresh("ev1", DAY).await.unwrap();

    assert_eq!(source.calls(), 1);
    assert_eq!(view.registered_count(), 2);
    assert_eq!(engine.snapshot("ev1").unwrap().len(), 2);
}
