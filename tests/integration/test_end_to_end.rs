//! Full pipeline: scan, tokio-timed trigger, fire, ledger.

use std::sync::Arc;

use chrono::{Duration, Utc};

use depart::{
    Coordinates, DepartureEngine, Event, EventSource, RouteEstimate, StaticEventSource,
    TokioScheduler, TravelMode,
};

use crate::support::{test_config, FakeProvider, RecordingNotifier};

#[tokio::test]
async fn test_trigger_fires_and_event_enters_ledger() {
    // Event close enough that the departure moment is already past, so
    // the trigger fires as soon as it is armed.
    let start = Utc::now() + Duration::minutes(5);
    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 900)),
    );
    let (scheduler, mut fired) = TokioScheduler::new();
    let scheduler = Arc::new(scheduler);
    let notifier = Arc::new(RecordingNotifier::new());
    let source: Arc<dyn EventSource> = Arc::new(StaticEventSource::new(vec![Event::new(
        "Dentist",
        start,
        "Main St 1",
    )]));

    let engine = DepartureEngine::new(
        test_config(),
        provider,
        source,
        Arc::clone(&scheduler) as _,
        Arc::clone(&notifier) as _,
    )
    .unwrap();
    engine.start();

    let summary = engine.scan(Coordinates::new(12.568, 55.676)).await.unwrap();
    assert_eq!(summary.scheduled, 1);

    let trigger = fired.recv().await.expect("trigger should fire");
    assert_eq!(trigger.payload.event_title, "Dentist");
    assert_eq!(trigger.payload.mode, TravelMode::Walking);
    engine.handle_fired(trigger.payload).await;

    assert_eq!(notifier.notified_titles(), vec!["Dentist"]);
    assert!(engine.registry().is_empty());
    assert_eq!(engine.ledger().len(), 1);

    // a later pass finds nothing to do
    let summary = engine.scan(Coordinates::new(12.6, 55.7)).await.unwrap();
    assert_eq!(summary.scheduled + summary.no_route, 0);
    assert_eq!(scheduler.armed_count(), 0);
}

#[tokio::test]
async fn test_movement_cancels_pending_tokio_trigger() {
    // Departure is far out, so the trigger stays pending until the move
    // replaces it.
    let start = Utc::now() + Duration::hours(1);
    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 900)),
    );
    let (scheduler, mut fired) = TokioScheduler::new();
    let scheduler = Arc::new(scheduler);
    let source: Arc<dyn EventSource> = Arc::new(StaticEventSource::new(vec![Event::new(
        "Dentist",
        start,
        "Main St 1",
    )]));

    let engine = DepartureEngine::new(
        test_config(),
        provider,
        source,
        Arc::clone(&scheduler) as _,
        Arc::new(RecordingNotifier::new()),
    )
    .unwrap();
    engine.start();

    engine.scan(Coordinates::new(12.568, 55.676)).await.unwrap();
    assert_eq!(scheduler.armed_count(), 1);

    engine.scan(Coordinates::new(12.6, 55.7)).await.unwrap();
    assert_eq!(scheduler.armed_count(), 1, "old trigger cancelled, new one armed");
    assert_eq!(engine.registry().len(), 1);
    assert!(fired.try_recv().is_err(), "nothing fired during the move");
}
