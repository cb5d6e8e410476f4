//! Reconciliation-pass tests against recording fakes.

use std::sync::Arc;

use chrono::{Duration, Utc};

use depart::{
    Config, Coordinates, DepartureEngine, Event, EventSource, RouteEstimate, StaticEventSource,
    TravelMode,
};

use crate::support::{
    test_config, FakeProvider, RecordingNotifier, RecordingScheduler,
};

const HOME: Coordinates = Coordinates {
    longitude: 12.568,
    latitude: 55.676,
};
const OFFICE: Coordinates = Coordinates {
    longitude: 12.6,
    latitude: 55.7,
};

fn engine_with(
    config: Config,
    provider: Arc<FakeProvider>,
    scheduler: Arc<RecordingScheduler>,
    notifier: Arc<RecordingNotifier>,
    events: Vec<Event>,
) -> DepartureEngine {
    let source: Arc<dyn EventSource> = Arc::new(StaticEventSource::new(events));
    let engine =
        DepartureEngine::new(config, provider, source, scheduler, notifier).unwrap();
    engine.start();
    engine
}

#[tokio::test]
async fn test_schedules_tightest_feasible_mode() {
    let start = Utc::now() + Duration::hours(1);
    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 1500))
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Transit, 5000)),
    );
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(
        test_config(),
        Arc::clone(&provider),
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![Event::new("Dentist", start, "Main St 1")],
    );

    let summary = engine.scan(HOME).await.unwrap();
    assert_eq!(summary.scheduled, 1);
    assert_eq!(summary.failed, 0);

    let armed = scheduler.armed.lock().clone();
    assert_eq!(armed.len(), 1);
    // walking (budget 1800) beats transit (budget 7200) even though both fit
    assert_eq!(armed[0].payload.mode, TravelMode::Walking);
    assert_eq!(armed[0].at, start - Duration::seconds(1500) - Duration::minutes(10));
    assert!(armed[0].exact);
    assert_eq!(engine.registry().len(), 1);
}

#[tokio::test]
async fn test_rescan_from_same_location_is_idempotent() {
    let start = Utc::now() + Duration::hours(1);
    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 1500)),
    );
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(
        test_config(),
        Arc::clone(&provider),
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![Event::new("Dentist", start, "Main St 1")],
    );

    engine.scan(HOME).await.unwrap();
    let calls_after_first = provider.call_count();
    let summary = engine.scan(HOME).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.scheduled, 0);
    assert_eq!(scheduler.armed_count(), 1, "no duplicate trigger");
    assert_eq!(
        provider.call_count(),
        calls_after_first,
        "registry hit short-circuits before the estimator"
    );
}

#[tokio::test]
async fn test_movement_leaves_exactly_one_live_trigger() {
    let start = Utc::now() + Duration::hours(1);
    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 1500)),
    );
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(
        test_config(),
        Arc::clone(&provider),
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![Event::new("Dentist", start, "Main St 1")],
    );

    engine.scan(HOME).await.unwrap();
    engine.scan(OFFICE).await.unwrap();

    let first_handle = scheduler.armed.lock()[0].handle;
    assert_eq!(scheduler.armed_count(), 2);
    assert!(scheduler.cancelled.lock().contains(&first_handle));
    assert_eq!(scheduler.live_handles().len(), 1);
    assert_eq!(engine.registry().len(), 1);
}

#[tokio::test]
async fn test_fired_event_is_never_rescheduled() {
    let start = Utc::now() + Duration::hours(1);
    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 1500)),
    );
    let scheduler = Arc::new(RecordingScheduler::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let engine = engine_with(
        test_config(),
        Arc::clone(&provider),
        Arc::clone(&scheduler),
        Arc::clone(&notifier),
        vec![Event::new("Dentist", start, "Main St 1")],
    );

    engine.scan(HOME).await.unwrap();
    let payload = scheduler.armed.lock()[0].payload.clone();
    engine.handle_fired(payload).await;

    assert_eq!(notifier.notified_titles(), vec!["Dentist"]);
    assert!(engine.registry().is_empty());
    assert_eq!(engine.ledger().len(), 1);

    // even from a new location, the event stays dead
    let summary = engine.scan(OFFICE).await.unwrap();
    assert_eq!(summary.scheduled + summary.no_route, 0);
    assert_eq!(scheduler.armed_count(), 1);
}

#[tokio::test]
async fn test_no_route_arms_fallback_trigger() {
    let start = Utc::now() + Duration::hours(1);
    let provider = Arc::new(FakeProvider::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(
        test_config(),
        Arc::clone(&provider),
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![Event::new("Dentist", start, "Main St 1")],
    );

    let summary = engine.scan(HOME).await.unwrap();
    assert_eq!(summary.no_route, 1);

    let armed = scheduler.armed.lock().clone();
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].at, start - Duration::minutes(10));
    // payload defaults to walking when nothing was selected
    assert_eq!(armed[0].payload.mode, TravelMode::Walking);
    // the sentinel suppresses a second lookup from the same spot
    let calls = provider.call_count();
    engine.scan(HOME).await.unwrap();
    assert_eq!(provider.call_count(), calls);
}

#[tokio::test]
async fn test_transit_departure_time_drives_trigger() {
    let start = Utc::now() + Duration::hours(1);
    let departure = start - Duration::seconds(5000);
    let arrival = start - Duration::seconds(120);
    let provider = Arc::new(
        FakeProvider::new()
            // walking exists but blows its 1800s budget
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 2500))
            .with_route(
                "Main St 1",
                RouteEstimate::new(TravelMode::Transit, 4880).with_times(departure, arrival),
            ),
    );
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(
        test_config(),
        provider,
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![Event::new("Dentist", start, "Main St 1")],
    );

    engine.scan(HOME).await.unwrap();

    let armed = scheduler.armed.lock().clone();
    assert_eq!(armed.len(), 1);
    assert_eq!(armed[0].payload.mode, TravelMode::Transit);
    assert_eq!(armed[0].at, departure - Duration::minutes(10));
}

#[tokio::test]
async fn test_exact_denial_degrades_to_best_effort() {
    let start = Utc::now() + Duration::hours(1);
    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 1500)),
    );
    let scheduler = Arc::new(RecordingScheduler::denying_exact());
    let engine = engine_with(
        test_config(),
        provider,
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![Event::new("Dentist", start, "Main St 1")],
    );

    let summary = engine.scan(HOME).await.unwrap();
    assert_eq!(summary.scheduled, 1, "denial is recoverable");

    let armed = scheduler.armed.lock().clone();
    assert_eq!(armed.len(), 1);
    assert!(!armed[0].exact);
    assert_eq!(armed[0].at, start - Duration::seconds(1500) - Duration::minutes(10));
}

#[tokio::test]
async fn test_empty_destination_skips_without_ledgering() {
    let start = Utc::now() + Duration::hours(1);
    let mut config = test_config();
    config.rewrite.patterns = ".*".to_string();

    let provider = Arc::new(FakeProvider::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(
        config,
        Arc::clone(&provider),
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![Event::new("Dentist", start, "Room 42")],
    );

    let summary = engine.scan(HOME).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(provider.call_count(), 0);
    assert_eq!(scheduler.armed_count(), 0);
    assert!(engine.registry().is_empty());
    assert_eq!(engine.ledger().len(), 0, "not marked notified");

    // still retried on the next pass
    let summary = engine.scan(HOME).await.unwrap();
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_one_failing_event_does_not_abort_siblings() {
    let start = Utc::now() + Duration::hours(1);
    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 1500))
            .failing_for("Bad Address"),
    );
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(
        test_config(),
        provider,
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![
            Event::new("Dentist", start, "Main St 1"),
            Event::new("Broken", start + Duration::minutes(5), "Bad Address"),
        ],
    );

    let summary = engine.scan(HOME).await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.scheduled, 1);
    assert_eq!(scheduler.armed_count(), 1);
}

#[tokio::test]
async fn test_stopped_engine_ignores_scans() {
    let provider = Arc::new(FakeProvider::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let source: Arc<dyn EventSource> = Arc::new(StaticEventSource::new(vec![Event::new(
        "Dentist",
        Utc::now() + Duration::hours(1),
        "Main St 1",
    )]));
    let engine = DepartureEngine::new(
        test_config(),
        Arc::clone(&provider) as _,
        source,
        Arc::clone(&scheduler) as _,
        Arc::new(RecordingNotifier::new()),
    )
    .unwrap();

    let summary = engine.scan(HOME).await.unwrap();
    assert!(!summary.ran);
    assert_eq!(provider.call_count(), 0);

    engine.start();
    let summary = engine.scan(HOME).await.unwrap();
    assert!(summary.ran);

    engine.stop();
    let summary = engine.scan(OFFICE).await.unwrap();
    assert!(!summary.ran);
}

#[tokio::test]
async fn test_back_to_back_passes_are_debounced() {
    let mut config = test_config();
    config.engine.scan_interval_minutes = 5;

    let provider = Arc::new(
        FakeProvider::new()
            .with_route("Main St 1", RouteEstimate::new(TravelMode::Walking, 1500)),
    );
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = engine_with(
        config,
        provider,
        Arc::clone(&scheduler),
        Arc::new(RecordingNotifier::new()),
        vec![Event::new("Dentist", Utc::now() + Duration::hours(1), "Main St 1")],
    );

    let first = engine.scan(HOME).await.unwrap();
    assert!(first.ran);

    let second = engine.scan(OFFICE).await.unwrap();
    assert!(!second.ran, "pass within two scan intervals is skipped");
    assert_eq!(scheduler.armed_count(), 1);
}
