//! The departure engine: one reconciliation pass per location refresh.
//!
//! On each scan the engine loads upcoming events, drops the ones already
//! notified, and processes the rest as independent concurrent tasks:
//! rewrite the location text, estimate travel time per enabled mode, pick
//! a mode, cancel any alarm the event holds under an old location, and
//! arm a trigger at the computed departure moment. When a trigger fires
//! the notification is dispatched and the event enters the dedup ledger
//! for good.
//!
//! A failure inside one event task is logged and never aborts siblings;
//! the pass as a whole cannot fail because of event tasks.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ModePreferences};
use crate::directions::{select_mode, DirectionsProvider, RouteEstimate, TravelMode};
use crate::error::{Result, SchedulerError};
use crate::events::{scan_window, Event, EventSource};
use crate::geo::{CoarseCoordinates, Coordinates};
use crate::notify::{DeparturePayload, Notifier};
use crate::registry::{AlarmEntry, AlarmKey, AlarmRegistry, NotifiedLedger};
use crate::rewrite::LocationRewriter;
use crate::scheduler::{TriggerHandle, TriggerScheduler};

/// What happened to one event during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventDisposition {
    /// A route was found and a departure trigger armed.
    Scheduled(TravelMode),
    /// No mode fit its budget; the fallback trigger was armed.
    NoRoute,
    /// This (location, event) pair already holds a trigger.
    AlreadySeen,
    /// Location text rewrote to nothing; retried next scan.
    EmptyDestination,
}

/// Outcome counts for one coordination pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// False when the pass was skipped (engine stopped or debounced).
    pub ran: bool,
    /// Events inside the scan window, before ledger filtering.
    pub events_seen: usize,
    /// Tasks that armed a routed departure trigger.
    pub scheduled: usize,
    /// Tasks that armed the no-route fallback trigger.
    pub no_route: usize,
    /// Tasks short-circuited by an existing registry entry or an empty
    /// destination.
    pub skipped: usize,
    /// Tasks that failed; logged, never fatal to the pass.
    pub failed: usize,
}

impl ScanSummary {
    fn skipped_pass() -> Self {
        Self::default()
    }
}

/// Shared state handed to every per-event task of one pass.
struct ScanContext {
    coarse: CoarseCoordinates,
    precise: Coordinates,
    prefs: ModePreferences,
    forewarning: Duration,
    rewriter: Arc<LocationRewriter>,
    provider: Arc<dyn DirectionsProvider>,
    scheduler: Arc<dyn TriggerScheduler>,
    registry: Arc<AlarmRegistry>,
}

/// The departure alarm scheduling engine.
///
/// One instance lives for the whole process. Collaborators are injected;
/// the alarm registry and dedup ledger are owned here and shared with
/// the per-event tasks of each scan.
pub struct DepartureEngine {
    config: Config,
    rewriter: Arc<LocationRewriter>,
    provider: Arc<dyn DirectionsProvider>,
    events: Arc<dyn EventSource>,
    scheduler: Arc<dyn TriggerScheduler>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<AlarmRegistry>,
    ledger: Arc<NotifiedLedger>,
    last_scan: Mutex<Option<DateTime<Utc>>>,
    running: AtomicBool,
}

impl DepartureEngine {
    /// Build an engine from configuration and injected collaborators.
    /// Fails if the configured rewrite patterns do not compile.
    pub fn new(
        config: Config,
        provider: Arc<dyn DirectionsProvider>,
        events: Arc<dyn EventSource>,
        scheduler: Arc<dyn TriggerScheduler>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let rewriter = Arc::new(LocationRewriter::from_config(&config.rewrite)?);
        Ok(Self {
            config,
            rewriter,
            provider,
            events,
            scheduler,
            notifier,
            registry: Arc::new(AlarmRegistry::new()),
            ledger: Arc::new(NotifiedLedger::new()),
            last_scan: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Begin accepting scans. Called once by the embedding host.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        info!(
            "Departure engine started (scan interval {}m, forewarning {}m)",
            self.config.engine.scan_interval_minutes, self.config.engine.forewarning_minutes
        );
    }

    /// Stop accepting scans. Armed triggers stay with the scheduler.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("Departure engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &AlarmRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &NotifiedLedger {
        &self.ledger
    }

    /// Run one coordination pass for a fresh location sample.
    ///
    /// A pass that starts within two scan intervals of the previous pass
    /// is skipped outright; that debounce is what prevents overlapping
    /// passes, not a lock.
    pub async fn scan(&self, precise: Coordinates) -> Result<ScanSummary> {
        if !self.is_running() {
            debug!("Scan requested while engine is stopped");
            return Ok(ScanSummary::skipped_pass());
        }

        let now = Utc::now();
        let debounce =
            Duration::minutes(2 * self.config.engine.scan_interval_minutes as i64);
        {
            let mut last = self.last_scan.lock();
            if let Some(prev) = *last {
                if now - prev < debounce {
                    debug!("Scan debounced; previous pass started {}", prev);
                    return Ok(ScanSummary::skipped_pass());
                }
            }
            *last = Some(now);
        }

        let coarse = precise.coarse();
        let prefs = self.config.modes;
        let forewarning = Duration::minutes(self.config.engine.forewarning_minutes as i64);
        let scan_interval =
            Duration::minutes(self.config.engine.scan_interval_minutes as i64);

        let (from, to) = scan_window(now, &prefs, forewarning, scan_interval);
        let events = self.events.events_between(from, to).await?;
        debug!("Scan at {}: {} events in window", coarse, events.len());

        let mut summary = ScanSummary {
            ran: true,
            events_seen: events.len(),
            ..Default::default()
        };

        let pending: Vec<Event> = events
            .into_iter()
            .filter(|e| !self.ledger.contains(&e.key()))
            .collect();
        if pending.is_empty() {
            return Ok(summary);
        }

        self.provider.ensure_initialized().await?;

        let ctx = Arc::new(ScanContext {
            coarse,
            precise,
            prefs,
            forewarning,
            rewriter: Arc::clone(&self.rewriter),
            provider: Arc::clone(&self.provider),
            scheduler: Arc::clone(&self.scheduler),
            registry: Arc::clone(&self.registry),
        });

        // Travel-time lookups dominate latency, so events run as
        // independent concurrent tasks.
        let mut tasks = Vec::with_capacity(pending.len());
        for event in pending {
            let title = event.title.clone();
            let ctx = Arc::clone(&ctx);
            tasks.push((title, tokio::spawn(process_event(ctx, event))));
        }

        for (title, task) in tasks {
            match task.await {
                Ok(Ok(EventDisposition::Scheduled(mode))) => {
                    debug!("Scheduled {} via {}", title, mode);
                    summary.scheduled += 1;
                }
                Ok(Ok(EventDisposition::NoRoute)) => {
                    debug!("No route for {}; fallback trigger armed", title);
                    summary.no_route += 1;
                }
                Ok(Ok(EventDisposition::AlreadySeen | EventDisposition::EmptyDestination)) => {
                    summary.skipped += 1;
                }
                Ok(Err(e)) => {
                    warn!("Event task for {} failed: {}", title, e);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Event task for {} panicked: {}", title, e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Scan complete: {} scheduled, {} no-route, {} skipped, {} failed",
            summary.scheduled, summary.no_route, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Handle a fired trigger: dispatch the notification, drop every
    /// registry record for the event, and ledger it so no later pass can
    /// reschedule it.
    pub async fn handle_fired(&self, payload: DeparturePayload) {
        info!("Departure trigger fired for {}", payload.event_title);
        if let Err(e) = self.notifier.notify(&payload).await {
            warn!("Notification dispatch failed for {}: {}", payload.event_title, e);
        }

        let key = payload.event_key();
        for handle in self.registry.remove_event(&key) {
            self.scheduler.cancel(handle).await;
        }
        self.ledger.insert(key);
    }
}

/// Process one event within a scan. Runs as its own task; any error is
/// caught and logged by the pass.
async fn process_event(ctx: Arc<ScanContext>, event: Event) -> Result<EventDisposition> {
    let destination = ctx.rewriter.rewrite(&event.location);
    if destination.trim().is_empty() {
        debug!(
            "Location for {} rewrote to nothing; skipping this scan",
            event.title
        );
        return Ok(EventDisposition::EmptyDestination);
    }

    let key = AlarmKey {
        location: ctx.coarse,
        event: event.key(),
    };
    if ctx.registry.contains(&key) {
        debug!("Alarm already present for {} at {}", event.title, ctx.coarse);
        return Ok(EventDisposition::AlreadySeen);
    }

    let mut estimates: HashMap<TravelMode, RouteEstimate> = HashMap::new();
    for mode in ctx.prefs.enabled_modes() {
        let arrive_by = (mode == TravelMode::Transit).then_some(event.start);
        if let Some(estimate) = ctx
            .provider
            .route(&ctx.precise, &destination, mode, arrive_by)
            .await?
        {
            debug!(
                "{} to `{}`: {}s",
                mode, destination, estimate.total_duration_secs
            );
            estimates.insert(mode, estimate);
        }
    }

    let selected = select_mode(&ctx.prefs, &estimates);

    // The user moved: whatever trigger this event held under another
    // location is now stale. Cancel before installing the replacement so
    // at most one live trigger exists at any time.
    for handle in ctx.registry.take_stale(&event.key(), &ctx.coarse) {
        ctx.scheduler.cancel(handle).await;
    }

    let at = trigger_time(selected.as_ref(), event.start, ctx.forewarning);
    let payload = DeparturePayload {
        event_title: event.title.clone(),
        event_start: event.start,
        mode: selected
            .as_ref()
            .map(|e| e.mode)
            .unwrap_or(TravelMode::Walking),
        destination,
    };
    let handle = arm_with_fallback(ctx.scheduler.as_ref(), at, payload).await?;

    let (entry, disposition) = match selected {
        Some(estimate) => (
            AlarmEntry::Routed {
                handle,
                mode: estimate.mode,
            },
            EventDisposition::Scheduled(estimate.mode),
        ),
        None => (
            AlarmEntry::NoRouteFound { handle },
            EventDisposition::NoRoute,
        ),
    };
    if let Some(replaced) = ctx.registry.insert(key, entry) {
        // Duplicate event in one pass; the earlier trigger loses.
        ctx.scheduler.cancel(replaced.handle()).await;
    }

    Ok(disposition)
}

/// The absolute instant at which the departure alert should fire.
fn trigger_time(
    selected: Option<&RouteEstimate>,
    event_start: DateTime<Utc>,
    forewarning: Duration,
) -> DateTime<Utc> {
    match selected {
        None => event_start - forewarning,
        Some(estimate) => match estimate.departure {
            Some(departure) => departure - forewarning,
            None => {
                event_start - Duration::seconds(estimate.total_duration_secs) - forewarning
            }
        },
    }
}

/// Arm a trigger exactly; when the platform refuses exact scheduling,
/// degrade to best-effort at the same instant.
async fn arm_with_fallback(
    scheduler: &dyn TriggerScheduler,
    at: DateTime<Utc>,
    payload: DeparturePayload,
) -> Result<TriggerHandle> {
    match scheduler.arm(at, true, payload.clone()).await {
        Ok(handle) => Ok(handle),
        Err(SchedulerError::PermissionDenied) => {
            warn!(
                "Exact scheduling denied; arming best-effort trigger for {}",
                payload.event_title
            );
            scheduler.arm(at, false, payload).await.map_err(Into::into)
        }
        Err(e) => Err(e.into()),
    }
}
