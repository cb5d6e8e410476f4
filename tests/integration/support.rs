//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use depart::{
    Config, Coordinates, DeparturePayload, DirectionsError, DirectionsProvider, Notifier,
    Result, RouteEstimate, SchedulerError, TravelMode, TriggerHandle, TriggerScheduler,
};

/// Directions provider backed by a fixed (destination, mode) route table.
#[derive(Default)]
pub struct FakeProvider {
    routes: Mutex<HashMap<(String, TravelMode), RouteEstimate>>,
    failing: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(self, destination: &str, estimate: RouteEstimate) -> Self {
        self.routes
            .lock()
            .insert((destination.to_string(), estimate.mode), estimate);
        self
    }

    /// Make every lookup for this destination fail with a provider error.
    pub fn failing_for(self, destination: &str) -> Self {
        self.failing.lock().push(destination.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectionsProvider for FakeProvider {
    async fn ensure_initialized(&self) -> Result<()> {
        Ok(())
    }

    async fn route(
        &self,
        _origin: &Coordinates,
        destination: &str,
        mode: TravelMode,
        _arrive_by: Option<DateTime<Utc>>,
    ) -> Result<Option<RouteEstimate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().iter().any(|d| d == destination) {
            return Err(DirectionsError::Api {
                status: "UNKNOWN_ERROR".to_string(),
            }
            .into());
        }
        Ok(self
            .routes
            .lock()
            .get(&(destination.to_string(), mode))
            .cloned())
    }
}

/// One successful arm call.
#[derive(Debug, Clone)]
pub struct ArmedTrigger {
    pub handle: TriggerHandle,
    pub at: DateTime<Utc>,
    pub exact: bool,
    pub payload: DeparturePayload,
}

/// Scheduler that records arms and cancels instead of firing anything.
#[derive(Default)]
pub struct RecordingScheduler {
    next_id: AtomicU64,
    pub armed: Mutex<Vec<ArmedTrigger>>,
    pub cancelled: Mutex<Vec<TriggerHandle>>,
    pub deny_exact: bool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying_exact() -> Self {
        Self {
            deny_exact: true,
            ..Self::default()
        }
    }

    /// Handles that were armed and not cancelled.
    pub fn live_handles(&self) -> Vec<TriggerHandle> {
        let cancelled = self.cancelled.lock();
        self.armed
            .lock()
            .iter()
            .map(|t| t.handle)
            .filter(|h| !cancelled.contains(h))
            .collect()
    }

    pub fn armed_count(&self) -> usize {
        self.armed.lock().len()
    }
}

#[async_trait]
impl TriggerScheduler for RecordingScheduler {
    async fn arm(
        &self,
        at: DateTime<Utc>,
        exact: bool,
        payload: DeparturePayload,
    ) -> std::result::Result<TriggerHandle, SchedulerError> {
        if exact && self.deny_exact {
            return Err(SchedulerError::PermissionDenied);
        }
        let handle = TriggerHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.armed.lock().push(ArmedTrigger {
            handle,
            at,
            exact,
            payload,
        });
        Ok(handle)
    }

    async fn cancel(&self, handle: TriggerHandle) {
        self.cancelled.lock().push(handle);
    }
}

/// Notifier that collects dispatched payloads.
#[derive(Default)]
pub struct RecordingNotifier {
    pub payloads: Mutex<Vec<DeparturePayload>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified_titles(&self) -> Vec<String> {
        self.payloads
            .lock()
            .iter()
            .map(|p| p.event_title.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, payload: &DeparturePayload) -> Result<()> {
        self.payloads.lock().push(payload.clone());
        Ok(())
    }
}

/// Test config: walking and transit enabled, 10 minute forewarning.
/// The zero scan interval turns off debouncing so tests can run
/// back-to-back passes.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.engine.scan_interval_minutes = 0;
    config.engine.forewarning_minutes = 10;
    config
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
