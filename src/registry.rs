//! Alarm registry and notification dedup ledger.
//!
//! Both structures are owned by the engine and shared across the
//! concurrent per-event tasks of a scan, so every access goes through a
//! lock. The registry holds at most one live trigger per event, keyed by
//! the event's current best-known coarse location; the ledger records
//! events whose final notification already fired and must never be
//! rescheduled.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::directions::TravelMode;
use crate::events::EventKey;
use crate::geo::CoarseCoordinates;
use crate::scheduler::TriggerHandle;

/// Registry key: where the user was when the alarm was computed, and
/// which event it serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlarmKey {
    pub location: CoarseCoordinates,
    pub event: EventKey,
}

/// A scheduled trigger, or the record of a lookup that found no route.
///
/// Both variants carry the armed trigger handle: the no-route case still
/// arms a fallback trigger at `event start − forewarning`, and that
/// trigger must be cancellable when the user moves. The variant itself
/// marks "looked up, nothing usable" so the estimator is not asked again
/// from the same location.
#[derive(Debug, Clone)]
pub enum AlarmEntry {
    /// A route was found and a departure trigger armed.
    Routed {
        handle: TriggerHandle,
        mode: TravelMode,
    },
    /// No mode fit its budget; a fallback trigger is armed instead.
    NoRouteFound { handle: TriggerHandle },
}

impl AlarmEntry {
    pub fn handle(&self) -> TriggerHandle {
        match self {
            AlarmEntry::Routed { handle, .. } => *handle,
            AlarmEntry::NoRouteFound { handle } => *handle,
        }
    }
}

/// Map from (coarse location, event) to its scheduled trigger.
#[derive(Default)]
pub struct AlarmRegistry {
    alarms: Mutex<HashMap<AlarmKey, AlarmEntry>>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this exact (location, event) pair was already handled.
    /// A `NoRouteFound` entry counts: the lookup happened, repeating it
    /// from the same spot would return the same nothing.
    pub fn contains(&self, key: &AlarmKey) -> bool {
        self.alarms.lock().contains_key(key)
    }

    /// Install the record for a key, returning the entry it replaced, if
    /// any.
    pub fn insert(&self, key: AlarmKey, entry: AlarmEntry) -> Option<AlarmEntry> {
        self.alarms.lock().insert(key, entry)
    }

    /// Remove every record for `event` under a location other than
    /// `current`, returning their trigger handles for cancellation. Used
    /// when the user has moved: the old location's alarm is stale.
    pub fn take_stale(
        &self,
        event: &EventKey,
        current: &CoarseCoordinates,
    ) -> Vec<TriggerHandle> {
        let mut alarms = self.alarms.lock();
        let stale: Vec<AlarmKey> = alarms
            .keys()
            .filter(|k| &k.event == event && &k.location != current)
            .cloned()
            .collect();
        stale
            .into_iter()
            .filter_map(|k| {
                debug!("Dropping stale alarm for {} at {}", k.event, k.location);
                alarms.remove(&k).map(|entry| entry.handle())
            })
            .collect()
    }

    /// Remove every record for `event` regardless of location, returning
    /// the trigger handles. Called when the event's notification fired.
    pub fn remove_event(&self, event: &EventKey) -> Vec<TriggerHandle> {
        let mut alarms = self.alarms.lock();
        let keys: Vec<AlarmKey> = alarms
            .keys()
            .filter(|k| &k.event == event)
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|k| alarms.remove(&k).map(|entry| entry.handle()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.alarms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.lock().is_empty()
    }
}

/// Events whose final notification has fired. Once present, an event is
/// never rescheduled; entries are never removed because an event
/// instance's (title, start) never recurs.
#[derive(Default)]
pub struct NotifiedLedger {
    seen: Mutex<HashSet<EventKey>>,
}

impl NotifiedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.seen.lock().contains(key)
    }

    /// Returns false when the event was already recorded.
    pub fn insert(&self, key: EventKey) -> bool {
        self.seen.lock().insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }
}
