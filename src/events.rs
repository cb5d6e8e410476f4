//! Upcoming calendar events and the sources that supply them.
//!
//! The engine does not parse calendars itself; an [`EventSource`]
//! implementation hands it events with non-empty locations in a time
//! window. Two implementations ship with the crate: an in-memory
//! [`StaticEventSource`] and a TOML-file-backed [`FileEventSource`] for
//! driving the CLI.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use crate::config::ModePreferences;
use crate::error::{EventError, Result};

/// One upcoming calendar event with a free-text location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub title: String,
    pub start: DateTime<Utc>,
    /// Free-text location; rewritten before being used as a routing
    /// destination.
    pub location: String,
}

impl Event {
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Utc>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            start,
            location: location.into(),
        }
    }

    /// The identity of an event instance. Recurring events yield one key
    /// per occurrence since the start time differs.
    pub fn key(&self) -> EventKey {
        EventKey {
            title: self.title.clone(),
            start: self.start,
        }
    }
}

/// Event identity: (title, start time).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub title: String,
    pub start: DateTime<Utc>,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.title, self.start)
    }
}

/// The window of event start times one scan considers: far enough out
/// that the slowest enabled mode plus the forewarning lead and one scan
/// interval still leaves time to alert.
pub fn scan_window(
    now: DateTime<Utc>,
    prefs: &ModePreferences,
    forewarning: Duration,
    scan_interval: Duration,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let horizon = Duration::seconds(prefs.max_budget_secs()) + forewarning + scan_interval;
    (now, now + horizon)
}

/// Supplies upcoming events with non-empty locations.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Events starting within `[from, to]`, ordered by start time.
    /// Events whose location is empty are not returned.
    async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>>;
}

/// In-memory event source, useful for tests and embedding hosts that
/// push their own event lists.
#[derive(Default)]
pub struct StaticEventSource {
    events: RwLock<Vec<Event>>,
}

impl StaticEventSource {
    pub fn new(events: Vec<Event>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    /// Replace the event list wholesale.
    pub fn set_events(&self, events: Vec<Event>) {
        *self.events.write() = events;
    }
}

#[async_trait]
impl EventSource for StaticEventSource {
    async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self
            .events
            .read()
            .iter()
            .filter(|e| e.start >= from && e.start <= to)
            .filter(|e| !e.location.trim().is_empty())
            .cloned()
            .collect();
        events.sort_by(|a, b| a.start.cmp(&b.start));
        Ok(events)
    }
}

/// TOML file event source. The file is re-read on every scan so edits
/// take effect without a restart.
///
/// ```toml
/// [[event]]
/// title = "Dentist"
/// start = "2026-09-01T14:00:00Z"
/// location = "Tandlægehuset, Copenhagen"
/// ```
pub struct FileEventSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct EventFile {
    #[serde(default, rename = "event")]
    events: Vec<Event>,
}

impl FileEventSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventSource for FileEventSource {
    async fn events_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| EventError::Query(format!("{}: {}", self.path.display(), e)))?;
        let file: EventFile =
            toml::from_str(&content).map_err(|e| EventError::Parse(e.to_string()))?;
        debug!(
            "Read {} events from {}",
            file.events.len(),
            self.path.display()
        );

        let source = StaticEventSource::new(file.events);
        source.events_between(from, to).await
    }
}
