//! Notification dispatch.
//!
//! When a trigger fires, the engine hands a [`DeparturePayload`] to a
//! [`Notifier`]. Rendering is the host's business; the crate ships a
//! [`LogNotifier`] that writes the alert to the log, which is enough for
//! the CLI and for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::directions::TravelMode;
use crate::error::Result;
use crate::events::EventKey;

/// Everything a dispatcher needs to render a "leave now" alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeparturePayload {
    pub event_title: String,
    pub event_start: DateTime<Utc>,
    /// The selected mode; `Walking` when no mode fit its budget.
    pub mode: TravelMode,
    /// Rewritten destination text, ready for a maps link.
    pub destination: String,
}

impl DeparturePayload {
    pub fn event_key(&self) -> EventKey {
        EventKey {
            title: self.event_title.clone(),
            start: self.event_start,
        }
    }

    /// Deep link opening turn-by-turn navigation for the selected mode.
    /// Transit has no navigation scheme, so it falls back to a plain
    /// place search.
    pub fn maps_link(&self) -> String {
        match self.mode {
            TravelMode::Transit => format!("geo:0,0?q={}", self.destination),
            mode => format!(
                "google.navigation:q={}&mode={}",
                self.destination,
                mode.maps_letter()
            ),
        }
    }
}

/// Renders the final user-facing alert.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &DeparturePayload) -> Result<()>;
}

/// Notifier that writes the alert to the operational log.
pub struct LogNotifier {
    forewarning_minutes: u64,
}

impl LogNotifier {
    pub fn new(forewarning_minutes: u64) -> Self {
        Self {
            forewarning_minutes,
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, payload: &DeparturePayload) -> Result<()> {
        info!(
            "{}: start {} in {} minutes ({})",
            payload.event_title,
            payload.mode,
            self.forewarning_minutes,
            payload.maps_link()
        );
        Ok(())
    }
}
