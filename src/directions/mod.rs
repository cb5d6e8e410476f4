//! Travel-time estimation.
//!
//! The engine asks a [`DirectionsProvider`] for one route per enabled
//! mode and feeds the estimates to [`select_mode`], which picks the mode
//! whose travel time fits inside the smallest configured budget.
//!
//! Route-not-found is a normal outcome, not an error: providers return
//! `Ok(None)` and the mode simply drops out of selection.

mod http;
mod selector;

pub use http::HttpDirectionsProvider;
pub use selector::select_mode;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::geo::Coordinates;

/// A transport mode the engine can plan for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Driving,
    Walking,
    Bicycling,
    Transit,
}

impl TravelMode {
    /// All modes, in the canonical order used for tie-breaking when two
    /// modes carry the same budget.
    pub const ALL: [TravelMode; 4] = [
        TravelMode::Bicycling,
        TravelMode::Driving,
        TravelMode::Transit,
        TravelMode::Walking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Bicycling => "bicycling",
            TravelMode::Transit => "transit",
        }
    }

    /// The single-letter mode code used in maps deep links.
    pub fn maps_letter(&self) -> char {
        match self {
            TravelMode::Bicycling => 'b',
            TravelMode::Driving => 'd',
            TravelMode::Walking => 'w',
            TravelMode::Transit => 't',
        }
    }
}

impl fmt::Display for TravelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One route estimate for a single (origin, destination, mode) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub mode: TravelMode,
    /// Door-to-door travel time in seconds.
    pub total_duration_secs: i64,
    /// Concrete departure instant; present for transit routes only.
    pub departure: Option<DateTime<Utc>>,
    /// Concrete arrival instant; present for transit routes only.
    pub arrival: Option<DateTime<Utc>>,
}

impl RouteEstimate {
    pub fn new(mode: TravelMode, total_duration_secs: i64) -> Self {
        Self {
            mode,
            total_duration_secs,
            departure: None,
            arrival: None,
        }
    }

    pub fn with_times(
        mut self,
        departure: DateTime<Utc>,
        arrival: DateTime<Utc>,
    ) -> Self {
        self.departure = Some(departure);
        self.arrival = Some(arrival);
        self
    }
}

/// Computes travel time for one (origin, destination, mode) triple.
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    /// Make the provider ready for use. Called once before the first
    /// lookup of a scan; cheap when already initialized.
    async fn ensure_initialized(&self) -> Result<()>;

    /// Look up one route. `arrive_by` is set for transit lookups so the
    /// provider can plan backwards from the event start.
    ///
    /// `Ok(None)` means no usable route exists for this mode; for
    /// transit that includes routes containing no actual transit leg.
    async fn route(
        &self,
        origin: &Coordinates,
        destination: &str,
        mode: TravelMode,
        arrive_by: Option<DateTime<Utc>>,
    ) -> Result<Option<RouteEstimate>>;
}
