//! HTTP directions provider.
//!
//! Talks to a Google-Directions-compatible JSON endpoint. One request is
//! made per (origin, destination, mode) lookup; `ZERO_RESULTS` and
//! `NOT_FOUND` statuses collapse to `Ok(None)` rather than an error.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{DirectionsProvider, RouteEstimate, TravelMode};
use crate::config::ProviderConfig;
use crate::error::{DirectionsError, Result};
use crate::geo::Coordinates;

/// Directions client over a Google-Directions-style HTTP API.
pub struct HttpDirectionsProvider {
    config: ProviderConfig,
    /// Built lazily on first use, guarded so initialization runs once.
    client: OnceCell<Client>,
}

impl HttpDirectionsProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                if self.config.api_key.is_empty() {
                    warn!("Directions provider has no API key configured");
                }
                debug!("Initializing directions client for {}", self.config.base_url);
                Client::builder()
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()
                    .map_err(DirectionsError::Http)
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl DirectionsProvider for HttpDirectionsProvider {
    async fn ensure_initialized(&self) -> Result<()> {
        self.client().await.map(|_| ())
    }

    async fn route(
        &self,
        origin: &Coordinates,
        destination: &str,
        mode: TravelMode,
        arrive_by: Option<DateTime<Utc>>,
    ) -> Result<Option<RouteEstimate>> {
        let client = self.client().await?;

        let mut query: Vec<(&str, String)> = vec![
            ("origin", origin.to_string()),
            ("destination", destination.to_string()),
            ("mode", mode.as_str().to_string()),
            ("key", self.config.api_key.clone()),
        ];
        if let Some(deadline) = arrive_by {
            query.push(("arrival_time", deadline.timestamp().to_string()));
        }

        let response = client
            .get(&self.config.base_url)
            .query(&query)
            .send()
            .await
            .map_err(DirectionsError::Http)?
            .error_for_status()
            .map_err(DirectionsError::Http)?;

        let body: DirectionsResponse = response.json().await.map_err(DirectionsError::Http)?;

        match body.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" | "NOT_FOUND" => {
                debug!("No {} route to `{}`", mode, destination);
                return Ok(None);
            }
            status => {
                return Err(DirectionsError::Api {
                    status: status.to_string(),
                }
                .into());
            }
        }

        // A transit request can come back with walking-only routes;
        // those do not count as transit.
        if mode == TravelMode::Transit && !body.has_transit_step() {
            debug!("Found 0 transit routes to `{}`", destination);
            return Ok(None);
        }

        let Some(route) = body.routes.first() else {
            return Ok(None);
        };

        route.to_estimate(mode).map(Some)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<Route>,
}

impl DirectionsResponse {
    fn has_transit_step(&self) -> bool {
        self.routes.iter().any(|route| {
            route.legs.iter().any(|leg| {
                leg.steps
                    .iter()
                    .any(|step| step.travel_mode.eq_ignore_ascii_case("transit"))
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct Route {
    #[serde(default)]
    legs: Vec<Leg>,
}

impl Route {
    fn to_estimate(&self, mode: TravelMode) -> Result<RouteEstimate> {
        let total_duration_secs = self
            .legs
            .iter()
            .map(|leg| leg.duration.as_ref().map(|d| d.value).unwrap_or(0))
            .sum();

        let mut estimate = RouteEstimate::new(mode, total_duration_secs);

        if mode == TravelMode::Transit {
            let departure = self
                .legs
                .first()
                .and_then(|leg| leg.departure_time.as_ref())
                .map(|t| t.to_instant())
                .transpose()?;
            let arrival = self
                .legs
                .last()
                .and_then(|leg| leg.arrival_time.as_ref())
                .map(|t| t.to_instant())
                .transpose()?;
            if let (Some(departure), Some(arrival)) = (departure, arrival) {
                estimate = estimate.with_times(departure, arrival);
            }
        }

        Ok(estimate)
    }
}

#[derive(Debug, Deserialize)]
struct Leg {
    duration: Option<ValueField>,
    departure_time: Option<TimeField>,
    arrival_time: Option<TimeField>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct Step {
    #[serde(default)]
    travel_mode: String,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    value: i64,
}

/// Epoch-seconds timestamp as providers encode it.
#[derive(Debug, Deserialize)]
struct TimeField {
    value: i64,
}

impl TimeField {
    fn to_instant(&self) -> Result<DateTime<Utc>> {
        Utc.timestamp_opt(self.value, 0)
            .single()
            .ok_or_else(|| DirectionsError::Decode(format!("bad timestamp {}", self.value)).into())
    }
}
