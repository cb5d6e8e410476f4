//! Depart: departure alarm scheduling engine.
//!
//! Reconciles the user's current position against upcoming calendar
//! events, estimates travel time per enabled transport mode, and arms a
//! precisely-timed "leave now" trigger per event, keeping the schedule
//! consistent as the user moves and events fire.

pub mod config;
pub mod directions;
pub mod engine;
pub mod error;
pub mod events;
pub mod geo;
pub mod notify;
pub mod registry;
pub mod rewrite;
pub mod scheduler;

pub use config::{Config, EngineConfig, ModePreferences, ProviderConfig, RewriteConfig};
pub use directions::{
    select_mode, DirectionsProvider, HttpDirectionsProvider, RouteEstimate, TravelMode,
};
pub use engine::{DepartureEngine, ScanSummary};
pub use error::{
    ConfigError, DepartError, DirectionsError, EventError, Result, SchedulerError,
};
pub use events::{Event, EventKey, EventSource, FileEventSource, StaticEventSource};
pub use geo::{CoarseCoordinates, Coordinates};
pub use notify::{DeparturePayload, LogNotifier, Notifier};
pub use registry::{AlarmEntry, AlarmKey, AlarmRegistry, NotifiedLedger};
pub use rewrite::LocationRewriter;
pub use scheduler::{FiredTrigger, TokioScheduler, TriggerHandle, TriggerScheduler};
