//! Error types for the departure engine.

use thiserror::Error;

/// Main error type for departure engine operations.
#[derive(Error, Debug)]
pub enum DepartError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Directions error: {0}")]
    Directions(#[from] DirectionsError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Event source error: {0}")]
    Events(#[from] EventError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid rewrite pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Directions-provider errors.
///
/// A route that simply does not exist is not an error; providers return
/// `Ok(None)` for that. These variants cover transport and protocol
/// failures only.
#[derive(Error, Debug)]
pub enum DirectionsError {
    #[error("Directions provider is not initialized")]
    Uninitialized,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected request: {status}")]
    Api { status: String },

    #[error("Malformed provider response: {0}")]
    Decode(String),
}

/// Trigger-scheduler errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Exact scheduling permission denied")]
    PermissionDenied,

    #[error("Scheduler is shut down")]
    Shutdown,

    #[error("Failed to arm trigger: {0}")]
    Arm(String),
}

/// Event-source errors.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Failed to query events: {0}")]
    Query(String),

    #[error("Failed to parse event data: {0}")]
    Parse(String),
}

/// Result type alias for departure engine operations.
pub type Result<T> = std::result::Result<T, DepartError>;
