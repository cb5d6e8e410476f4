//! Configuration settings for the departure engine.

use crate::directions::TravelMode;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub modes: ModePreferences,
    pub rewrite: RewriteConfig,
    pub provider: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            modes: ModePreferences::default(),
            rewrite: RewriteConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("depart.toml"),
            dirs::config_dir()
                .map(|p| p.join("depart/config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".depart/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.engine.scan_interval_minutes == 0 {
            return Err(ConfigError::Invalid("scan_interval_minutes must be > 0".to_string()).into());
        }

        if self.modes.all_disabled() {
            tracing::warn!("All mode budgets are zero; no departure alarm will ever be set");
        }

        if self.provider.base_url.is_empty() {
            return Err(ConfigError::MissingField("provider.base_url".to_string()).into());
        }

        self.rewrite.validate()?;

        Ok(())
    }
}

impl FromStr for Config {
    type Err = crate::error::DepartError;

    fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }
}

/// Scan loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minutes between location refreshes; also the debounce unit for
    /// overlapping passes.
    pub scan_interval_minutes: u64,
    /// Lead time before the computed departure moment at which the user
    /// is alerted.
    pub forewarning_minutes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval_minutes: 5,
            forewarning_minutes: 10,
        }
    }
}

/// Per-mode travel-time budgets, in seconds. A zero budget disables the
/// mode entirely (no estimate is requested for it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModePreferences {
    pub driving_secs: i64,
    pub walking_secs: i64,
    pub bicycling_secs: i64,
    pub transit_secs: i64,
}

impl Default for ModePreferences {
    fn default() -> Self {
        // 30 minutes of walking, 2 hours of transit
        Self {
            driving_secs: 0,
            walking_secs: 30 * 60,
            bicycling_secs: 0,
            transit_secs: 2 * 60 * 60,
        }
    }
}

impl ModePreferences {
    /// The budget allotted to one mode.
    pub fn budget(&self, mode: TravelMode) -> i64 {
        match mode {
            TravelMode::Driving => self.driving_secs,
            TravelMode::Walking => self.walking_secs,
            TravelMode::Bicycling => self.bicycling_secs,
            TravelMode::Transit => self.transit_secs,
        }
    }

    /// Modes with a nonzero budget, in canonical order.
    pub fn enabled_modes(&self) -> Vec<TravelMode> {
        TravelMode::ALL
            .iter()
            .copied()
            .filter(|m| self.budget(*m) > 0)
            .collect()
    }

    pub fn all_disabled(&self) -> bool {
        self.enabled_modes().is_empty()
    }

    /// The largest budget across all modes; bounds the event scan window.
    pub fn max_budget_secs(&self) -> i64 {
        TravelMode::ALL
            .iter()
            .map(|m| self.budget(*m))
            .max()
            .unwrap_or(0)
    }
}

/// Location text rewrite rules.
///
/// Two `;`-delimited ordered lists: regex patterns and their replacement
/// strings. Pattern `i` is replaced with replacement `i`, or with the
/// empty string when the replacement list is shorter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub patterns: String,
    pub replacements: String,
}

impl RewriteConfig {
    /// Split the delimited lists into (pattern, replacement) pairs.
    pub fn rules(&self) -> Vec<(String, String)> {
        if self.patterns.is_empty() {
            return Vec::new();
        }
        let replacements: Vec<&str> = if self.replacements.is_empty() {
            Vec::new()
        } else {
            self.replacements.split(';').collect()
        };
        self.patterns
            .split(';')
            .enumerate()
            .map(|(i, p)| {
                let replacement = replacements.get(i).copied().unwrap_or("");
                (p.to_string(), replacement.to_string())
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for (pattern, _) in self.rules() {
            regex::Regex::new(&pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Directions provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the directions endpoint.
    pub base_url: String,
    /// API key passed with every request.
    pub api_key: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/directions/json".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}
