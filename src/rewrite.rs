//! Location text rewriting.
//!
//! Calendar locations are free text and often carry boilerplate a routing
//! provider cannot resolve ("Room 214, Building C, ..."). The rewriter
//! applies user-configured regex substitutions, in order, to turn the
//! calendar text into something geocodable. An event whose location is
//! empty after rewriting is skipped for the scan but not marked notified,
//! so it is retried once the user fixes the rules.

use regex::Regex;

use crate::config::RewriteConfig;
use crate::error::{ConfigError, Result};

/// Ordered regex substitutions applied to event location text.
pub struct LocationRewriter {
    rules: Vec<(Regex, String)>,
}

impl LocationRewriter {
    /// Compile rules from configuration. Fails if any pattern is not a
    /// valid regex.
    pub fn from_config(config: &RewriteConfig) -> Result<Self> {
        let mut rules = Vec::new();
        for (pattern, replacement) in config.rules() {
            let regex = Regex::new(&pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            rules.push((regex, replacement));
        }
        Ok(Self { rules })
    }

    /// A rewriter with no rules; passes text through unchanged.
    pub fn passthrough() -> Self {
        Self { rules: Vec::new() }
    }

    /// Apply every rule in order, replacing all occurrences of each
    /// pattern with its paired replacement.
    pub fn rewrite(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (regex, replacement) in &self.rules {
            result = regex.replace_all(&result, replacement.as_str()).into_owned();
        }
        result
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
