//! Configuration loading and representation.

use std::str::FromStr;

pub const MAX_COMMIT_ATTEMPTS_VAR: &str = "FIELDSTOCK_MAX_COMMIT_ATTEMPTS";
pub const EVENT_BUS_ENABLED_VAR: &str = "FIELDSTOCK_EVENT_BUS_ENABLED";

/// Runtime settings for the fulfillment core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FulfillmentConfig {
    /// How many times a unit of work is run before a version conflict is
    /// reported to the caller. Always at least 1.
    pub max_commit_attempts: u32,
    /// Publish committed events on the event bus.
    pub event_bus_enabled: bool,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 8,
            event_bus_enabled: true,
        }
    }
}

impl FulfillmentConfig {
    /// Load from process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests, embedded callers).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_commit_attempts =
            parse_var::<u32>(&lookup, MAX_COMMIT_ATTEMPTS_VAR).unwrap_or(defaults.max_commit_attempts);
        let event_bus_enabled =
            parse_flag(&lookup, EVENT_BUS_ENABLED_VAR).unwrap_or(defaults.event_bus_enabled);

        Self {
            max_commit_attempts: max_commit_attempts.max(1),
            event_bus_enabled,
        }
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    pub fn with_event_bus(mut self, enabled: bool) -> Self {
        self.event_bus_enabled = enabled;
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(variable = key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<bool> {
    let raw = lookup(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(variable = key, value = %raw, "ignoring unparsable configuration flag");
            None
        }
    }
}
