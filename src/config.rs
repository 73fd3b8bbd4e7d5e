//! # Global runtime configuration.
//!
//! [`Config`] defines the scheduler's behavior: shutdown drain timeout, status
//! monitor cadence, event bus capacity, coordination mirroring, and the
//! include/exclude filters applied when loading task descriptors.
//!
//! Values can be set directly or resolved from property files with
//! [`Config::from_props`]. Property resolution follows the registration
//! contract: when several property files define the same key, the last
//! non-blank value wins.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use taskherd::Config;
//!
//! let mut cfg = Config::default();
//! cfg.shutdown_timeout = Duration::from_secs(30);
//! cfg.coordination = true;
//!
//! assert!(cfg.coordination);
//! ```

use std::collections::HashMap;
use std::time::Duration;

use crate::error::SchedulerError;

/// Ordered set of property files, earliest loaded first.
///
/// Each entry is one file's key/value pairs. Resolution scans all entries in
/// order and keeps the last non-blank value for a key.
pub type Properties = Vec<HashMap<String, String>>;

/// Property key for the shutdown drain timeout, in milliseconds.
pub const PROP_SHUTDOWN_TIMEOUT: &str = "scheduler.shutdown-timeout";
/// Property key enabling the coordination mirror.
pub const PROP_COORDINATION_ENABLE: &str = "scheduler.etcd.enable";
/// Property key holding comma-separated include regexes for descriptor groups.
pub const PROP_INCLUDES: &str = "scheduler.includes";
/// Property key holding comma-separated exclusion regexes for descriptor groups.
pub const PROP_EXCLUSIONS: &str = "scheduler.exclusions";

/// Global configuration for the scheduler runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time the shutdown drain waits for running tasks to finish.
    pub shutdown_timeout: Duration,
    /// Sweep cadence of the status monitor.
    pub monitor_interval: Duration,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
    /// Whether lifecycle transitions are mirrored to the coordination store.
    pub coordination: bool,
    /// Root key under which the mirror publishes state.
    pub root: String,
    /// Regexes a descriptor group must match to be loaded. Empty means all.
    pub includes: Vec<String>,
    /// Regexes that exclude a descriptor group even when included.
    pub exclusions: Vec<String>,
}

impl Default for Config {
    /// Provides a default configuration:
    /// - `shutdown_timeout = 60s`
    /// - `monitor_interval = 1s`
    /// - `bus_capacity = 1024`
    /// - `coordination = false`
    /// - `root = "/taskherd"`
    /// - no include/exclusion filters
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(60),
            monitor_interval: Duration::from_secs(1),
            bus_capacity: 1024,
            coordination: false,
            root: "/taskherd".to_string(),
            includes: Vec::new(),
            exclusions: Vec::new(),
        }
    }
}

impl Config {
    /// Builds a configuration from property files, starting from defaults.
    ///
    /// Recognized keys: [`PROP_SHUTDOWN_TIMEOUT`] (milliseconds),
    /// [`PROP_COORDINATION_ENABLE`], [`PROP_INCLUDES`], [`PROP_EXCLUSIONS`].
    ///
    /// # Errors
    /// Returns [`SchedulerError::Config`] on an unparseable value.
    pub fn from_props(props: &Properties) -> Result<Self, SchedulerError> {
        let mut cfg = Self::default();

        if let Some(value) = last_non_blank(props, PROP_SHUTDOWN_TIMEOUT) {
            let millis: u64 = value.parse().map_err(|_| SchedulerError::Config {
                reason: format!("{PROP_SHUTDOWN_TIMEOUT} must be milliseconds, got '{value}'"),
            })?;
            cfg.shutdown_timeout = Duration::from_millis(millis);
        }

        if let Some(value) = last_non_blank(props, PROP_COORDINATION_ENABLE) {
            cfg.coordination = value.parse().map_err(|_| SchedulerError::Config {
                reason: format!("{PROP_COORDINATION_ENABLE} must be a boolean, got '{value}'"),
            })?;
        }

        if let Some(value) = last_non_blank(props, PROP_INCLUDES) {
            cfg.includes = split_list(&value);
        }

        if let Some(value) = last_non_blank(props, PROP_EXCLUSIONS) {
            cfg.exclusions = split_list(&value);
        }

        Ok(cfg)
    }
}

/// Scans property files in order; the last non-blank value for `key` wins.
pub(crate) fn last_non_blank(props: &Properties, key: &str) -> Option<String> {
    let mut found = None;
    for file in props {
        if let Some(value) = file.get(key) {
            if !value.trim().is_empty() {
                found = Some(value.trim().to_string());
            }
        }
    }
    found
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn last_file_wins() {
        let props = vec![
            file(&[(PROP_SHUTDOWN_TIMEOUT, "1000")]),
            file(&[(PROP_SHUTDOWN_TIMEOUT, "2500")]),
        ];
        let cfg = Config::from_props(&props).unwrap();
        assert_eq!(cfg.shutdown_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn blank_values_are_skipped() {
        let props = vec![
            file(&[(PROP_COORDINATION_ENABLE, "true")]),
            file(&[(PROP_COORDINATION_ENABLE, "  ")]),
        ];
        let cfg = Config::from_props(&props).unwrap();
        assert!(cfg.coordination);
    }

    #[test]
    fn malformed_timeout_is_config_error() {
        let props = vec![file(&[(PROP_SHUTDOWN_TIMEOUT, "soon")])];
        let err = Config::from_props(&props).unwrap_err();
        assert_eq!(err.as_label(), "scheduler_config");
    }

    #[test]
    fn include_lists_are_split_and_trimmed() {
        let props = vec![file(&[(PROP_INCLUDES, "Sync.*, Billing.* ,")])];
        let cfg = Config::from_props(&props).unwrap();
        assert_eq!(cfg.includes, vec!["Sync.*", "Billing.*"]);
    }
}
