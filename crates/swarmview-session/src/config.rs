//! Session configuration surface.
//!
//! Where these values are persisted is out of scope here; this struct is the
//! boundary the preferences layer hands over.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline configuration applied when a session is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Milliseconds between full refresh passes.
    pub refresh_interval_ms: u64,
    /// Initial sort mode preference key (e.g. `sort-by-name`).
    pub sort_mode: String,
    /// Whether the initial sort order is reversed.
    pub sort_reversed: bool,
    /// Initial activity filter preference key (e.g. `show-all`).
    pub filter_mode: String,
    /// Initial tracker-host restriction.
    pub tracker_filter: Option<String>,
    /// Initial free-text filter.
    pub text_filter: String,
}

impl SessionConfig {
    /// The refresh cadence as a [`Duration`].
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1_000,
            sort_mode: "sort-by-name".to_string(),
            sort_reversed: false,
            filter_mode: "show-all".to_string(),
            tracker_filter: None,
            text_filter: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fresh_install() {
        let config = SessionConfig::default();
        assert_eq!(config.refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.sort_mode, "sort-by-name");
        assert_eq!(config.filter_mode, "show-all");
        assert!(!config.sort_reversed);
        assert!(config.text_filter.is_empty());
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = SessionConfig {
            sort_mode: "sort-by-ratio".to_string(),
            tracker_filter: Some("tracker.example.net".to_string()),
            ..SessionConfig::default()
        };
        let json = serde_json::to_string(&config).expect("serialize config");
        let back: SessionConfig = serde_json::from_str(&json).expect("deserialize config");
        assert_eq!(back.sort_mode, "sort-by-ratio");
        assert_eq!(back.tracker_filter.as_deref(), Some("tracker.example.net"));
    }
}
