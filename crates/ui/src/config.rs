//! Relay configuration.

use common::{ShellError, ShellResult};
use std::time::Duration;
use url::Url;

use crate::history;

/// Relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Origin the shell is served from; devtools connects back to it.
    pub origin: String,
    /// Path of the devtools frontend page.
    pub devtools_path: String,
    /// Path of the page hosting devtools in an external window.
    pub popup_path: String,
    /// Page loaded in the target frame before the user navigates.
    pub target_url: String,
    /// Start on the target's not-found page.
    pub not_found: bool,
    /// Pause between blanking a frame and restoring its source.
    pub blank_delay: Duration,
    /// Pause between a devtools frame loading and replaying history into it.
    pub replay_delay: Duration,
    /// Pause between blanking and restoring an external window's devtools.
    pub popout_restore_delay: Duration,
    /// Log history capacity; `None` keeps everything.
    pub history_capacity: Option<usize>,
    /// Log every shell state change.
    pub log_state_changes: bool,
}

impl RelayConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shell origin.
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }

    /// Set the initial target page.
    pub fn with_target_url(mut self, url: &str) -> Self {
        self.target_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Start on the target's not-found page.
    pub fn with_not_found(mut self, not_found: bool) -> Self {
        self.not_found = not_found;
        self
    }

    /// Set the devtools page path.
    pub fn with_devtools_path(mut self, path: &str) -> Self {
        self.devtools_path = path.to_string();
        self
    }

    /// Set the history capacity.
    pub fn with_history_capacity(mut self, capacity: Option<usize>) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set all settle delays at once.
    pub fn with_delays(mut self, blank: Duration, replay: Duration, popout_restore: Duration) -> Self {
        self.blank_delay = blank;
        self.replay_delay = replay;
        self.popout_restore_delay = popout_restore;
        self
    }

    /// Enable or disable state change logging.
    pub fn with_state_logging(mut self, enabled: bool) -> Self {
        self.log_state_changes = enabled;
        self
    }

    /// URL of the devtools frontend, told where to find the shell.
    pub fn devtools_url(&self) -> String {
        format!("{}#?embedded={}", self.devtools_path, self.origin)
    }

    /// URL of the external window page.
    pub fn popup_url(&self) -> &str {
        &self.popup_path
    }

    /// Page the target frame starts on.
    pub fn initial_target_url(&self) -> String {
        if self.not_found {
            format!("{}/404", self.target_url)
        } else {
            self.target_url.clone()
        }
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> ShellResult<()> {
        let origin = Url::parse(&self.origin)?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ShellError::config(format!("origin must be http(s): {}", self.origin)));
        }
        Url::parse(&self.target_url)
            .map_err(|e| ShellError::config(format!("target url `{}`: {}", self.target_url, e)))?;

        for (name, path) in [("devtools", &self.devtools_path), ("popup", &self.popup_path)] {
            if !path.starts_with('/') {
                return Err(ShellError::config(format!("{} path must be absolute: {}", name, path)));
            }
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            devtools_path: "/lib/devtools/elora-devtools".to_string(),
            popup_path: "/lib/devtools-popup".to_string(),
            target_url: "http://localhost:3001".to_string(),
            not_found: false,
            blank_delay: Duration::from_millis(50),
            replay_delay: Duration::from_millis(500),
            popout_restore_delay: Duration::from_millis(100),
            history_capacity: Some(history::DEFAULT_CAPACITY),
            log_state_changes: cfg!(debug_assertions),
        }
    }
}
