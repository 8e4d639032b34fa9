//! Shell state.
//!
//! The flags UI controls read (is devtools open, where is it docked, has the
//! target loaded, ...). One [`StateStore`] exists per session and is owned by
//! the relay; everything else reads it through shared references.

use serde::Serialize;

use crate::dock::DockPosition;
use crate::surface::PopupKind;

/// Snapshot of the shell's UI flags.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShellState {
    /// Settings drawer open.
    pub settings_open: bool,
    /// Devtools requested by the user.
    pub devtools_enabled: bool,
    /// Where devtools is docked.
    pub dock: DockPosition,
    /// How a popout is presented.
    pub popup_kind: PopupKind,
    /// Proxy panel open.
    pub proxy_open: bool,
    /// Docs panel open.
    pub docs_open: bool,
    /// Proxy mode setting.
    pub proxy_mode: bool,
    /// Submitted target URL, empty until the user navigates.
    pub url: String,
    /// Target frame finished loading its current page.
    pub target_loaded: bool,
    /// Primary theme color.
    pub color: String,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            settings_open: false,
            devtools_enabled: false,
            dock: DockPosition::default(),
            popup_kind: PopupKind::default(),
            proxy_open: false,
            docs_open: false,
            proxy_mode: false,
            url: String::new(),
            target_loaded: false,
            color: crate::theme::DEFAULT_PRIMARY.to_string(),
        }
    }
}

/// Owner of the [`ShellState`]; every mutation goes through [`StateStore::update`].
#[derive(Clone, Debug)]
pub struct StateStore {
    state: ShellState,
    name: &'static str,
    log_changes: bool,
}

impl StateStore {
    pub fn new(initial: ShellState, log_changes: bool) -> Self {
        Self {
            state: initial,
            name: "Shell",
            log_changes,
        }
    }

    pub fn get(&self) -> &ShellState {
        &self.state
    }

    /// Apply `f` and report whether anything changed. Changes are logged
    /// with the previous and next state when change logging is on.
    pub fn update(&mut self, action: &str, f: impl FnOnce(&mut ShellState)) -> bool {
        let previous = self.state.clone();
        f(&mut self.state);
        let changed = previous != self.state;

        if changed && self.log_changes {
            tracing::debug!(
                store = self.name,
                action,
                prev = ?previous,
                next = ?self.state,
                "state updated"
            );
        }

        changed
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(ShellState::default(), cfg!(debug_assertions))
    }
}
