//! Window/frame relay.
//!
//! The relay sits between the target frame, the docked devtools frame and an
//! optional external devtools window. It routes protocol traffic between
//! them, keeps the console backlog, and drives every devtools (re)attachment
//! including the settle delays between tearing a frame down and bringing it
//! back.
//!
//! Settle delays run on a virtual clock ([`Relay::advance`]). Each timer
//! remembers the [`SurfaceId`] it was armed for; a surface that was replaced
//! or detached in the meantime simply never hears from it.

use common::ShellResult;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::address_bar::validate_url;
use crate::bus::MessageBus;
use crate::commands::{CommandInbox, ShellCommand};
use crate::config::RelayConfig;
use crate::dock::{DockPosition, Layout, LayoutAction};
use crate::history::LogHistory;
use crate::preferences::{self, Preferences};
use crate::protocol::{self, classify, kinds, ConsoleType, LogEntry, ProtocolMethod, StackTrace, WireMessage};
use crate::state::{ShellState, StateStore};
use crate::surface::{ExternalWindow, PopupKind, Surface, SurfaceId, WindowOpener, BLANK};
use crate::theme;
use crate::timers::TimerQueue;

/// Progress of an external devtools window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopoutPhase {
    /// Window open, its devtools frame not loaded yet.
    Opening,
    /// Devtools frame in the window loaded.
    Attached,
}

/// Where devtools currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayState {
    Detached,
    Docked(DockPosition),
    Popout(PopoutPhase),
}

/// Notifications a host delivers about an external window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopoutEvent {
    /// The window's devtools frame finished loading.
    Loaded,
    /// The picture-in-picture window was (re)entered.
    Entered,
    /// The window was hidden or closed.
    Closed,
}

/// Surfaces the relay drives.
pub struct RelayEndpoints {
    /// The page being inspected.
    pub target: Arc<dyn Surface>,
    /// The docked devtools frame.
    pub devtools: Arc<dyn Surface>,
    /// Source of external devtools windows.
    pub opener: Arc<dyn WindowOpener>,
}

enum DevtoolsLink {
    None,
    /// Docked frame. `pending` until the target first loads.
    Embedded { frame: SurfaceId, pending: bool },
    /// External window; `frame` identifies its current devtools iframe.
    Window {
        id: SurfaceId,
        frame: SurfaceId,
        window: Arc<dyn ExternalWindow>,
        kind: PopupKind,
        attached: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerAction {
    RestoreTarget { surface: SurfaceId },
    RestoreDevtools { surface: SurfaceId },
    RestorePopout { surface: SurfaceId },
    Replay { surface: SurfaceId },
}

fn issue(counter: &mut u64) -> SurfaceId {
    *counter += 1;
    SurfaceId(*counter)
}

/// Session relay. One per shell window.
pub struct Relay {
    config: RelayConfig,
    target: Arc<dyn Surface>,
    devtools: Arc<dyn Surface>,
    opener: Arc<dyn WindowOpener>,
    preferences: Box<dyn Preferences>,
    store: StateStore,
    layout: Layout,
    history: LogHistory,
    timers: TimerQueue<TimerAction>,
    link: DevtoolsLink,
    /// Current attachment of the target frame.
    target_id: SurfaceId,
    /// Target has loaded at least once; the docked frame waits for it.
    target_ready: bool,
    next_surface: u64,
}

impl Relay {
    /// Create a relay, restoring dock position, layout and color from
    /// `preferences`, and point the target frame at its first page.
    pub fn new(
        config: RelayConfig,
        endpoints: RelayEndpoints,
        preferences: Box<dyn Preferences>,
    ) -> ShellResult<Self> {
        config.validate()?;

        let initial = ShellState {
            dock: DockPosition::load(preferences.as_ref()),
            color: theme::load_primary(preferences.as_ref()),
            ..ShellState::default()
        };
        let layout = Layout::load(preferences.as_ref());
        let mut next_surface = 0;
        let target_id = issue(&mut next_surface);

        let first_page = config.initial_target_url();
        endpoints.target.set_source(&first_page);
        tracing::info!(
            target = %first_page,
            dock = %initial.dock,
            origin = %config.origin,
            "relay started"
        );

        Ok(Self {
            store: StateStore::new(initial, config.log_state_changes),
            history: LogHistory::with_capacity(config.history_capacity),
            timers: TimerQueue::new(),
            link: DevtoolsLink::None,
            target: endpoints.target,
            devtools: endpoints.devtools,
            opener: endpoints.opener,
            preferences,
            layout,
            config,
            target_id,
            target_ready: false,
            next_surface,
        })
    }

    // ---- accessors ----

    pub fn state(&self) -> RelayState {
        match &self.link {
            DevtoolsLink::None => RelayState::Detached,
            DevtoolsLink::Embedded { .. } => RelayState::Docked(self.store.get().dock),
            DevtoolsLink::Window { attached: false, .. } => RelayState::Popout(PopoutPhase::Opening),
            DevtoolsLink::Window { attached: true, .. } => RelayState::Popout(PopoutPhase::Attached),
        }
    }

    pub fn dock(&self) -> DockPosition {
        self.store.get().dock
    }

    pub fn shell_state(&self) -> &ShellState {
        self.store.get()
    }

    pub fn history(&self) -> &LogHistory {
        &self.history
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn preferences(&self) -> &dyn Preferences {
        self.preferences.as_ref()
    }

    /// Current virtual clock reading.
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Time until the next settle delay expires.
    pub fn next_timer(&self) -> Option<Duration> {
        self.timers.next_due().map(|due| due.saturating_sub(self.timers.now()))
    }

    pub fn devtools_url(&self) -> String {
        self.config.devtools_url()
    }

    /// Id of the open external window, for routing host notifications.
    pub fn popout_id(&self) -> Option<SurfaceId> {
        match &self.link {
            DevtoolsLink::Window { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Page the target frame shows when not blanked.
    pub fn target_url(&self) -> String {
        let submitted = &self.store.get().url;
        if submitted.is_empty() {
            self.config.target_url.clone()
        } else {
            submitted.clone()
        }
    }

    // ---- devtools lifecycle ----

    /// Turn devtools on and attach it where the dock position says.
    ///
    /// When an external window cannot be opened the flag stays on, the relay
    /// stays detached and calling this again retries.
    pub fn enable_devtools(&mut self) -> ShellResult<()> {
        self.set_devtools_flag(true, "devtools:enable");
        if self.store.get().dock.is_docked() && self.layout.ensure_visible() {
            tracing::debug!(sizes = ?self.layout.sizes(), "restored devtools panel size");
        }
        self.reconcile()
    }

    /// Turn devtools off, blanking the docked frame or closing the window.
    pub fn disable_devtools(&mut self) {
        self.set_devtools_flag(false, "devtools:disable");
        self.detach();
    }

    pub fn toggle_devtools(&mut self) -> ShellResult<()> {
        if self.store.get().devtools_enabled {
            self.disable_devtools();
            Ok(())
        } else {
            self.enable_devtools()
        }
    }

    /// Move devtools. Moving between sides keeps the docked frame as is;
    /// moving to or from `Popout` swaps the docked frame for a window.
    pub fn set_dock(&mut self, position: DockPosition) -> ShellResult<()> {
        if self.store.get().dock == position {
            return Ok(());
        }
        position.store(self.preferences.as_mut())?;
        self.store.update("dock", |s| s.dock = position);
        tracing::debug!(%position, "dock changed");
        self.reconcile()
    }

    /// Choose how the next external window is presented.
    pub fn set_popup_kind(&mut self, kind: PopupKind) {
        self.store.update("popup-kind", |s| s.popup_kind = kind);
    }

    fn set_devtools_flag(&mut self, enabled: bool, action: &str) {
        if self.store.update(action, |s| s.devtools_enabled = enabled) {
            self.target
                .post_message(WireMessage::envelope(kinds::TOGGLE_DEVTOOLS, Value::Bool(enabled)));
        }
    }

    /// Bring the devtools link in line with the flag and dock position.
    fn reconcile(&mut self) -> ShellResult<()> {
        let state = self.store.get();
        let (enabled, want_window) = (state.devtools_enabled, !state.dock.is_docked());

        if !enabled {
            self.detach();
            return Ok(());
        }

        match (&self.link, want_window) {
            (DevtoolsLink::Embedded { .. }, false) | (DevtoolsLink::Window { .. }, true) => Ok(()),
            _ => {
                self.detach();
                if want_window {
                    self.open_window()
                } else {
                    self.attach_embedded();
                    Ok(())
                }
            }
        }
    }

    fn attach_embedded(&mut self) {
        let frame = issue(&mut self.next_surface);
        let pending = !self.target_ready;
        if !pending {
            self.devtools.set_source(&self.config.devtools_url());
        }
        self.link = DevtoolsLink::Embedded { frame, pending };
        tracing::info!(dock = %self.store.get().dock, pending, "devtools docked");
    }

    fn open_window(&mut self) -> ShellResult<()> {
        let state = self.store.get();
        let (kind, color) = (state.popup_kind, state.color.clone());

        match self.opener.open(kind, self.config.popup_url(), &color) {
            Ok(window) => {
                let id = issue(&mut self.next_surface);
                let frame = issue(&mut self.next_surface);
                if kind == PopupKind::Pip {
                    window.mount_devtools(&self.config.devtools_url());
                }
                tracing::info!(%kind, window = id.0, "opened devtools window");
                self.link = DevtoolsLink::Window {
                    id,
                    frame,
                    window,
                    kind,
                    attached: false,
                };
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%kind, %error, "could not open devtools window");
                Err(error)
            }
        }
    }

    fn detach(&mut self) {
        match std::mem::replace(&mut self.link, DevtoolsLink::None) {
            DevtoolsLink::None => return,
            DevtoolsLink::Embedded { pending, .. } => {
                if !pending {
                    self.devtools.set_source(BLANK);
                }
                tracing::debug!("retired docked devtools frame");
            }
            DevtoolsLink::Window { window, kind, .. } => {
                window.close();
                tracing::info!(%kind, "closed devtools window");
            }
        }
        self.timers
            .cancel_where(|action| !matches!(action, TimerAction::RestoreTarget { .. }));
    }

    /// Reload the devtools surface.
    ///
    /// A forced reload blanks the surface, restores it after the blank delay
    /// and replays the backlog once it has settled. A soft reload drops the
    /// backlog and reloads in place.
    pub fn reload_devtools(&mut self, force: bool) {
        match &mut self.link {
            DevtoolsLink::None | DevtoolsLink::Embedded { pending: true, .. } => {}
            DevtoolsLink::Embedded { frame, .. } => {
                if force {
                    *frame = issue(&mut self.next_surface);
                    self.devtools.set_source(BLANK);
                    self.timers.schedule(
                        self.config.blank_delay,
                        TimerAction::RestoreDevtools { surface: *frame },
                    );
                } else {
                    self.history.clear();
                    self.devtools.reload();
                }
            }
            DevtoolsLink::Window { frame, window, .. } => {
                if force {
                    *frame = issue(&mut self.next_surface);
                    window.set_devtools_source(BLANK);
                    self.timers.schedule(
                        self.config.popout_restore_delay,
                        TimerAction::RestorePopout { surface: *frame },
                    );
                } else {
                    self.history.clear();
                    window.set_devtools_source(&self.config.devtools_url());
                }
            }
        }
    }

    // ---- target frame ----

    /// The target frame finished loading.
    pub fn on_target_loaded(&mut self) {
        self.store.update("target:loaded", |s| s.target_loaded = true);
        self.target_ready = true;

        if let DevtoolsLink::Embedded { pending, .. } = &mut self.link {
            if *pending {
                *pending = false;
                self.devtools.set_source(&self.config.devtools_url());
            }
        }
    }

    /// Reload the target page, optionally force reloading devtools too.
    pub fn refresh_frame(&mut self, reload_devtools: bool) {
        self.history.clear();
        self.target.set_source(BLANK);
        self.target_id = issue(&mut self.next_surface);
        self.timers.schedule(
            self.config.blank_delay,
            TimerAction::RestoreTarget { surface: self.target_id },
        );
        if reload_devtools {
            self.reload_devtools(true);
        }
        self.store.update("refresh:frame", |s| s.target_loaded = false);
    }

    /// Navigate the target frame. Returns whether navigation happened; an
    /// address equal to the current one is a no-op.
    pub fn load_url(&mut self, input: &str) -> ShellResult<bool> {
        let url = match validate_url(input) {
            Ok(url) => url,
            Err(error) => {
                tracing::error!(url = input, %error, "invalid URL submitted");
                return Err(error);
            }
        };
        if url.as_str() == self.store.get().url {
            tracing::debug!(url = %url, "already showing URL");
            return Ok(false);
        }

        self.history.clear();
        self.store.update("load:frame", |s| {
            s.url = url.to_string();
            s.target_loaded = false;
        });
        self.target_id = issue(&mut self.next_surface);
        self.target.set_source(url.as_str());
        tracing::info!(url = %url, "navigating target");
        self.reload_devtools(true);
        Ok(true)
    }

    // ---- external window ----

    /// Handle a host notification about external window `id`. Events for a
    /// window that is no longer current are ignored.
    pub fn on_popout_event(&mut self, id: SurfaceId, event: PopoutEvent) {
        let closed = match &mut self.link {
            DevtoolsLink::Window {
                id: current,
                frame,
                window,
                kind,
                attached,
            } if *current == id => match event {
                PopoutEvent::Loaded => {
                    *attached = true;
                    self.timers
                        .schedule(self.config.replay_delay, TimerAction::Replay { surface: *frame });
                    false
                }
                PopoutEvent::Entered => {
                    if *kind == PopupKind::Pip {
                        *frame = issue(&mut self.next_surface);
                        *attached = false;
                        window.mount_devtools(&self.config.devtools_url());
                    }
                    false
                }
                PopoutEvent::Closed => true,
            },
            _ => {
                tracing::trace!(window = id.0, ?event, "ignoring event from stale window");
                false
            }
        };

        if closed {
            self.link = DevtoolsLink::None;
            self.timers
                .cancel_where(|action| !matches!(action, TimerAction::RestoreTarget { .. }));
            self.set_devtools_flag(false, "devtools:window-closed");
            tracing::info!(window = id.0, "devtools window closed");
        }
    }

    fn current_window_event(&mut self, event: PopoutEvent) {
        match self.popout_id() {
            Some(id) => self.on_popout_event(id, event),
            None => tracing::trace!(?event, "no devtools window for notification"),
        }
    }

    // ---- messages ----

    /// Route one inbound cross-window message. Every rule is applied; a
    /// message can both be forwarded and buffered. Never fails.
    pub fn handle_message(&mut self, message: &WireMessage) {
        if let Some(envelope) = message.as_envelope() {
            if envelope.kind == kinds::TO_DEVTOOLS {
                if let Some(data) = &envelope.data {
                    self.forward_to_devtools(data);
                }
            }

            if let Some(stack) = &envelope.stack {
                match ConsoleType::parse(&envelope.kind) {
                    Some(kind) => {
                        let args = envelope
                            .data
                            .as_ref()
                            .and_then(Value::as_array)
                            .map(Vec::as_slice)
                            .unwrap_or_default();
                        let entry = LogEntry::from_capture(
                            kind,
                            args,
                            &StackTrace::from_value(stack),
                            protocol::now_millis(),
                        );
                        self.history.append(entry);
                    }
                    None => tracing::trace!(kind = %envelope.kind, "ignoring capture of unknown type"),
                }
            }

            match envelope.kind.as_str() {
                kinds::OPEN_CONSOLE => {
                    if let Err(error) = self.enable_devtools() {
                        tracing::debug!(%error, "open-console could not attach devtools");
                    }
                }
                kinds::OPEN_PROXY => {
                    self.store.update("open-proxy", |s| s.proxy_open = true);
                }
                kinds::OPEN_DOCS => {
                    self.store.update("open-docs", |s| s.docs_open = true);
                }
                kinds::COLOR_CHANGE => {
                    let color = envelope.color.as_deref().or_else(|| envelope.data_str());
                    if let Some(color) = color {
                        if let Err(error) = self.set_color(color) {
                            tracing::warn!(color, %error, "ignoring color change");
                        }
                    }
                }
                kinds::IFRAME_LOADED => self.current_window_event(PopoutEvent::Loaded),
                kinds::UNLOAD_DEVTOOLS => self.current_window_event(PopoutEvent::Closed),
                _ => {}
            }
        }

        if let Some(raw) = message.as_text() {
            if protocol::is_protocol_response(raw) {
                tracing::trace!("forwarding devtools response to target");
                self.target
                    .post_message(WireMessage::envelope(kinds::FROM_DEVTOOLS, Value::String(raw.to_string())));
            }
        }

        let classified = classify(message);
        match classified.method {
            ProtocolMethod::ConsoleApiCalled => {
                self.history.append(LogEntry::from_raw(classified.payload));
            }
            ProtocolMethod::Enable => match self.active_frame() {
                Some(frame) => {
                    self.timers
                        .schedule(self.config.replay_delay, TimerAction::Replay { surface: frame });
                }
                None => tracing::trace!("devtools enabled with no surface attached"),
            },
            ProtocolMethod::DiscardEntries => self.history.clear(),
            ProtocolMethod::Unknown => {}
        }
    }

    fn forward_to_devtools(&self, data: &Value) {
        let message = match data {
            Value::String(s) => WireMessage::Text(s.clone()),
            other => WireMessage::Text(other.to_string()),
        };
        match &self.link {
            DevtoolsLink::Embedded { pending: false, .. } => self.devtools.post_message(message),
            DevtoolsLink::Window { window, .. } => window.post_message(message),
            _ => tracing::trace!("no devtools surface, dropping message"),
        }
    }

    /// Devtools frame that currently receives traffic.
    fn active_frame(&self) -> Option<SurfaceId> {
        match &self.link {
            DevtoolsLink::Embedded { frame, pending: false } => Some(*frame),
            DevtoolsLink::Window { frame, .. } => Some(*frame),
            _ => None,
        }
    }

    // ---- clock ----

    /// Advance the virtual clock, firing every timer that comes due in
    /// deadline order. Timers armed while firing run in the same call when
    /// they fall inside the window.
    pub fn advance(&mut self, elapsed: Duration) {
        let until = self.timers.now() + elapsed;
        while let Some(action) = self.timers.pop_due(until) {
            tracing::trace!(?action, now = ?self.timers.now(), "timer fired");
            self.fire(action);
        }
        self.timers.set_now(until);
    }

    fn fire(&mut self, action: TimerAction) {
        match action {
            TimerAction::RestoreTarget { surface } => {
                if surface == self.target_id {
                    let url = self.target_url();
                    self.target.set_source(&url);
                } else {
                    tracing::trace!(surface = surface.0, "stale target restore");
                }
            }
            TimerAction::RestoreDevtools { surface } => match &self.link {
                DevtoolsLink::Embedded { frame, .. } if *frame == surface => {
                    self.devtools.set_source(&self.config.devtools_url());
                    self.timers
                        .schedule(self.config.replay_delay, TimerAction::Replay { surface });
                }
                _ => tracing::trace!(surface = surface.0, "stale devtools restore"),
            },
            TimerAction::RestorePopout { surface } => match &mut self.link {
                DevtoolsLink::Window {
                    frame,
                    window,
                    attached,
                    ..
                } if *frame == surface => {
                    window.set_devtools_source(&self.config.devtools_url());
                    *attached = false;
                }
                _ => tracing::trace!(surface = surface.0, "stale window restore"),
            },
            TimerAction::Replay { surface } => match &self.link {
                DevtoolsLink::Embedded { frame, pending: false } if *frame == surface => {
                    self.history.replay(self.devtools.as_ref());
                }
                DevtoolsLink::Window { frame, window, .. } if *frame == surface => {
                    self.history.replay(window.as_ref());
                }
                _ => tracing::trace!(surface = surface.0, "stale replay"),
            },
        }
    }

    // ---- layout and settings ----

    /// Panel ratios reported after a layout pass.
    pub fn on_layout(&mut self, sizes: &[f64]) -> ShellResult<()> {
        self.layout.on_layout(sizes, self.preferences.as_mut())
    }

    /// A panel resize drag finished with the devtools panel `extent` units
    /// across. Too small a panel closes devtools.
    pub fn on_drag_end(&mut self, extent: f64) {
        if self.layout.on_drag_end(extent) == LayoutAction::Collapse {
            tracing::debug!(extent, "devtools panel dragged closed");
            self.disable_devtools();
        }
    }

    /// Apply and persist a primary color, and tell the target about it.
    pub fn set_color(&mut self, color: &str) -> ShellResult<()> {
        let color = theme::parse_primary(color)?;
        self.preferences.set(preferences::THEME_COLOR, &color)?;
        self.store.update("color", |s| s.color = color.clone());
        self.target
            .post_message(WireMessage::envelope(kinds::COLOR_CHANGE, Value::String(color.clone())));

        if let DevtoolsLink::Window {
            window,
            kind: PopupKind::Pip,
            ..
        } = &self.link
        {
            window.set_theme_color(&color);
        }
        Ok(())
    }

    /// Open or close the settings drawer.
    pub fn toggle_settings(&mut self, open: bool) {
        self.store.update("settings", |s| s.settings_open = open);
        self.target
            .post_message(WireMessage::envelope(kinds::SETTING_TOGGLE, Value::Bool(open)));
    }

    pub fn set_proxy_mode(&mut self, enabled: bool) {
        self.store.update("proxy-mode", |s| s.proxy_mode = enabled);
    }

    pub fn set_proxy_open(&mut self, open: bool) {
        self.store.update("proxy", |s| s.proxy_open = open);
    }

    pub fn set_docs_open(&mut self, open: bool) {
        self.store.update("docs", |s| s.docs_open = open);
    }

    // ---- bus ----

    /// Listen for shell commands on `bus`. Apply them with [`Relay::drain`].
    pub fn bind(bus: &MessageBus) -> CommandInbox {
        CommandInbox::subscribe(bus)
    }

    /// Apply every command queued in `inbox`, oldest first.
    pub fn drain(&mut self, inbox: &CommandInbox) -> usize {
        let commands = inbox.take();
        for command in &commands {
            self.apply(command);
        }
        commands.len()
    }

    pub fn apply(&mut self, command: &ShellCommand) {
        tracing::trace!(?command, "applying command");
        match command {
            ShellCommand::LoadFrame(url) => {
                // Rejections are logged by load_url.
                self.load_url(url).ok();
            }
            ShellCommand::RefreshFrame { reload_devtools } => self.refresh_frame(*reload_devtools),
            ShellCommand::SettingToggle(open) => self.toggle_settings(*open),
            ShellCommand::ColorChange(color) => {
                if let Err(error) = self.set_color(color) {
                    tracing::warn!(color = %color, %error, "ignoring color change");
                }
            }
        }
    }
}
