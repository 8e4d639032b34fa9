//! Commands the shell chrome sends the relay over the bus.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::bus::{MessageBus, Subscription};

/// Bus event names.
pub mod events {
    /// Navigate the target frame: `[url]`.
    pub const LOAD_FRAME: &str = "load:frame";
    /// Reload the target frame: `[]` or `[reload_devtools]`.
    pub const REFRESH_FRAME: &str = "refresh:frame";
    /// Settings drawer opened or closed: `[open]`.
    pub const SETTING_TOGGLE: &str = "setting:toggle";
    /// Primary color picked: `[color]`.
    pub const COLOR_CHANGE: &str = "color:change";

    pub const ALL: [&str; 4] = [LOAD_FRAME, REFRESH_FRAME, SETTING_TOGGLE, COLOR_CHANGE];
}

/// A decoded bus command.
#[derive(Clone, Debug, PartialEq)]
pub enum ShellCommand {
    LoadFrame(String),
    RefreshFrame { reload_devtools: bool },
    SettingToggle(bool),
    ColorChange(String),
}

impl ShellCommand {
    /// Decode `event` and its arguments. Unknown events and arguments of the
    /// wrong shape yield `None`.
    pub fn from_event(event: &str, args: &[Value]) -> Option<Self> {
        match event {
            events::LOAD_FRAME => args.first()?.as_str().map(|u| Self::LoadFrame(u.to_string())),
            events::REFRESH_FRAME => Some(Self::RefreshFrame {
                reload_devtools: args.first().and_then(Value::as_bool).unwrap_or(true),
            }),
            events::SETTING_TOGGLE => args.first()?.as_bool().map(Self::SettingToggle),
            events::COLOR_CHANGE => args.first()?.as_str().map(|c| Self::ColorChange(c.to_string())),
            _ => None,
        }
    }
}

/// Queue of commands received from the bus, waiting to be applied.
///
/// Bus handlers may run on any thread, while the relay is `&mut` owned, so
/// handlers only enqueue and the owner drains.
#[derive(Clone, Default)]
pub struct CommandInbox {
    queue: Arc<Mutex<VecDeque<ShellCommand>>>,
    subscriptions: Vec<Subscription>,
}

impl CommandInbox {
    /// Subscribe to every command event on `bus`.
    pub fn subscribe(bus: &MessageBus) -> Self {
        let queue: Arc<Mutex<VecDeque<ShellCommand>>> = Arc::default();

        let subscriptions = events::ALL
            .iter()
            .map(|&event| {
                let queue = queue.clone();
                bus.subscribe(event, move |args| match ShellCommand::from_event(event, args) {
                    Some(command) => queue.lock().push_back(command),
                    None => tracing::warn!(event, ?args, "ignoring malformed command"),
                })
            })
            .collect();

        Self { queue, subscriptions }
    }

    /// Take every queued command, oldest first.
    pub fn take(&self) -> Vec<ShellCommand> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Stop receiving commands. Already queued commands are kept.
    pub fn unbind(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}
