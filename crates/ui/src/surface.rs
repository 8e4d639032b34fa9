//! Relay endpoints.
//!
//! The relay never touches real windows. Every frame or window it talks to is
//! one of the capabilities below, so hosts can back them with browser
//! windows, IPC channels, or in-memory recorders.

use common::ShellResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::protocol::WireMessage;

/// Source that unloads whatever a frame was showing.
pub const BLANK: &str = "about:blank";

/// One side of a cross-window channel.
pub trait Endpoint: Send + Sync {
    /// Deliver a message. Fire-and-forget, like `postMessage`.
    fn post_message(&self, message: WireMessage);
}

/// An embedded frame: the target page or the docked devtools surface.
pub trait Surface: Endpoint {
    /// Point the frame at a new URL.
    fn set_source(&self, url: &str);

    /// Reload the frame in place.
    fn reload(&self);
}

/// A detached window hosting its own devtools iframe.
pub trait ExternalWindow: Endpoint {
    /// Clear the window's document and mount a devtools iframe at `url`.
    fn mount_devtools(&self, url: &str);

    /// Point the already mounted devtools iframe at `url`.
    fn set_devtools_source(&self, url: &str);

    /// Apply the shell's primary color to the window chrome.
    fn set_theme_color(&self, color: &str);

    /// Close the window.
    fn close(&self);
}

/// Creates detached windows. Creation may be refused by the host (blocked
/// popup, no picture-in-picture support); that is an error, never a panic.
pub trait WindowOpener: Send + Sync {
    fn open(&self, kind: PopupKind, url: &str, color: &str) -> ShellResult<Arc<dyn ExternalWindow>>;
}

/// How a detached devtools surface is presented.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopupKind {
    /// Separate popup window.
    Popup,
    /// New browser tab.
    Tab,
    /// Document picture-in-picture window.
    #[default]
    Pip,
}

impl PopupKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "popup" => Some(Self::Popup),
            "tab" => Some(Self::Tab),
            "pip" => Some(Self::Pip),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Popup => "popup",
            Self::Tab => "tab",
            Self::Pip => "pip",
        }
    }
}

impl fmt::Display for PopupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one attachment of a surface.
///
/// A fresh id is issued every time a surface is (re)attached; timers
/// remember the id they were armed for and do nothing once it is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Opener for hosts without detached windows.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoWindows;

impl WindowOpener for NoWindows {
    fn open(&self, kind: PopupKind, _url: &str, _color: &str) -> ShellResult<Arc<dyn ExternalWindow>> {
        Err(common::ShellError::unsupported(format!("{} windows are not available", kind)))
    }
}

#[cfg(test)]
pub(crate) mod recording {
    //! In-memory endpoints for tests.

    use super::*;
    use common::ShellError;
    use parking_lot::Mutex;

    #[derive(Clone, Debug, PartialEq)]
    pub enum FrameEvent {
        Message(WireMessage),
        Source(String),
        Reload,
    }

    #[derive(Default)]
    pub struct RecordingSurface {
        events: Mutex<Vec<FrameEvent>>,
    }

    impl RecordingSurface {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<FrameEvent> {
            self.events.lock().clone()
        }

        pub fn messages(&self) -> Vec<WireMessage> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    FrameEvent::Message(m) => Some(m.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn texts(&self) -> Vec<String> {
            self.messages()
                .into_iter()
                .filter_map(|m| m.as_text().map(str::to_string))
                .collect()
        }

        pub fn sources(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    FrameEvent::Source(s) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.events.lock().clear();
        }
    }

    impl Endpoint for RecordingSurface {
        fn post_message(&self, message: WireMessage) {
            self.events.lock().push(FrameEvent::Message(message));
        }
    }

    impl Surface for RecordingSurface {
        fn set_source(&self, url: &str) {
            self.events.lock().push(FrameEvent::Source(url.to_string()));
        }

        fn reload(&self) {
            self.events.lock().push(FrameEvent::Reload);
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum WindowEvent {
        Message(WireMessage),
        Mount(String),
        Source(String),
        Theme(String),
        Close,
    }

    #[derive(Default)]
    pub struct RecordingWindow {
        events: Mutex<Vec<WindowEvent>>,
    }

    impl RecordingWindow {
        pub fn events(&self) -> Vec<WindowEvent> {
            self.events.lock().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    WindowEvent::Message(WireMessage::Text(s)) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn is_closed(&self) -> bool {
            self.events.lock().contains(&WindowEvent::Close)
        }
    }

    impl Endpoint for RecordingWindow {
        fn post_message(&self, message: WireMessage) {
            self.events.lock().push(WindowEvent::Message(message));
        }
    }

    impl ExternalWindow for RecordingWindow {
        fn mount_devtools(&self, url: &str) {
            self.events.lock().push(WindowEvent::Mount(url.to_string()));
        }

        fn set_devtools_source(&self, url: &str) {
            self.events.lock().push(WindowEvent::Source(url.to_string()));
        }

        fn set_theme_color(&self, color: &str) {
            self.events.lock().push(WindowEvent::Theme(color.to_string()));
        }

        fn close(&self) {
            self.events.lock().push(WindowEvent::Close);
        }
    }

    /// Opener handing out [`RecordingWindow`]s, optionally refusing.
    #[derive(Default)]
    pub struct RecordingOpener {
        blocked: Mutex<bool>,
        opened: Mutex<Vec<(PopupKind, String, Arc<RecordingWindow>)>>,
    }

    impl RecordingOpener {
        pub fn set_blocked(&self, blocked: bool) {
            *self.blocked.lock() = blocked;
        }

        pub fn last(&self) -> Option<Arc<RecordingWindow>> {
            self.opened.lock().last().map(|(_, _, w)| w.clone())
        }

        pub fn opened(&self) -> Vec<(PopupKind, String)> {
            self.opened.lock().iter().map(|(k, u, _)| (*k, u.clone())).collect()
        }
    }

    impl WindowOpener for RecordingOpener {
        fn open(&self, kind: PopupKind, url: &str, _color: &str) -> ShellResult<Arc<dyn ExternalWindow>> {
            if *self.blocked.lock() {
                return Err(ShellError::blocked(format!("{} blocked by host", kind)));
            }
            let window = Arc::new(RecordingWindow::default());
            self.opened.lock().push((kind, url.to_string(), window.clone()));
            Ok(window)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_kind_parse() {
        assert_eq!(PopupKind::parse("pip"), Some(PopupKind::Pip));
        assert_eq!(PopupKind::parse("tab"), Some(PopupKind::Tab));
        assert_eq!(PopupKind::parse("window"), None);
        assert_eq!(PopupKind::default(), PopupKind::Pip);
        assert_eq!(PopupKind::Popup.to_string(), "popup");
    }

    #[test]
    fn test_no_windows_refuses() {
        let err = NoWindows.open(PopupKind::Pip, "/lib/devtools-popup", "#000").err().unwrap();
        assert!(!err.is_retryable());
    }
}
