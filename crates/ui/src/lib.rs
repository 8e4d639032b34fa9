//! Devtools shell core.
//!
//! This crate provides the headless side of a devtools shell:
//! - Message bus between shell components
//! - Console log history and protocol classification
//! - The window/frame relay between target, docked devtools and popouts
//! - Dock position, panel layout, theme and persisted preferences

pub mod address_bar;
pub mod bus;
pub mod commands;
pub mod config;
pub mod dock;
pub mod history;
pub mod preferences;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod surface;
pub mod theme;
pub mod timers;

pub use address_bar::{validate_url, AddressBar};
pub use bus::{MessageBus, Subscription};
pub use commands::{CommandInbox, ShellCommand};
pub use config::RelayConfig;
pub use dock::{DockPosition, Layout};
pub use history::LogHistory;
pub use preferences::{FilePreferences, MemoryPreferences, Preferences};
pub use protocol::{classify, Classified, Envelope, LogEntry, ProtocolMethod, WireMessage};
pub use relay::{PopoutEvent, PopoutPhase, Relay, RelayEndpoints, RelayState};
pub use state::{ShellState, StateStore};
pub use surface::{Endpoint, ExternalWindow, PopupKind, Surface, SurfaceId, WindowOpener};
