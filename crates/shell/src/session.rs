//! A relay session driven by JSON instructions.

use common::ShellResult;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use ui::dock::DockPosition;
use ui::preferences::Preferences;
use ui::protocol::WireMessage;
use ui::relay::{PopoutEvent, Relay, RelayEndpoints, RelayState};
use ui::surface::PopupKind;
use ui::{CommandInbox, MessageBus, RelayConfig};

use crate::host::{HostFrame, HostOpener, Output};

/// Host notification about the external window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowNotice {
    Loaded,
    Entered,
    Closed,
}

impl From<WindowNotice> for PopoutEvent {
    fn from(notice: WindowNotice) -> Self {
        match notice {
            WindowNotice::Loaded => PopoutEvent::Loaded,
            WindowNotice::Entered => PopoutEvent::Entered,
            WindowNotice::Closed => PopoutEvent::Closed,
        }
    }
}

/// One input line.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Instruction {
    /// A cross-window message arriving at the shell.
    Message { message: WireMessage },
    /// A bus event from the shell chrome.
    Publish {
        publish: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    Dock { dock: DockPosition },
    Popup { popup: PopupKind },
    Enable { enable: bool },
    Advance { advance_ms: u64 },
    TargetLoaded { target_loaded: bool },
    Window { window: WindowNotice },
    Layout { layout: Vec<f64> },
    DragEnd { drag_end: f64 },
}

impl Instruction {
    pub fn parse(line: &str) -> ShellResult<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

fn describe(state: RelayState) -> String {
    match state {
        RelayState::Detached => "detached".to_string(),
        RelayState::Docked(side) => format!("docked:{}", side),
        RelayState::Popout(phase) => format!("popout:{:?}", phase).to_lowercase(),
    }
}

/// Relay plus the bus feeding it.
pub struct Session {
    relay: Relay,
    bus: MessageBus,
    inbox: CommandInbox,
    output: Output,
    last_reported: Option<Value>,
}

impl Session {
    pub fn new(
        config: RelayConfig,
        preferences: Box<dyn Preferences>,
        output: Output,
        block_popups: bool,
    ) -> ShellResult<Self> {
        let endpoints = RelayEndpoints {
            target: Arc::new(HostFrame::new("target", output.clone())),
            devtools: Arc::new(HostFrame::new("devtools", output.clone())),
            opener: Arc::new(HostOpener::new(output.clone(), block_popups)),
        };
        let relay = Relay::new(config, endpoints, preferences)?;
        let bus = MessageBus::new();
        let inbox = Relay::bind(&bus);

        let mut session = Self {
            relay,
            bus,
            inbox,
            output,
            last_reported: None,
        };
        session.report();
        Ok(session)
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Parse and apply one input line. Blank lines are skipped.
    pub fn apply_line(&mut self, line: &str) -> ShellResult<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.apply(Instruction::parse(line)?)
    }

    pub fn apply(&mut self, instruction: Instruction) -> ShellResult<()> {
        tracing::trace!(?instruction, "applying instruction");
        let result = match instruction {
            Instruction::Message { message } => {
                self.relay.handle_message(&message);
                Ok(())
            }
            Instruction::Publish { publish, args } => {
                self.bus.publish(&publish, &args);
                self.relay.drain(&self.inbox);
                Ok(())
            }
            Instruction::Dock { dock } => self.relay.set_dock(dock),
            Instruction::Popup { popup } => {
                self.relay.set_popup_kind(popup);
                Ok(())
            }
            Instruction::Enable { enable: true } => self.relay.enable_devtools(),
            Instruction::Enable { enable: false } => {
                self.relay.disable_devtools();
                Ok(())
            }
            Instruction::Advance { advance_ms } => {
                self.relay.advance(Duration::from_millis(advance_ms));
                Ok(())
            }
            Instruction::TargetLoaded { target_loaded } => {
                if target_loaded {
                    self.relay.on_target_loaded();
                }
                Ok(())
            }
            Instruction::Window { window } => {
                match self.relay.popout_id() {
                    Some(id) => self.relay.on_popout_event(id, window.into()),
                    None => tracing::debug!(?window, "no devtools window open"),
                }
                Ok(())
            }
            Instruction::Layout { layout } => self.relay.on_layout(&layout),
            Instruction::DragEnd { drag_end } => {
                self.relay.on_drag_end(drag_end);
                Ok(())
            }
        };
        self.report();
        result
    }

    /// Advance the relay clock by real elapsed time.
    pub fn tick(&mut self, elapsed: Duration) {
        self.relay.advance(elapsed);
        self.report();
    }

    /// Run every pending settle delay to completion.
    pub fn settle(&mut self) {
        while let Some(wait) = self.relay.next_timer() {
            self.relay.advance(wait);
        }
        self.report();
    }

    /// Emit the shell state when it changed since the last report.
    fn report(&mut self) {
        let snapshot = json!({
            "relay": describe(self.relay.state()),
            "shell": self.relay.shell_state(),
        });
        if self.last_reported.as_ref() != Some(&snapshot) {
            self.output.emit(json!({ "state": snapshot }));
            self.last_reported = Some(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ui::preferences::{FilePreferences, MemoryPreferences, DOCK_POSITION};

    fn session() -> (Session, Output) {
        let output = Output::buffer();
        let session = Session::new(
            RelayConfig::default(),
            Box::new(MemoryPreferences::new()),
            output.clone(),
            false,
        )
        .unwrap();
        (session, output)
    }

    /// Relay states reported, consecutive repeats collapsed.
    fn states(output: &Output) -> Vec<String> {
        let mut states: Vec<String> = output
            .lines()
            .iter()
            .filter_map(|l| l["state"]["relay"].as_str().map(str::to_string))
            .collect();
        states.dedup();
        states
    }

    #[test]
    fn test_parse_instructions() {
        assert_eq!(
            Instruction::parse(r#"{"dock":"left"}"#).unwrap(),
            Instruction::Dock { dock: DockPosition::Left }
        );
        assert_eq!(
            Instruction::parse(r#"{"publish":"refresh:frame"}"#).unwrap(),
            Instruction::Publish {
                publish: "refresh:frame".into(),
                args: vec![]
            }
        );
        assert_eq!(
            Instruction::parse(r#"{"message":{"type":"open-docs"}}"#).unwrap(),
            Instruction::Message {
                message: WireMessage::Envelope(ui::Envelope::new("open-docs"))
            }
        );
        assert_eq!(
            Instruction::parse(r#"{"window":"closed"}"#).unwrap(),
            Instruction::Window { window: WindowNotice::Closed }
        );
        assert!(Instruction::parse(r#"{"dock":"sideways"}"#).is_err());
        assert!(Instruction::parse("nope").is_err());
    }

    #[test]
    fn test_docking_flow() {
        let (mut session, output) = session();
        for line in [
            r#"{"target_loaded":true}"#,
            r#"{"enable":true}"#,
            r#"{"dock":"bottom"}"#,
            "",
        ] {
            session.apply_line(line).unwrap();
        }

        assert_eq!(states(&output), vec!["detached", "docked:right", "docked:bottom"]);
        assert!(output
            .lines()
            .contains(&json!({"surface": "devtools", "source": session.relay().devtools_url()})));
    }

    #[test]
    fn test_popout_flow() {
        let (mut session, output) = session();
        session.apply_line(r#"{"dock":"popout"}"#).unwrap();
        session.apply_line(r#"{"enable":true}"#).unwrap();
        session.apply_line(r#"{"window":"loaded"}"#).unwrap();
        session.apply_line(r#"{"window":"closed"}"#).unwrap();

        assert_eq!(
            states(&output),
            vec!["detached", "popout:opening", "popout:attached", "detached"]
        );
    }

    #[test]
    fn test_blocked_popups_surface_error() {
        let output = Output::buffer();
        let mut session = Session::new(
            RelayConfig::default(),
            Box::new(MemoryPreferences::new()),
            output,
            true,
        )
        .unwrap();
        session.apply_line(r#"{"dock":"popout"}"#).unwrap();
        assert!(session.apply_line(r#"{"enable":true}"#).is_err());
    }

    #[test]
    fn test_publish_reaches_relay() {
        let (mut session, _output) = session();
        session
            .apply_line(r#"{"publish":"load:frame","args":["example.com"]}"#)
            .unwrap();
        assert_eq!(session.relay().shell_state().url, "https://example.com/");
    }

    #[test]
    fn test_settle_runs_timers() {
        let (mut session, output) = session();
        session.apply_line(r#"{"publish":"refresh:frame"}"#).unwrap();
        session.settle();

        let sources: Vec<_> = output
            .lines()
            .iter()
            .filter(|l| l["surface"] == "target")
            .filter_map(|l| l["source"].as_str().map(str::to_string))
            .collect();
        assert_eq!(sources, vec!["http://localhost:3001", "about:blank", "http://localhost:3001"]);
        assert!(session.relay().next_timer().is_none());
    }

    #[test]
    fn test_preferences_survive_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shell.json");

        let prefs = FilePreferences::open(&path).unwrap();
        let mut session = Session::new(RelayConfig::default(), Box::new(prefs), Output::buffer(), false).unwrap();
        session.apply_line(r#"{"dock":"left"}"#).unwrap();

        let prefs = FilePreferences::open(&path).unwrap();
        assert_eq!(prefs.get(DOCK_POSITION).as_deref(), Some("left"));
        let session = Session::new(RelayConfig::default(), Box::new(prefs), Output::buffer(), false).unwrap();
        assert_eq!(session.relay().dock(), DockPosition::Left);
    }
}
