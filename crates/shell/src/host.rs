//! Line-oriented host surfaces.
//!
//! Every frame and window the relay drives is reported as one JSON object
//! per line, tagged with the surface it happened on.

use common::{ShellError, ShellResult};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use ui::protocol::WireMessage;
use ui::surface::{Endpoint, ExternalWindow, PopupKind, Surface, WindowOpener};

/// Where surface reports go.
#[derive(Clone)]
pub enum Output {
    /// One JSON object per line on stdout.
    Stdout,
    /// Kept in memory.
    Buffer(Arc<Mutex<Vec<Value>>>),
}

impl Output {
    pub fn buffer() -> Self {
        Self::Buffer(Arc::default())
    }

    pub fn emit(&self, line: Value) {
        match self {
            Self::Stdout => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                if let Err(e) = writeln!(lock, "{}", line).and_then(|_| lock.flush()) {
                    tracing::warn!(error = %e, "failed to write to stdout");
                }
            }
            Self::Buffer(lines) => lines.lock().push(line),
        }
    }

    /// Lines emitted so far; always empty for stdout.
    pub fn lines(&self) -> Vec<Value> {
        match self {
            Self::Stdout => Vec::new(),
            Self::Buffer(lines) => lines.lock().clone(),
        }
    }
}

fn message_value(message: &WireMessage) -> Value {
    serde_json::to_value(message).unwrap_or(Value::Null)
}

/// An embedded frame, either the target or the docked devtools.
pub struct HostFrame {
    name: &'static str,
    output: Output,
}

impl HostFrame {
    pub fn new(name: &'static str, output: Output) -> Self {
        Self { name, output }
    }
}

impl Endpoint for HostFrame {
    fn post_message(&self, message: WireMessage) {
        self.output
            .emit(json!({ "surface": self.name, "message": message_value(&message) }));
    }
}

impl Surface for HostFrame {
    fn set_source(&self, url: &str) {
        self.output.emit(json!({ "surface": self.name, "source": url }));
    }

    fn reload(&self) {
        self.output.emit(json!({ "surface": self.name, "reload": true }));
    }
}

/// An external devtools window.
pub struct HostWindow {
    id: u64,
    kind: PopupKind,
    output: Output,
}

impl HostWindow {
    fn emit(&self, event: &str, detail: Value) {
        self.output.emit(json!({
            "surface": "window",
            "window": self.id,
            "kind": self.kind,
            "event": event,
            "detail": detail,
        }));
    }
}

impl Endpoint for HostWindow {
    fn post_message(&self, message: WireMessage) {
        self.emit("message", message_value(&message));
    }
}

impl ExternalWindow for HostWindow {
    fn mount_devtools(&self, url: &str) {
        self.emit("mount", json!(url));
    }

    fn set_devtools_source(&self, url: &str) {
        self.emit("source", json!(url));
    }

    fn set_theme_color(&self, color: &str) {
        self.emit("theme", json!(color));
    }

    fn close(&self) {
        self.emit("close", Value::Null);
    }
}

/// Opens [`HostWindow`]s unless told to refuse, the way a browser blocks
/// popups.
pub struct HostOpener {
    output: Output,
    blocked: bool,
    counter: AtomicU64,
}

impl HostOpener {
    pub fn new(output: Output, blocked: bool) -> Self {
        Self {
            output,
            blocked,
            counter: AtomicU64::new(0),
        }
    }
}

impl WindowOpener for HostOpener {
    fn open(&self, kind: PopupKind, url: &str, color: &str) -> ShellResult<Arc<dyn ExternalWindow>> {
        if self.blocked {
            return Err(ShellError::blocked(format!("{} window refused by host", kind)));
        }
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.output.emit(json!({
            "surface": "window",
            "window": id,
            "kind": kind,
            "event": "open",
            "detail": { "url": url, "color": color },
        }));
        Ok(Arc::new(HostWindow {
            id,
            kind,
            output: self.output.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_reports() {
        let output = Output::buffer();
        let frame = HostFrame::new("target", output.clone());
        frame.set_source("https://example.com/");
        frame.post_message(WireMessage::text("hello"));
        frame.reload();

        assert_eq!(
            output.lines(),
            vec![
                json!({"surface": "target", "source": "https://example.com/"}),
                json!({"surface": "target", "message": "hello"}),
                json!({"surface": "target", "reload": true}),
            ]
        );
    }

    #[test]
    fn test_opener() {
        let output = Output::buffer();
        let opener = HostOpener::new(output.clone(), false);
        let window = opener.open(PopupKind::Tab, "/lib/devtools-popup", "#000000").unwrap();
        window.close();

        let lines = output.lines();
        assert_eq!(lines[0]["event"], "open");
        assert_eq!(lines[0]["kind"], "tab");
        assert_eq!(lines[1]["event"], "close");
        assert_eq!(lines[1]["window"], 1);

        let blocked = HostOpener::new(Output::buffer(), true);
        assert!(blocked.open(PopupKind::Pip, "/", "#000").is_err());
    }
}
