//! Cross-window wire format and protocol message classification.
//!
//! Messages exchanged between the shell, the target frame and devtools
//! surfaces are either bare strings (devtools protocol JSON) or envelopes of
//! the form `{type, data?, stack?, color?}`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// Envelope `type` values understood by the shell.
pub mod kinds {
    /// Target → shell: payload for the devtools surface.
    pub const TO_DEVTOOLS: &str = "TO_DEVTOOLS";
    /// Shell → target: devtools protocol response.
    pub const FROM_DEVTOOLS: &str = "FROM_DEVTOOLS";
    pub const OPEN_CONSOLE: &str = "open-console";
    pub const OPEN_PROXY: &str = "open-proxy";
    pub const OPEN_DOCS: &str = "open-docs";
    pub const COLOR_CHANGE: &str = "color:change";
    pub const SETTING_TOGGLE: &str = "setting:toggle";
    pub const TOGGLE_DEVTOOLS: &str = "toggle:devtools";
    /// Popup page → shell: its devtools iframe finished loading.
    pub const IFRAME_LOADED: &str = "IFRAME_LOADED";
    /// Popup page → shell: the popup is going away.
    pub const UNLOAD_DEVTOOLS: &str = "UNLOAD_DEVTOOLS";
}

/// Devtools protocol method names.
pub mod methods {
    pub const CONSOLE_API_CALLED: &str = "Runtime.consoleAPICalled";
    pub const ENABLE: &str = "Runtime.enable";
    pub const DISCARD_CONSOLE_ENTRIES: &str = "Runtime.discardConsoleEntries";
}

/// A message crossing a window boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireMessage {
    /// Bare string, usually devtools protocol JSON.
    Text(String),
    /// Typed envelope.
    Envelope(Envelope),
}

impl WireMessage {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn envelope(kind: &str, data: Value) -> Self {
        Self::Envelope(Envelope::new(kind).with_data(data))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Envelope(_) => None,
        }
    }

    pub fn as_envelope(&self) -> Option<&Envelope> {
        match self {
            Self::Text(_) => None,
            Self::Envelope(e) => Some(e),
        }
    }
}

/// Typed cross-window envelope.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Stack trace of a console capture. A `null` stack still marks a capture.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack: Option<Value>,
    /// Theme color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// `Some` whenever the key is present, `null` included.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Envelope {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_stack(mut self, stack: Value) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.color = Some(color.to_string());
        self
    }

    /// The payload when it is a string.
    pub fn data_str(&self) -> Option<&str> {
        self.data.as_ref().and_then(Value::as_str)
    }
}

/// Recognized protocol methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolMethod {
    /// A console event to buffer.
    ConsoleApiCalled,
    /// The devtools surface is ready for the backlog.
    Enable,
    /// Drop the buffered console events.
    DiscardEntries,
    /// Anything else; passed through untouched.
    Unknown,
}

impl ProtocolMethod {
    pub fn from_name(name: &str) -> Self {
        match name {
            methods::CONSOLE_API_CALLED => Self::ConsoleApiCalled,
            methods::ENABLE => Self::Enable,
            methods::DISCARD_CONSOLE_ENTRIES => Self::DiscardEntries,
            _ => Self::Unknown,
        }
    }
}

/// Result of [`classify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classified {
    pub method: ProtocolMethod,
    /// The string payload that was inspected.
    pub payload: String,
}

/// Classify a message by the `method` field of its JSON payload.
///
/// The payload is the message itself when it is a string, or the envelope's
/// `data` when that is a string. Anything unparseable is `Unknown`.
pub fn classify(message: &WireMessage) -> Classified {
    let payload = match message {
        WireMessage::Text(s) => s.as_str(),
        WireMessage::Envelope(e) => e.data_str().unwrap_or_default(),
    };

    let method = serde_json::from_str::<Value>(payload)
        .ok()
        .as_ref()
        .and_then(|v| v.get("method"))
        .and_then(Value::as_str)
        .map_or(ProtocolMethod::Unknown, ProtocolMethod::from_name);

    Classified {
        method,
        payload: payload.to_string(),
    }
}

/// Whether `raw` looks like a devtools protocol response: valid JSON with a
/// quoted `"id"` field somewhere in it.
pub fn is_protocol_response(raw: &str) -> bool {
    raw.contains("\"id\"") && serde_json::from_str::<Value>(raw).is_ok()
}

/// Console call type as reported by the target frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsoleType {
    Log,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
    UnhandledError,
    UnhandledRejection,
}

impl ConsoleType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "log" => Some(Self::Log),
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            "trace" => Some(Self::Trace),
            "unhandledError" => Some(Self::UnhandledError),
            "unhandledRejection" => Some(Self::UnhandledRejection),
            _ => None,
        }
    }

    /// Uncaught errors and rejections display as plain errors.
    pub fn normalized(self) -> Self {
        match self {
            Self::UnhandledError | Self::UnhandledRejection => Self::Error,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::UnhandledError => "unhandledError",
            Self::UnhandledRejection => "unhandledRejection",
        }
    }
}

/// One frame of a captured stack.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub line_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Captured stack, innermost frame first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTrace {
    #[serde(default)]
    pub call_frames: Vec<CallFrame>,
}

impl StackTrace {
    /// Read a stack leniently; malformed input yields an empty stack.
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        let frames: Vec<Value> = self
            .call_frames
            .iter()
            .map(|frame| {
                let mut obj = Map::new();
                obj.insert("functionName".into(), json!(frame.function_name));
                obj.insert("lineNumber".into(), json!(frame.line_number));
                if let Some(col) = frame.column_number {
                    obj.insert("columnNumber".into(), json!(col));
                }
                if let Some(url) = &frame.url {
                    obj.insert("url".into(), json!(url));
                }
                Value::Object(obj)
            })
            .collect();
        json!({ "callFrames": frames })
    }
}

/// One serialized `Runtime.consoleAPICalled` event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LogEntry(String);

impl LogEntry {
    /// Wrap an already serialized event.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build an event from a console capture of the target frame.
    pub fn from_capture(kind: ConsoleType, args: &[Value], stack: &StackTrace, timestamp: f64) -> Self {
        let event = json!({
            "method": methods::CONSOLE_API_CALLED,
            "params": {
                "type": kind.normalized().as_str(),
                "args": args.iter().map(remote_object).collect::<Vec<_>>(),
                "stackTrace": stack.to_value(),
                "timestamp": timestamp,
            }
        });
        Self(event.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Describe a captured console argument the way the devtools frontend
/// expects a remote object.
fn remote_object(value: &Value) -> Value {
    match value {
        Value::String(s) => json!({ "type": "string", "value": s }),
        Value::Number(n) => json!({ "type": "number", "value": n }),
        Value::Bool(b) => json!({ "type": "boolean", "value": b }),
        Value::Null => json!({ "type": "object", "subtype": "null", "value": null }),
        Value::Array(_) => json!({
            "type": "object",
            "subtype": "array",
            "className": "Array",
            "value": value,
        }),
        Value::Object(obj) => match serialized_error(obj) {
            Some((name, description)) => json!({
                "type": "object",
                "subtype": "error",
                "description": description,
                "className": name,
            }),
            None => json!({ "type": "object", "className": "Object", "value": value }),
        },
    }
}

/// `(name, stack-or-message)` when `obj` is a serialized Error.
fn serialized_error(obj: &Map<String, Value>) -> Option<(String, String)> {
    let message = obj.get("message")?.as_str()?;
    let name = obj.get("name").and_then(Value::as_str);
    let stack = obj.get("stack").and_then(Value::as_str);
    if name.is_none() && stack.is_none() {
        return None;
    }
    Some((
        name.unwrap_or("Error").to_string(),
        stack.unwrap_or(message).to_string(),
    ))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> f64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}
