//! Address bar.
//!
//! Validates what the user typed and hands it to the relay over the bus.

use common::{ShellError, ShellResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::bus::MessageBus;
use crate::commands::events;

/// Optional http(s) scheme, a dotted host ending in two or more letters or an
/// IPv4 address, then optional port, path, query and fragment.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(https?://)?(([a-z0-9]([a-z0-9-]*[a-z0-9])*\.?)+[a-z]{2,}|((\d{1,3}\.){3}\d{1,3}))(:\d+)?(/[-a-z0-9%_.~+]*)*(\?[;&a-z0-9%_.~+=-]*)?(#[-a-z0-9]*)?$",
    )
    .expect("valid URL pattern")
});

/// Check a user-typed address and return it as a URL, assuming `https://`
/// when no scheme was given.
pub fn validate_url(input: &str) -> ShellResult<Url> {
    let input = input.trim();
    if input.is_empty() || !URL_PATTERN.is_match(input) {
        return Err(ShellError::invalid_url(input));
    }

    let lower = input.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(Url::parse(input)?)
    } else {
        Ok(Url::parse(&format!("https://{}", input))?)
    }
}

/// Address bar state.
pub struct AddressBar {
    /// Bus the bar publishes on.
    bus: MessageBus,
    /// Input text.
    input: String,
    /// Last submitted address was https.
    secure: bool,
}

impl AddressBar {
    /// Create a new address bar.
    pub fn new(bus: MessageBus) -> Self {
        Self {
            bus,
            input: String::new(),
            secure: false,
        }
    }

    /// Get the input text.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Set the input text.
    pub fn set_input(&mut self, input: &str) {
        self.input = input.to_string();
    }

    /// Whether the last submitted address used https.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Submit the current input. Validation is left to the relay.
    pub fn submit(&mut self) {
        self.secure = self.input.starts_with("https://");
        tracing::debug!(url = %self.input, "submitting address");
        self.bus
            .publish(events::LOAD_FRAME, &[Value::String(self.input.clone())]);
    }

    /// Ask the relay to reload the target page.
    pub fn refresh(&self) {
        self.bus.publish(events::REFRESH_FRAME, &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_accepts_common_addresses() {
        for input in [
            "example.com",
            "https://example.com",
            "http://sub.example.co.uk:8080/path/to?q=1&x=y#frag",
            "192.168.0.1",
            "http://127.0.0.1:3000/app",
            "localhost",
            "HTTPS://EXAMPLE.COM",
        ] {
            assert!(validate_url(input).is_ok(), "{}", input);
        }
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        for input in [
            "",
            "   ",
            "ftp://example.com",
            "exa mple.com",
            "example.c",
            "javascript:alert(1)",
            "http://",
            "-example.com",
        ] {
            assert!(validate_url(input).is_err(), "{}", input);
        }
    }

    #[test]
    fn test_missing_scheme_becomes_https() {
        let url = validate_url("example.com/docs").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs");

        let url = validate_url("http://example.com").unwrap();
        assert_eq!(url.scheme(), "http");
    }

    #[test]
    fn test_submit_publishes_load_frame() {
        let bus = MessageBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bus.subscribe(events::LOAD_FRAME, move |args| sink.lock().extend_from_slice(args));

        let mut bar = AddressBar::new(bus);
        bar.set_input("https://example.com");
        bar.submit();

        assert!(bar.is_secure());
        assert_eq!(*seen.lock(), vec![Value::String("https://example.com".into())]);
    }

    #[test]
    fn test_refresh_publishes_refresh_frame() {
        let bus = MessageBus::new();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        bus.subscribe(events::REFRESH_FRAME, move |args| {
            assert!(args.is_empty());
            *c.lock() += 1;
        });

        AddressBar::new(bus).refresh();
        assert_eq!(*count.lock(), 1);
    }
}
