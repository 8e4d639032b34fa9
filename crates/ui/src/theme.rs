//! Theme color.

use common::{Color, ShellResult};

use crate::preferences::{self, Preferences};

/// Primary color used until the user picks one.
pub const DEFAULT_PRIMARY: &str = "#3b82f6";

/// Validate a user supplied primary color, returning it trimmed.
///
/// The color is kept in the form the user gave (hex or name) because it is
/// handed verbatim to the target page and window chrome.
pub fn parse_primary(input: &str) -> ShellResult<String> {
    let trimmed = input.trim();
    trimmed.parse::<Color>()?;
    Ok(trimmed.to_string())
}

/// Read the persisted primary color, ignoring anything unparseable.
pub fn load_primary(prefs: &dyn Preferences) -> String {
    prefs
        .get(preferences::THEME_COLOR)
        .and_then(|c| parse_primary(&c).ok())
        .unwrap_or_else(|| DEFAULT_PRIMARY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryPreferences;

    #[test]
    fn test_parse_primary() {
        assert_eq!(parse_primary(" #ff0000 ").unwrap(), "#ff0000");
        assert_eq!(parse_primary("teal").unwrap(), "teal");
        assert!(parse_primary("url(javascript:alert(1))").is_err());
    }

    #[test]
    fn test_load_primary() {
        assert_eq!(load_primary(&MemoryPreferences::new()), DEFAULT_PRIMARY);
        let prefs = MemoryPreferences::new().with(preferences::THEME_COLOR, "#10b981");
        assert_eq!(load_primary(&prefs), "#10b981");
        let prefs = MemoryPreferences::new().with(preferences::THEME_COLOR, "???");
        assert_eq!(load_primary(&prefs), DEFAULT_PRIMARY);
    }
}
