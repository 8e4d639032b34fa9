//! Persisted preferences.
//!
//! Small string key/value pairs that outlive a session, the equivalent of
//! the cookies the web shell keeps for dock position, panel sizes and color.

use common::ShellResult;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Dock position key.
pub const DOCK_POSITION: &str = "dock:position";
/// Panel size ratios key.
pub const PANEL_LAYOUT: &str = "react-resizable-panels:layout";
/// Primary color key.
pub const THEME_COLOR: &str = "__color";

/// Key/value preference storage.
pub trait Preferences: Send {
    /// Get the value for the given key.
    fn get(&self, key: &str) -> Option<String>;

    /// Set a value for the given key.
    fn set(&mut self, key: &str, value: &str) -> ShellResult<()>;

    /// Remove the value for the given key.
    fn remove(&mut self, key: &str) -> ShellResult<()>;
}

/// Memory-backed preferences.
#[derive(Clone, Debug, Default)]
pub struct MemoryPreferences {
    data: BTreeMap<String, String>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with initial values.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> ShellResult<()> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> ShellResult<()> {
        self.data.remove(key);
        Ok(())
    }
}

/// Preferences stored as a JSON object in a file, rewritten on every change.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    data: BTreeMap<String, String>,
}

impl FilePreferences {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> ShellResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), keys = data.len(), "loaded preferences");
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> ShellResult<()> {
        let text = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl Preferences for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> ShellResult<()> {
        if self.data.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.data.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> ShellResult<()> {
        if self.data.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_preferences() {
        let mut prefs = MemoryPreferences::new().with(DOCK_POSITION, "left");
        assert_eq!(prefs.get(DOCK_POSITION).as_deref(), Some("left"));

        prefs.set(THEME_COLOR, "#ff0000").unwrap();
        assert_eq!(prefs.len(), 2);

        prefs.remove(DOCK_POSITION).unwrap();
        assert!(prefs.get(DOCK_POSITION).is_none());
    }

    #[test]
    fn test_file_preferences_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut prefs = FilePreferences::open(&path).unwrap();
        assert!(prefs.get(DOCK_POSITION).is_none());
        prefs.set(DOCK_POSITION, "bottom").unwrap();
        prefs.set(PANEL_LAYOUT, "[60,40]").unwrap();

        let reopened = FilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get(DOCK_POSITION).as_deref(), Some("bottom"));
        assert_eq!(reopened.get(PANEL_LAYOUT).as_deref(), Some("[60,40]"));
    }

    #[test]
    fn test_file_preferences_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();

        assert!(FilePreferences::open(&path).is_err());
    }
}
