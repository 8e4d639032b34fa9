//! Devtools docking and panel layout.

use common::ShellResult;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::preferences::{self, Preferences};

/// Devtools panel extent below which a finished drag collapses the panel.
pub const MIN_DEVTOOLS_EXTENT: f64 = 100.0;

/// Smallest devtools panel share restored when devtools opens.
pub const MIN_DEVTOOLS_RATIO: f64 = 25.0;

/// Default `[target, devtools]` panel size ratios.
pub const DEFAULT_LAYOUT: [f64; 2] = [75.0, 25.0];

/// Dock position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DockPosition {
    #[default]
    Right,
    Bottom,
    Left,
    /// Detached into its own window.
    Popout,
}

impl DockPosition {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "right" => Some(Self::Right),
            "bottom" => Some(Self::Bottom),
            "left" => Some(Self::Left),
            "popout" => Some(Self::Popout),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Right => "right",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Popout => "popout",
        }
    }

    /// Docked inside the shell window.
    pub fn is_docked(self) -> bool {
        !matches!(self, Self::Popout)
    }

    /// Panels stacked top to bottom.
    pub fn is_vertical(self) -> bool {
        matches!(self, Self::Bottom)
    }

    /// Devtools panel placed before the target.
    pub fn is_reversed(self) -> bool {
        matches!(self, Self::Left)
    }

    /// Read the persisted position, falling back to the default.
    pub fn load(prefs: &dyn Preferences) -> Self {
        prefs
            .get(preferences::DOCK_POSITION)
            .and_then(|s| Self::parse(&s))
            .unwrap_or_default()
    }

    pub fn store(self, prefs: &mut dyn Preferences) -> ShellResult<()> {
        prefs.set(preferences::DOCK_POSITION, self.as_str())
    }
}

impl fmt::Display for DockPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a layout change asks of the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutAction {
    None,
    /// Devtools panel dragged too small; close devtools.
    Collapse,
}

/// Size ratios of the target and devtools panels.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    sizes: [f64; 2],
}

impl Layout {
    pub fn new(sizes: [f64; 2]) -> Self {
        Self { sizes }
    }

    /// Read persisted ratios; anything unreadable yields the default.
    pub fn load(prefs: &dyn Preferences) -> Self {
        let sizes = prefs
            .get(preferences::PANEL_LAYOUT)
            .and_then(|s| serde_json::from_str::<Vec<f64>>(&s).ok())
            .and_then(|v| <[f64; 2]>::try_from(v).ok())
            .unwrap_or(DEFAULT_LAYOUT);
        Self { sizes }
    }

    pub fn sizes(&self) -> [f64; 2] {
        self.sizes
    }

    pub fn devtools_ratio(&self) -> f64 {
        self.sizes[1]
    }

    /// Record ratios reported after a layout pass and persist them. Ratios
    /// with a zero devtools share are persisted but not adopted.
    pub fn on_layout(&mut self, sizes: &[f64], prefs: &mut dyn Preferences) -> ShellResult<()> {
        let encoded = serde_json::to_string(sizes)?;
        prefs.set(preferences::PANEL_LAYOUT, &encoded)?;

        if let [target, devtools] = *sizes {
            if devtools != 0.0 {
                self.sizes = [target, devtools];
            }
        }
        Ok(())
    }

    /// A resize drag finished with the devtools panel `extent` units wide
    /// (or tall, when docked to the bottom).
    pub fn on_drag_end(&mut self, extent: f64) -> LayoutAction {
        if extent > 0.0 && extent < MIN_DEVTOOLS_EXTENT {
            self.sizes = [100.0, 0.0];
            LayoutAction::Collapse
        } else {
            LayoutAction::None
        }
    }

    /// Make sure an opening devtools panel is usable. Returns whether the
    /// ratios were changed.
    pub fn ensure_visible(&mut self) -> bool {
        if self.sizes[1] < MIN_DEVTOOLS_RATIO {
            self.sizes = [100.0 - MIN_DEVTOOLS_RATIO, MIN_DEVTOOLS_RATIO];
            true
        } else {
            false
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(DEFAULT_LAYOUT)
    }
}
