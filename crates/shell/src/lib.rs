//! Headless devtools shell host.
//!
//! This crate drives a [`ui::Relay`] from line-delimited JSON:
//! - Instructions arrive one per line
//! - Frame and window activity is reported one JSON object per line
//! - Preferences persist to a JSON file between runs

pub mod host;
pub mod session;

pub use host::Output;
pub use session::{Instruction, Session};

/// Shell version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
