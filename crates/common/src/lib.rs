//! Common utilities and types shared by the devtools shell crates.

pub mod color;
pub mod error;

pub use color::Color;
pub use error::{ShellError, ShellResult};
