//! Configuration management for reconflow.
//!
//! Provides XDG-compliant settings storage and the two fixed throttling
//! profiles the pipeline switches between.

mod profiles;
mod settings;

pub use profiles::{ProfileKind, ThrottleProfile};
pub use settings::{AppSettings, Paths, ToolTimeouts};
