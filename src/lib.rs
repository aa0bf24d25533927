//! # reconflow - An Adaptive Reconnaissance Pipeline
//!
//! reconflow drives a fixed sequence of external discovery tools against
//! one or more root domains and persists every intermediate artifact in a
//! per-session directory. After probing live hosts for web application
//! firewalls it picks one throttling profile for the rest of the session,
//! and it chooses nuclei templates per host from the detected technologies.
//!
//! ## Features
//!
//! - **Fail-open stages**: a failing or timed-out tool never aborts the scan
//! - **WAF-adaptive throttling**: one aggressive or stealthy profile per session
//! - **Technology-targeted scanning**: hosts grouped by identical template sets
//! - **Wildcard DNS filtering**: random-label probes, unresolvable hosts kept
//! - **Session history**: JSON reports, prefix lookup, export to JSON/CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use reconflow::config::AppSettings;
//! use reconflow::pipeline::Pipeline;
//! use reconflow::session::ScanSession;
//! use reconflow::types::Target;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let targets = vec![Target::sanitize("example.com").unwrap()];
//!     let mut session = ScanSession::create(std::path::Path::new("."), targets)?;
//!     let pipeline = Pipeline::with_defaults(AppSettings::default());
//!     for outcome in pipeline.run(&mut session).await {
//!         println!("{}: {:?}", outcome.stage, outcome.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Targets, session ids and host records
//! - [`exec`] - External command execution behind the `Executor` trait
//! - [`session`] - Session state and the artifact store
//! - [`pipeline`] - The stage orchestrator and tool invocations
//! - [`waf`], [`wildcard`], [`templates`] - Detection and planning logic
//! - [`config`] - Settings and throttling profiles
//! - [`storage`] - Session history persistence
//! - [`output`] - Plain, JSON and CSV rendering

pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod output;
pub mod pacing;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod storage;
pub mod templates;
pub mod types;
pub mod waf;
pub mod wildcard;

// Re-export commonly used types
pub use error::{CliError, StageError};
pub use pipeline::{Pipeline, Stage, StageOutcome};
pub use report::Report;
pub use session::ScanSession;
pub use types::{SessionId, Target};
