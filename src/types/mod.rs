//! Core type definitions using newtype patterns for type safety.
//!
//! A `Target` can only be built through sanitization, so every domain the
//! pipeline hands to a tool has already been validated.

mod host;
mod session_id;
mod target;

pub use host::{origin_of, parse_tech_line, HostRecord};
pub use session_id::{SessionId, SessionIdError};
pub use target::{filter_in_scope, host_of, load_targets, web_url, Target, TargetError, TargetList};
