//! Session identifiers.
//!
//! A `SessionId` names one scan run. It pairs a random UUID with the start
//! time so the on-disk session directory sorts chronologically.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 characters, used on the terminal and in directory names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// Directory name for a session started at `started_at`.
    ///
    /// Formatted as `scan_<YYYYmmdd_HHMMSS>_<short id>` in local time.
    pub fn dir_name(&self, started_at: DateTime<Utc>) -> String {
        let local: DateTime<Local> = started_at.into();
        format!("scan_{}_{}", local.format("%Y%m%d_%H%M%S"), self.short())
    }

    /// Whether the textual form of this id starts with `prefix`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let prefix = prefix.to_ascii_lowercase();
        self.0.to_string().starts_with(&prefix) || self.0.simple().to_string().starts_with(&prefix)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SessionIdError::InvalidFormat(s.to_string()))
    }
}

/// Error type for SessionId parsing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionIdError {
    #[error("invalid session ID: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_session_id_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_ne!(id, SessionId::new());
    }

    #[test]
    fn test_dir_name_shape() {
        let id = SessionId::new();
        let started = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let name = id.dir_name(started);
        assert!(name.starts_with("scan_2024030"));
        assert!(name.ends_with(&id.short()));
    }

    #[test]
    fn test_prefix_matching() {
        let id = SessionId::new();
        assert!(id.matches_prefix(&id.short()));
        assert!(id.matches_prefix(&id.to_string()[..13]));
        assert!(!id.matches_prefix("zzzz"));
    }

    #[test]
    fn test_invalid_id() {
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }
}
