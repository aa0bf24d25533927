//! Throttling profiles.
//!
//! A scan runs under exactly one [`ThrottleProfile`], chosen once after WAF
//! detection. If any probed host sits behind a WAF the whole session drops
//! to the stealthy profile, including hosts that are not protected
//! themselves.

use crate::error::{ConfigError, ConfigResult};
use crate::pacing::JitterWindow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which of the two fixed profiles is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// No WAF seen: higher rates, minimal delay.
    Aggressive,
    /// WAF seen somewhere: low rates, added jitter and per-request delay.
    Stealthy,
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggressive => write!(f, "aggressive"),
            Self::Stealthy => write!(f, "stealthy"),
        }
    }
}

impl FromStr for ProfileKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" | "normal" => Ok(Self::Aggressive),
            "stealthy" | "stealth" => Ok(Self::Stealthy),
            _ => Err(ConfigError::UnknownProfile(s.to_string())),
        }
    }
}

/// Immutable rate, concurrency and delay settings for every network stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleProfile {
    pub kind: ProfileKind,
    /// httpx requests per second.
    pub httpx_rate_limit: u32,
    /// httpx delay between requests, seconds.
    pub httpx_delay: u32,
    /// naabu packets per second.
    pub naabu_rate: u32,
    pub ferox_threads: u32,
    /// feroxbuster delay between requests, seconds.
    pub ferox_delay: u32,
    /// nuclei requests per second.
    pub nuclei_rate: u32,
    /// nuclei hosts analyzed in parallel per template.
    pub nuclei_bulk: u32,
    pub katana_concurrency: u32,
    /// katana delay between requests, seconds.
    pub katana_delay: u32,
    /// Delay applied before each tool launch and probe.
    pub jitter: JitterWindow,
    /// Worker pool size for in-process probes.
    pub probe_concurrency: usize,
    /// In-process probes started per second across the pool.
    pub probe_rate: u32,
}

impl ThrottleProfile {
    /// httpx `-delay` value, absent when the profile does not pause.
    pub fn httpx_delay_arg(&self) -> Option<String> {
        (self.httpx_delay > 0).then(|| format!("{}s", self.httpx_delay))
    }

    /// Select the profile for a session.
    pub fn derive(any_waf_detected: bool) -> Self {
        if any_waf_detected {
            Self::stealthy()
        } else {
            Self::aggressive()
        }
    }

    pub fn aggressive() -> Self {
        Self {
            kind: ProfileKind::Aggressive,
            httpx_rate_limit: 50,
            httpx_delay: 0,
            naabu_rate: 100,
            ferox_threads: 30,
            ferox_delay: 0,
            nuclei_rate: 50,
            nuclei_bulk: 20,
            katana_concurrency: 20,
            katana_delay: 0,
            jitter: JitterWindow::new(200, 1_000),
            probe_concurrency: 5,
            probe_rate: 20,
        }
    }

    pub fn stealthy() -> Self {
        Self {
            kind: ProfileKind::Stealthy,
            httpx_rate_limit: 2,
            httpx_delay: 1,
            naabu_rate: 5,
            ferox_threads: 5,
            ferox_delay: 2,
            nuclei_rate: 10,
            nuclei_bulk: 5,
            katana_concurrency: 5,
            katana_delay: 2,
            jitter: JitterWindow::new(1_000, 4_000),
            probe_concurrency: 2,
            probe_rate: 2,
        }
    }

    /// Both fixed profiles.
    pub fn builtins() -> [Self; 2] {
        [Self::aggressive(), Self::stealthy()]
    }

    /// Look up a builtin profile by name.
    pub fn by_name(name: &str) -> ConfigResult<Self> {
        Ok(match name.parse::<ProfileKind>()? {
            ProfileKind::Aggressive => Self::aggressive(),
            ProfileKind::Stealthy => Self::stealthy(),
        })
    }

    /// Threads for the deep fuzzing pass: ten fewer than shallow, at least three.
    pub fn deep_ferox_threads(&self) -> u32 {
        self.ferox_threads.saturating_sub(10).max(3)
    }

    /// Delay for the deep fuzzing pass: never below one second.
    pub fn deep_ferox_delay(&self) -> u32 {
        self.ferox_delay.max(1)
    }

    pub fn is_stealthy(&self) -> bool {
        self.kind == ProfileKind::Stealthy
    }
}

impl Default for ThrottleProfile {
    fn default() -> Self {
        Self::aggressive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_selects_by_waf_presence() {
        assert_eq!(ThrottleProfile::derive(true), ThrottleProfile::stealthy());
        assert_eq!(ThrottleProfile::derive(false), ThrottleProfile::aggressive());
    }

    #[test]
    fn test_stealthy_is_slower_everywhere() {
        let fast = ThrottleProfile::aggressive();
        let slow = ThrottleProfile::stealthy();
        assert!(slow.httpx_rate_limit < fast.httpx_rate_limit);
        assert!(slow.naabu_rate < fast.naabu_rate);
        assert!(slow.nuclei_rate < fast.nuclei_rate);
        assert!(slow.ferox_threads < fast.ferox_threads);
        assert!(slow.katana_concurrency < fast.katana_concurrency);
        assert!(slow.probe_concurrency < fast.probe_concurrency);
        assert!(slow.jitter.min_ms > fast.jitter.min_ms);
        assert!(slow.katana_delay > fast.katana_delay);
    }

    #[test]
    fn test_probe_pools_stay_small() {
        for profile in ThrottleProfile::builtins() {
            assert!((2..=5).contains(&profile.probe_concurrency));
        }
    }

    #[test]
    fn test_deep_pass_settings() {
        let fast = ThrottleProfile::aggressive();
        assert_eq!(fast.deep_ferox_threads(), 20);
        assert_eq!(fast.deep_ferox_delay(), 1);

        let slow = ThrottleProfile::stealthy();
        assert_eq!(slow.deep_ferox_threads(), 3);
        assert_eq!(slow.deep_ferox_delay(), 2);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(ThrottleProfile::by_name("stealth").unwrap().kind, ProfileKind::Stealthy);
        assert_eq!(ThrottleProfile::by_name("Aggressive").unwrap().kind, ProfileKind::Aggressive);
        assert!(ThrottleProfile::by_name("turbo").is_err());
    }

    #[test]
    fn test_profile_serialization() {
        let json = serde_json::to_string(&ThrottleProfile::stealthy()).unwrap();
        assert!(json.contains("\"kind\":\"stealthy\""));
        let parsed: ThrottleProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ThrottleProfile::stealthy());
    }
}
