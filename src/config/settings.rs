//! Application settings and paths.
//!
//! Manages XDG-compliant paths for configuration and session history, and
//! the JSON settings file that tells the pipeline where its collaborators
//! (templates, wordlists, helper scripts) live.

use crate::error::{ConfigError, ConfigResult};
use directories::{BaseDirs, ProjectDirs};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/reconflow)
    pub config_dir: PathBuf,
    /// Data directory (~/.local/share/reconflow)
    pub data_dir: PathBuf,
}

impl Paths {
    /// Resolve and create the application directories.
    pub fn discover() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "reconflow", "reconflow")
            .ok_or(ConfigError::DirectoryNotFound)?;
        Self::at(project.config_dir(), project.data_dir())
    }

    /// Use explicit directories, creating them if needed.
    pub fn at(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let paths = Self {
            config_dir: config_dir.into(),
            data_dir: data_dir.into(),
        };
        fs::create_dir_all(&paths.config_dir)?;
        fs::create_dir_all(&paths.data_dir)?;
        Ok(paths)
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    /// Get the path to the session history directory.
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }
}

/// Per-tool deadlines, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolTimeouts {
    pub subfinder: u64,
    pub assetfinder: u64,
    pub dns_lookup: u64,
    pub takeover: u64,
    pub live_check: u64,
    pub waf_probe: u64,
    pub port_scan: u64,
    pub waybackurls: u64,
    pub gau: u64,
    pub hakrawler: u64,
    pub katana: u64,
    pub subjs: u64,
    pub js_analysis: u64,
    pub tech_detect: u64,
    pub nuclei: u64,
    pub ferox: u64,
    pub ferox_deep: u64,
    pub sensitive: u64,
    pub http_probe: u64,
    pub paramspider: u64,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            subfinder: 120,
            assetfinder: 60,
            dns_lookup: 10,
            takeover: 180,
            live_check: 300,
            waf_probe: 15,
            port_scan: 300,
            waybackurls: 500,
            gau: 240,
            hakrawler: 180,
            katana: 500,
            subjs: 120,
            js_analysis: 60,
            tech_detect: 240,
            nuclei: 600,
            ferox: 300,
            ferox_deep: 600,
            sensitive: 180,
            http_probe: 10,
            paramspider: 180,
        }
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Root of the nuclei template tree.
    pub templates_root: PathBuf,
    /// Wordlist for the shallow fuzzing pass.
    pub wordlist_common: PathBuf,
    /// Wordlist for the deep fuzzing pass; the pass is skipped if missing.
    pub wordlist_deep: PathBuf,
    /// SecretFinder script; JS secret scanning is skipped if unset.
    pub secretfinder_script: Option<PathBuf>,
    /// LinkFinder script; JS link extraction is skipped if unset.
    pub linkfinder_script: Option<PathBuf>,
    /// Interpreter for the helper scripts.
    pub python: String,
    /// Proxy list handed to tools that support one.
    pub proxy_file: Option<PathBuf>,
    /// Random-label lookups per target during wildcard detection.
    pub wildcard_probes: usize,
    /// Maximum number of live URLs probed for CORS reflection.
    pub cors_probe_limit: usize,
    /// Paths requested on every fuzzable host by the exposure probe.
    pub sensitive_paths: Vec<String>,
    /// Rotated User-Agent strings.
    pub user_agents: Vec<String>,
    pub timeouts: ToolTimeouts,
    /// Default output format for the scan summary.
    pub default_output_format: String,
    /// Save each finished session to the history store.
    pub save_sessions: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        let templates_root = BaseDirs::new()
            .map(|dirs| dirs.home_dir().join("nuclei-templates"))
            .unwrap_or_else(|| PathBuf::from("nuclei-templates"));

        Self {
            templates_root,
            wordlist_common: PathBuf::from("/usr/share/seclists/Discovery/Web-Content/common.txt"),
            wordlist_deep: PathBuf::from(
                "/usr/share/seclists/Discovery/Web-Content/raft-large-directories.txt",
            ),
            secretfinder_script: None,
            linkfinder_script: None,
            python: "python3".to_string(),
            proxy_file: None,
            wildcard_probes: 3,
            cors_probe_limit: 150,
            sensitive_paths: default_sensitive_paths(),
            user_agents: default_user_agents(),
            timeouts: ToolTimeouts::default(),
            default_output_format: "plain".to_string(),
            save_sessions: true,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, falling back to defaults.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let file = paths.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Save settings to the default location.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        let file = paths.settings_file();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&file, content).map_err(|e| ConfigError::WriteFailed {
            path: file,
            reason: e.to_string(),
        })
    }

    /// Pick a User-Agent at random.
    pub fn random_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or(DEFAULT_USER_AGENT)
    }
}

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

fn default_user_agents() -> Vec<String> {
    [
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_3) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36 Edg/121.0.0.0",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        DEFAULT_USER_AGENT,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_sensitive_paths() -> Vec<String> {
    [
        ".env",
        ".git/config",
        ".git/HEAD",
        "config.json",
        "wp-config.php",
        "docker-compose.yml",
        ".dockerenv",
        "application.yml",
        "credentials",
        "secret.key",
        ".htpasswd",
        "id_rsa",
        "backup.sql",
        "dump.sql",
        ".npmrc",
        ".pypirc",
        "swagger.json",
        "swagger.yaml",
        "openapi.json",
        "api-docs",
        "graphql",
        "actuator",
        "actuator/env",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.wildcard_probes, 3);
        assert_eq!(settings.cors_probe_limit, 150);
        assert_eq!(settings.timeouts.nuclei, 600);
        assert_eq!(settings.user_agents.len(), 10);
        assert!(settings.sensitive_paths.contains(&".git/config".to_string()));
    }

    #[test]
    fn test_partial_settings_file_keeps_defaults() {
        let parsed: AppSettings =
            serde_json::from_str(r#"{"cors_probe_limit": 10, "timeouts": {"nuclei": 60}}"#)
                .unwrap();
        assert_eq!(parsed.cors_probe_limit, 10);
        assert_eq!(parsed.timeouts.nuclei, 60);
        assert_eq!(parsed.timeouts.gau, 240);
        assert_eq!(parsed.wildcard_probes, 3);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path().join("config"), dir.path().join("data")).unwrap();

        let mut settings = AppSettings::default();
        settings.python = "python3.12".to_string();
        settings.save(&paths).unwrap();

        let loaded = AppSettings::load(&paths).unwrap();
        assert_eq!(loaded.python, "python3.12");
        assert!(paths.sessions_dir().starts_with(&paths.data_dir));
    }

    #[test]
    fn test_invalid_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.json");
        fs::write(&file, "{ not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(&file),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_random_user_agent_falls_back() {
        let mut settings = AppSettings::default();
        settings.user_agents.clear();
        assert_eq!(settings.random_user_agent(), DEFAULT_USER_AGENT);
    }
}
