//! Scan report: everything an external renderer needs about one session.

use crate::config::ProfileKind;
use crate::session::{Artifact, ScanSession, Stats};
use crate::types::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

pub const TOOL_NAME: &str = "reconflow";
pub const REPORT_FILE: &str = "report.json";

/// Persisted result of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub tool: String,
    pub version: String,
    pub session_id: SessionId,
    pub scan_time: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub session_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileKind>,
    pub targets: Vec<String>,
    /// Ordered summary rows.
    pub summary: Stats,
    /// `category -> value`, for consumers that want a plain lookup.
    #[serde(default)]
    pub stats: BTreeMap<String, String>,
    pub waf_detection: BTreeMap<String, bool>,
    /// Artifact lines keyed by report category.
    pub files: BTreeMap<String, Vec<String>>,
}

impl Report {
    /// Snapshot the session, reading every reported artifact.
    pub async fn collect(session: &ScanSession) -> io::Result<Self> {
        let mut files = BTreeMap::new();
        for artifact in Artifact::REPORTED {
            let lines = session.store().read_lines(artifact).await?;
            files.insert(artifact.report_key().to_string(), lines);
        }

        Ok(Self {
            tool: TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            session_id: session.id(),
            scan_time: session.started_at(),
            completed_at: Utc::now(),
            session_dir: session.dir().to_path_buf(),
            profile: session.active_profile().map(|p| p.kind),
            targets: session.targets().iter().map(ToString::to_string).collect(),
            summary: session.stats.clone(),
            stats: session.stats.to_map(),
            waf_detection: session.waf_map().clone(),
            files,
        })
    }

    /// Write `report.json` into `dir`.
    pub fn write_to(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(REPORT_FILE);
        let content = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.scan_time
    }

    /// Number of summary rows flagged as alerts.
    pub fn alert_count(&self) -> usize {
        self.summary.iter().filter(|e| e.alert).count()
    }

    pub fn waf_host_count(&self) -> usize {
        self.waf_detection.values().filter(|w| **w).count()
    }

    /// One-line description used in history listings.
    pub fn summary_line(&self) -> String {
        format!(
            "{} - {} alert(s), {} WAF host(s) [{}s]",
            self.targets.join(", "),
            self.alert_count(),
            self.waf_host_count(),
            self.duration().num_seconds()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThrottleProfile;
    use crate::types::Target;

    #[tokio::test]
    async fn test_collect_and_write() {
        let base = tempfile::tempdir().unwrap();
        let target = Target::sanitize("example.com").unwrap();
        let mut session = ScanSession::create(base.path(), vec![target]).unwrap();
        session.stats.set("Total Subdomains", 2);
        session.stats.set_flagged("Nuclei Findings", 1, true);
        session.record_waf(BTreeMap::from([("https://a.example.com".to_string(), true)]));
        session.activate_profile(ThrottleProfile::stealthy());
        session
            .store()
            .write_lines(Artifact::Subdomains, ["a.example.com", "b.example.com"])
            .await
            .unwrap();
        session
            .store()
            .write_lines(Artifact::FuzzTargets, ["https://a.example.com"])
            .await
            .unwrap();

        let report = Report::collect(&session).await.unwrap();
        assert_eq!(report.tool, "reconflow");
        assert_eq!(report.targets, vec!["example.com"]);
        assert_eq!(report.files["subdomains"], vec!["a.example.com", "b.example.com"]);
        assert!(report.files["nuclei_results"].is_empty());
        assert!(!report.files.contains_key("fuzz_targets.txt"));
        assert_eq!(report.files.len(), Artifact::REPORTED.len());
        assert_eq!(report.profile, Some(ProfileKind::Stealthy));
        assert_eq!(report.alert_count(), 1);
        assert_eq!(report.waf_host_count(), 1);

        let path = report.write_to(session.dir()).unwrap();
        let parsed: Report =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.session_id, session.id());
        let categories: Vec<_> = parsed.summary.iter().map(|e| e.category.clone()).collect();
        assert_eq!(categories, vec!["Total Subdomains", "Nuclei Findings"]);
        assert_eq!(parsed.stats["Total Subdomains"], "2");
        assert_eq!(parsed.stats["Nuclei Findings"], "1");

        let json: serde_json::Value = serde_json::to_value(&report).unwrap();
        assert!(json["summary"].is_array());
        assert_eq!(json["stats"]["Total Subdomains"], "2");
    }

    #[test]
    fn test_report_without_stats_map_still_loads() {
        let json = serde_json::json!({
            "tool": "reconflow",
            "version": "0.1.0",
            "session_id": SessionId::new(),
            "scan_time": Utc::now(),
            "completed_at": Utc::now(),
            "session_dir": "/tmp/scan",
            "targets": ["example.com"],
            "summary": [],
            "waf_detection": {},
            "files": {}
        });
        let report: Report = serde_json::from_value(json).unwrap();
        assert!(report.stats.is_empty());
        assert_eq!(report.profile, None);
    }
}
