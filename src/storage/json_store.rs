//! JSON-based session history.
//!
//! Stores each finished scan's report as a separate JSON file named after
//! its session id. Supports listing, prefix lookup and pruning.

use crate::config::Paths;
use crate::error::{StorageError, StorageResult};
use crate::report::Report;
use crate::types::SessionId;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

/// JSON file-based report storage.
pub struct ReportStore {
    sessions_dir: PathBuf,
}

impl ReportStore {
    /// Open the store in the default data directory.
    pub fn new(paths: &Paths) -> StorageResult<Self> {
        Self::at(paths.sessions_dir())
    }

    /// Open a store rooted at `sessions_dir`, creating it if needed.
    pub fn at(sessions_dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let sessions_dir = sessions_dir.into();
        fs::create_dir_all(&sessions_dir)
            .map_err(|e| StorageError::DirectoryError(e.to_string()))?;
        Ok(Self { sessions_dir })
    }

    /// Save a report.
    pub fn save(&self, report: &Report) -> StorageResult<()> {
        let file = self.report_file(&report.session_id);
        let content = serde_json::to_string_pretty(report)?;
        fs::write(&file, content).map_err(|e| StorageError::SaveFailed(e.to_string()))
    }

    /// Load a report by session id.
    pub fn load(&self, id: &SessionId) -> StorageResult<Report> {
        let file = self.report_file(id);
        if !file.exists() {
            return Err(StorageError::SessionNotFound(id.to_string()));
        }

        let content =
            fs::read_to_string(&file).map_err(|e| StorageError::LoadFailed(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| StorageError::LoadFailed(e.to_string()))
    }

    /// Find a report by id prefix (with or without hyphens).
    pub fn find_by_prefix(&self, prefix: &str) -> StorageResult<Report> {
        let matches: Vec<_> = self
            .list_ids()?
            .into_iter()
            .filter(|id| id.matches_prefix(prefix))
            .collect();

        match matches.as_slice() {
            [] => Err(StorageError::SessionNotFound(prefix.to_string())),
            [id] => self.load(id),
            _ => Err(StorageError::AmbiguousPrefix {
                prefix: prefix.to_string(),
                matches: matches.len(),
            }),
        }
    }

    /// List all stored session ids.
    pub fn list_ids(&self) -> StorageResult<Vec<SessionId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.sessions_dir)
            .map_err(|e| StorageError::DirectoryError(e.to_string()))?
        {
            let entry = entry.map_err(|e| StorageError::DirectoryError(e.to_string()))?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    if let Ok(id) = stem.to_string_lossy().parse::<SessionId>() {
                        ids.push(id);
                    }
                }
            }
        }

        Ok(ids)
    }

    /// All readable reports, most recent first.
    pub fn list(&self) -> StorageResult<Vec<Report>> {
        let mut reports: Vec<Report> = self
            .list_ids()?
            .iter()
            .filter_map(|id| self.load(id).ok())
            .collect();
        reports.sort_by(|a, b| b.scan_time.cmp(&a.scan_time));
        Ok(reports)
    }

    /// The `count` most recent reports.
    pub fn list_recent(&self, count: usize) -> StorageResult<Vec<Report>> {
        let mut reports = self.list()?;
        reports.truncate(count);
        Ok(reports)
    }

    pub fn delete(&self, id: &SessionId) -> StorageResult<()> {
        let file = self.report_file(id);
        if !file.exists() {
            return Err(StorageError::SessionNotFound(id.to_string()));
        }
        fs::remove_file(&file).map_err(|e| StorageError::SaveFailed(e.to_string()))
    }

    /// Delete reports of scans started longer than `max_age` ago.
    pub fn cleanup(&self, max_age: chrono::Duration) -> StorageResult<usize> {
        let cutoff = Utc::now() - max_age;
        let mut deleted = 0;

        for report in self.list()? {
            if report.scan_time < cutoff {
                self.delete(&report.session_id)?;
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    /// Delete every stored report.
    pub fn clear(&self) -> StorageResult<usize> {
        let ids = self.list_ids()?;
        for id in &ids {
            self.delete(id)?;
        }
        Ok(ids.len())
    }

    pub fn stats(&self) -> StorageResult<StorageStats> {
        let reports = self.list()?;
        let total_size: u64 = self
            .list_ids()?
            .iter()
            .filter_map(|id| fs::metadata(self.report_file(id)).ok())
            .map(|m| m.len())
            .sum();

        Ok(StorageStats {
            session_count: reports.len(),
            total_size_bytes: total_size,
            oldest_session: reports.last().map(|r| r.scan_time),
            newest_session: reports.first().map(|r| r.scan_time),
        })
    }

    fn report_file(&self, id: &SessionId) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", id))
    }
}

/// Storage statistics.
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub session_count: usize,
    pub total_size_bytes: u64,
    pub oldest_session: Option<DateTime<Utc>>,
    pub newest_session: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Stats;
    use std::collections::BTreeMap;

    fn report(started: DateTime<Utc>) -> Report {
        Report {
            tool: "reconflow".to_string(),
            version: "0.1.0".to_string(),
            session_id: SessionId::new(),
            scan_time: started,
            completed_at: started + chrono::Duration::seconds(90),
            session_dir: PathBuf::from("/tmp/scan"),
            profile: None,
            targets: vec!["example.com".to_string()],
            summary: Stats::new(),
            stats: BTreeMap::new(),
            waf_detection: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    #[test]
    fn test_save_load_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::at(dir.path()).unwrap();
        let r = report(Utc::now());
        store.save(&r).unwrap();

        let loaded = store.load(&r.session_id).unwrap();
        assert_eq!(loaded.targets, r.targets);

        let short = r.session_id.short();
        let found = store.find_by_prefix(&short).unwrap();
        assert_eq!(found.session_id, r.session_id);
        assert!(matches!(
            store.find_by_prefix("zzzz"),
            Err(StorageError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_ambiguous_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::at(dir.path()).unwrap();
        store.save(&report(Utc::now())).unwrap();
        store.save(&report(Utc::now())).unwrap();
        assert!(matches!(
            store.find_by_prefix(""),
            Err(StorageError::AmbiguousPrefix { matches: 2, .. })
        ));
    }

    #[test]
    fn test_list_recent_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ReportStore::at(dir.path()).unwrap();
        let old = report(Utc::now() - chrono::Duration::days(40));
        let new = report(Utc::now());
        store.save(&old).unwrap();
        store.save(&new).unwrap();

        let recent = store.list_recent(1).unwrap();
        assert_eq!(recent[0].session_id, new.session_id);

        assert_eq!(store.cleanup(chrono::Duration::days(30)).unwrap(), 1);
        assert_eq!(store.list_ids().unwrap(), vec![new.session_id]);

        let stats = store.stats().unwrap();
        assert_eq!(stats.session_count, 1);
        assert!(stats.total_size_bytes > 0);

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.list().unwrap().is_empty());
    }
}
