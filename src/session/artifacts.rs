//! Newline-delimited artifact files in the session directory.
//!
//! Every write goes through one async mutex, so workers in a stage pool can
//! append concurrently without interleaving partial lines. Appends have
//! `anew` semantics: lines already present are skipped.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A per-category artifact file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Artifact {
    Subdomains,
    Takeovers,
    LiveHosts,
    WafHosts,
    Ports,
    Urls,
    JsFiles,
    Secrets,
    Links,
    TechMap,
    Nuclei,
    Ferox,
    Sensitive,
    CloudBuckets,
    Cors,
    Params,
    // Scratch files, removed when the session ends.
    FuzzTargets,
    DeepTargets,
    FeroxDeep,
    SensitivePatterns,
    ParamSpiderInput,
}

impl Artifact {
    /// Artifacts exposed to report consumers, in report order.
    pub const REPORTED: [Artifact; 16] = [
        Artifact::Subdomains,
        Artifact::Takeovers,
        Artifact::Ports,
        Artifact::LiveHosts,
        Artifact::Urls,
        Artifact::JsFiles,
        Artifact::Secrets,
        Artifact::Links,
        Artifact::Params,
        Artifact::Nuclei,
        Artifact::Ferox,
        Artifact::Cors,
        Artifact::Sensitive,
        Artifact::CloudBuckets,
        Artifact::WafHosts,
        Artifact::TechMap,
    ];

    pub const TEMPORARY: [Artifact; 5] = [
        Artifact::FuzzTargets,
        Artifact::DeepTargets,
        Artifact::FeroxDeep,
        Artifact::SensitivePatterns,
        Artifact::ParamSpiderInput,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Subdomains => "subs.txt",
            Self::Takeovers => "subdomaintakeover.txt",
            Self::LiveHosts => "live.txt",
            Self::WafHosts => "waf_detected.txt",
            Self::Ports => "naabu.txt",
            Self::Urls => "all_urls.txt",
            Self::JsFiles => "js.txt",
            Self::Secrets => "secretfinder.txt",
            Self::Links => "linkfinder.txt",
            Self::TechMap => "tech_map.txt",
            Self::Nuclei => "nuclei.txt",
            Self::Ferox => "ferox.txt",
            Self::Sensitive => "sensitive.txt",
            Self::CloudBuckets => "cloud_buckets.txt",
            Self::Cors => "cors.txt",
            Self::Params => "params_names.txt",
            Self::FuzzTargets => "fuzz_targets.txt",
            Self::DeepTargets => "deep_scan_targets.txt",
            Self::FeroxDeep => "ferox_deep.txt",
            Self::SensitivePatterns => "sensitive_patterns.txt",
            Self::ParamSpiderInput => "for_param_spider.txt",
        }
    }

    /// Key under which the artifact appears in the report.
    pub fn report_key(self) -> &'static str {
        match self {
            Self::Subdomains => "subdomains",
            Self::Takeovers => "takeovers",
            Self::LiveHosts => "live_hosts",
            Self::WafHosts => "waf_hosts",
            Self::Ports => "ports",
            Self::Urls => "urls",
            Self::JsFiles => "js_files",
            Self::Secrets => "secrets",
            Self::Links => "links",
            Self::TechMap => "technologies",
            Self::Nuclei => "nuclei_results",
            Self::Ferox => "ferox_results",
            Self::Sensitive => "sensitive_files",
            Self::CloudBuckets => "cloud_buckets",
            Self::Cors => "cors_results",
            Self::Params => "parameters",
            Self::FuzzTargets
            | Self::DeepTargets
            | Self::FeroxDeep
            | Self::SensitivePatterns
            | Self::ParamSpiderInput => self.file_name(),
        }
    }

    pub fn is_temporary(self) -> bool {
        Self::TEMPORARY.contains(&self)
    }
}

/// Reads and writes the artifact files of one session directory.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, artifact: Artifact) -> PathBuf {
        self.dir.join(artifact.file_name())
    }

    /// Non-empty trimmed lines; a missing file reads as empty.
    pub async fn read_lines(&self, artifact: Artifact) -> io::Result<Vec<String>> {
        read_lines_at(&self.path(artifact)).await
    }

    pub async fn count(&self, artifact: Artifact) -> io::Result<usize> {
        Ok(self.read_lines(artifact).await?.len())
    }

    /// Append lines not already present. Returns how many were added.
    pub async fn append_unique<I, S>(&self, artifact: Artifact, lines: I) -> io::Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.path(artifact);
        let _guard = self.write_lock.lock().await;

        let mut seen: HashSet<String> = read_lines_at(&path).await?.into_iter().collect();
        let mut fresh = String::new();
        let mut added = 0;
        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() || !seen.insert(line.to_string()) {
                continue;
            }
            fresh.push_str(line);
            fresh.push('\n');
            added += 1;
        }

        if added > 0 {
            let mut file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(fresh.as_bytes()).await?;
            file.flush().await?;
        }
        Ok(added)
    }

    /// Replace the artifact's content.
    pub async fn write_lines<I, S>(&self, artifact: Artifact, lines: I) -> io::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.path(artifact);
        let _guard = self.write_lock.lock().await;
        write_lines_at(&path, lines).await
    }

    /// Write a free-form file (e.g. a template group host list) in the session directory.
    pub async fn write_named<I, S>(&self, file_name: &str, lines: I) -> io::Result<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.dir.join(file_name);
        let _guard = self.write_lock.lock().await;
        write_lines_at(&path, lines).await?;
        Ok(path)
    }

    /// Sort and deduplicate in place. Returns the resulting line count.
    pub async fn sort_unique(&self, artifact: Artifact) -> io::Result<usize> {
        let path = self.path(artifact);
        let _guard = self.write_lock.lock().await;
        let mut lines = read_lines_at(&path).await?;
        lines.sort_unstable();
        lines.dedup();
        if lines.is_empty() && !fs::try_exists(&path).await? {
            return Ok(0);
        }
        write_lines_at(&path, &lines).await?;
        Ok(lines.len())
    }

    /// Keep only lines matching `keep`. Returns `(before, after)` counts.
    pub async fn retain<F>(&self, artifact: Artifact, keep: F) -> io::Result<(usize, usize)>
    where
        F: Fn(&str) -> bool,
    {
        let path = self.path(artifact);
        let _guard = self.write_lock.lock().await;
        let lines = read_lines_at(&path).await?;
        let before = lines.len();
        let kept: Vec<String> = lines.into_iter().filter(|l| keep(l)).collect();
        let after = kept.len();
        if before != after {
            write_lines_at(&path, &kept).await?;
        }
        Ok((before, after))
    }

    /// Delete scratch artifacts. Synchronous so it can run from `Drop`.
    pub fn remove_temporary(&self) {
        for artifact in Artifact::TEMPORARY {
            let path = self.path(artifact);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary artifact");
                }
            }
        }
    }
}

async fn read_lines_at(path: &Path) -> io::Result<Vec<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

async fn write_lines_at<I, S>(path: &Path, lines: I) -> io::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }
    fs::write(path, content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_missing_artifact_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert!(store.read_lines(Artifact::Urls).await.unwrap().is_empty());
        assert_eq!(store.count(Artifact::Urls).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_unique_skips_known_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());

        let added = store
            .append_unique(Artifact::Subdomains, ["a.example.com", "b.example.com", "a.example.com"])
            .await
            .unwrap();
        assert_eq!(added, 2);

        let added = store
            .append_unique(Artifact::Subdomains, ["b.example.com", " c.example.com ", ""])
            .await
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(
            store.read_lines(Artifact::Subdomains).await.unwrap(),
            vec!["a.example.com", "b.example.com", "c.example.com"]
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(dir.path()));

        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let lines: Vec<String> = (0..50)
                    .map(|i| format!("CORS_VULN: https://w{}-{}.example.com", worker, i))
                    .collect();
                store.append_unique(Artifact::Cors, lines).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let lines = store.read_lines(Artifact::Cors).await.unwrap();
        assert_eq!(lines.len(), 400);
        assert!(lines.iter().all(|l| l.starts_with("CORS_VULN: https://w")));
    }

    #[tokio::test]
    async fn test_sort_unique_and_retain() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store
            .write_lines(Artifact::Urls, ["https://b.example.com", "https://a.example.com", "https://b.example.com"])
            .await
            .unwrap();

        assert_eq!(store.sort_unique(Artifact::Urls).await.unwrap(), 2);
        let (before, after) = store
            .retain(Artifact::Urls, |l| l.contains("a.example"))
            .await
            .unwrap();
        assert_eq!((before, after), (2, 1));
        assert_eq!(store.read_lines(Artifact::Urls).await.unwrap(), vec!["https://a.example.com"]);
    }

    #[tokio::test]
    async fn test_sort_unique_on_missing_file_does_not_create_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert_eq!(store.sort_unique(Artifact::JsFiles).await.unwrap(), 0);
        assert!(!store.path(Artifact::JsFiles).exists());
    }

    #[tokio::test]
    async fn test_remove_temporary_keeps_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_lines(Artifact::FuzzTargets, ["https://a.example.com"]).await.unwrap();
        store.write_lines(Artifact::LiveHosts, ["https://a.example.com [200]"]).await.unwrap();

        store.remove_temporary();
        assert!(!store.path(Artifact::FuzzTargets).exists());
        assert!(store.path(Artifact::LiveHosts).exists());
    }

    #[test]
    fn test_reported_artifacts_are_not_temporary() {
        assert!(Artifact::REPORTED.iter().all(|a| !a.is_temporary()));
        assert!(Artifact::TEMPORARY.iter().all(|a| a.is_temporary()));
    }
}
