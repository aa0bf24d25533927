//! Scan session state shared by every pipeline stage.
//!
//! A [`ScanSession`] is created once per scan and passed by `&mut` through
//! the stages. It owns the session directory, the artifact store, the
//! summary statistics, the WAF map and the active throttling profile.
//! Scratch artifacts are removed when the session is dropped.

mod artifacts;
mod stats;

pub use artifacts::{Artifact, ArtifactStore};
pub use stats::{StatEntry, Stats};

use crate::config::ThrottleProfile;
use crate::types::{SessionId, Target};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct ScanSession {
    id: SessionId,
    started_at: DateTime<Utc>,
    dir: PathBuf,
    targets: Vec<Target>,
    store: Arc<ArtifactStore>,
    pub stats: Stats,
    waf_map: BTreeMap<String, bool>,
    profile: Option<ThrottleProfile>,
    keep_temporary: bool,
}

impl ScanSession {
    /// Create the session directory under `base_dir`.
    pub fn create(base_dir: &Path, targets: Vec<Target>) -> io::Result<Self> {
        let id = SessionId::new();
        let started_at = Utc::now();
        let dir = base_dir.join(id.dir_name(started_at));
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "created session directory");

        Ok(Self {
            id,
            started_at,
            store: Arc::new(ArtifactStore::new(&dir)),
            dir,
            targets,
            stats: Stats::new(),
            waf_map: BTreeMap::new(),
            profile: None,
            keep_temporary: false,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn log_file(&self) -> PathBuf {
        self.dir.join("scan.log")
    }

    /// Leave scratch artifacts on disk when the session ends.
    pub fn keep_temporary(&mut self, keep: bool) {
        self.keep_temporary = keep;
    }

    pub fn waf_map(&self) -> &BTreeMap<String, bool> {
        &self.waf_map
    }

    /// Merge detection results into the WAF map.
    pub fn record_waf(&mut self, results: BTreeMap<String, bool>) {
        self.waf_map.extend(results);
    }

    /// Hosts flagged as sitting behind a WAF.
    pub fn waf_hosts(&self) -> BTreeSet<String> {
        self.waf_map
            .iter()
            .filter(|(_, flagged)| **flagged)
            .map(|(host, _)| host.clone())
            .collect()
    }

    pub fn any_waf(&self) -> bool {
        self.waf_map.values().any(|flagged| *flagged)
    }

    /// Activate the session profile. Only the first call has an effect.
    pub fn activate_profile(&mut self, profile: ThrottleProfile) -> ThrottleProfile {
        match self.profile {
            Some(active) => {
                if active != profile {
                    warn!(
                        active = %active.kind,
                        requested = %profile.kind,
                        "profile already selected, keeping it"
                    );
                }
                active
            }
            None => {
                info!(profile = %profile.kind, "throttling profile selected");
                *self.profile.insert(profile)
            }
        }
    }

    /// The active profile, selecting the no-WAF profile if none was chosen yet.
    pub fn profile(&mut self) -> ThrottleProfile {
        match self.profile {
            Some(profile) => profile,
            None => {
                warn!("no profile selected before use, falling back to aggressive");
                self.activate_profile(ThrottleProfile::derive(false))
            }
        }
    }

    pub fn active_profile(&self) -> Option<&ThrottleProfile> {
        self.profile.as_ref()
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if !self.keep_temporary {
            self.store.remove_temporary();
        }
    }
}
