//! Pipeline orchestrator.
//!
//! Runs the fourteen stages strictly in order over one [`ScanSession`].
//! Stages are fail-open: an error is logged, the stage's summary category
//! is guaranteed to exist (as `0` if nothing was recorded), and the next
//! stage starts anyway.

mod extract;
mod stages;
pub mod tools;

pub use extract::FeroxHit;

use crate::config::AppSettings;
use crate::error::StageError;
use crate::exec::{Executor, ProcessExecutor};
use crate::pacing::{JitterPacer, Pacing};
use crate::session::ScanSession;
use crate::waf::{WafOutputParser, Wafw00fParser};
use crate::wildcard::{HostResolver, TrustDnsResolver};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Enumeration,
    Deduplicate,
    WildcardFilter,
    Takeover,
    LiveCheck,
    WafDetection,
    PortScan,
    UrlDiscovery,
    JsAnalysis,
    TechDetection,
    VulnScan,
    DirectoryFuzzing,
    ExposureProbing,
    ParameterMining,
}

impl Stage {
    /// Execution order.
    pub const ALL: [Stage; 14] = [
        Stage::Enumeration,
        Stage::Deduplicate,
        Stage::WildcardFilter,
        Stage::Takeover,
        Stage::LiveCheck,
        Stage::WafDetection,
        Stage::PortScan,
        Stage::UrlDiscovery,
        Stage::JsAnalysis,
        Stage::TechDetection,
        Stage::VulnScan,
        Stage::DirectoryFuzzing,
        Stage::ExposureProbing,
        Stage::ParameterMining,
    ];

    /// Summary category the stage is accountable for.
    pub fn category(self) -> &'static str {
        match self {
            Self::Enumeration | Self::Deduplicate => category::SUBDOMAINS,
            Self::WildcardFilter => category::WILDCARD_IPS,
            Self::Takeover => category::TAKEOVERS,
            Self::LiveCheck => category::LIVE_HOSTS,
            Self::WafDetection => category::WAF_HOSTS,
            Self::PortScan => category::OPEN_PORTS,
            Self::UrlDiscovery => category::URLS,
            Self::JsAnalysis => category::JS_FILES,
            Self::TechDetection => category::TECHNOLOGIES,
            Self::VulnScan => category::NUCLEI,
            Self::DirectoryFuzzing => category::FEROX,
            Self::ExposureProbing => category::SENSITIVE,
            Self::ParameterMining => category::PARAMS,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Enumeration => "Subdomain enumeration",
            Self::Deduplicate => "Deduplicating subdomains",
            Self::WildcardFilter => "Wildcard DNS filter",
            Self::Takeover => "Takeover check",
            Self::LiveCheck => "Live check",
            Self::WafDetection => "WAF detection",
            Self::PortScan => "Port scan",
            Self::UrlDiscovery => "URL discovery",
            Self::JsAnalysis => "JS discovery and analysis",
            Self::TechDetection => "Technology detection",
            Self::VulnScan => "Targeted vulnerability scan",
            Self::DirectoryFuzzing => "Directory fuzzing",
            Self::ExposureProbing => "Sensitive files, buckets and CORS",
            Self::ParameterMining => "Parameter mining",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary category names.
pub mod category {
    pub const SUBDOMAINS: &str = "Total Subdomains";
    pub const WILDCARD_IPS: &str = "Wildcard IPs";
    pub const TAKEOVERS: &str = "Takeover Found";
    pub const LIVE_HOSTS: &str = "Live Hosts";
    pub const WAF_HOSTS: &str = "WAF Hosts";
    pub const OPEN_PORTS: &str = "Open Ports";
    pub const URLS: &str = "Total URLs";
    pub const JS_FILES: &str = "JS Files";
    pub const SECRETS: &str = "Secrets Found";
    pub const TECHNOLOGIES: &str = "Technologies";
    pub const NUCLEI: &str = "Nuclei Findings";
    pub const FEROX: &str = "Ferox Endpoints";
    pub const SENSITIVE: &str = "Sensitive Files";
    pub const CLOUD_BUCKETS: &str = "Cloud Buckets";
    pub const CORS: &str = "CORS Vulns";
    pub const PARAMS: &str = "Unique Params";

    /// Category for the count of live hosts answering with `code`.
    pub fn status(code: u16) -> String {
        format!("Status {}", code)
    }
}

/// How one stage went.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: Stage,
    pub elapsed: Duration,
    /// Error message when the stage failed.
    pub error: Option<String>,
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Sequences the stages and owns their collaborators.
pub struct Pipeline {
    executor: Arc<dyn Executor>,
    resolver: Arc<dyn HostResolver>,
    pacing: Arc<dyn Pacing>,
    waf_parser: Arc<dyn WafOutputParser>,
    settings: AppSettings,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(
        settings: AppSettings,
        executor: Arc<dyn Executor>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        Self {
            executor,
            resolver,
            pacing: Arc::new(JitterPacer),
            waf_parser: Arc::new(Wafw00fParser),
            settings,
            progress: ProgressBar::hidden(),
        }
    }

    /// Real processes, system DNS and randomized jitter.
    pub fn with_defaults(settings: AppSettings) -> Self {
        let dns_timeout = Duration::from_secs(settings.timeouts.dns_lookup);
        Self::new(
            settings,
            Arc::new(ProcessExecutor::new()),
            Arc::new(TrustDnsResolver::new(dns_timeout)),
        )
    }

    pub fn with_pacing(mut self, pacing: Arc<dyn Pacing>) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_waf_parser(mut self, parser: Arc<dyn WafOutputParser>) -> Self {
        self.waf_parser = parser;
        self
    }

    /// Show a progress bar across stages.
    pub fn with_progress(mut self) -> Self {
        let pb = ProgressBar::new(Stage::ALL.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(120));
        self.progress = pb;
        self
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Run every stage in order. Never aborts early.
    pub async fn run(&self, session: &mut ScanSession) -> Vec<StageOutcome> {
        let mut outcomes = Vec::with_capacity(Stage::ALL.len());

        for stage in Stage::ALL {
            self.progress.set_message(stage.label());
            info!(stage = %stage, "stage started");
            let started = Instant::now();

            let result = self.run_stage(stage, session).await;
            session.stats.ensure(stage.category());

            let elapsed = started.elapsed();
            let error = match result {
                Ok(()) => {
                    info!(stage = %stage, elapsed_ms = elapsed.as_millis() as u64, "stage finished");
                    None
                }
                Err(e) => {
                    warn!(stage = %stage, error = %e, "stage failed, continuing");
                    Some(e.to_string())
                }
            };
            outcomes.push(StageOutcome {
                stage,
                elapsed,
                error,
            });
            self.progress.inc(1);
        }

        self.progress.finish_with_message("done");
        outcomes
    }

    async fn run_stage(&self, stage: Stage, session: &mut ScanSession) -> Result<(), StageError> {
        match stage {
            Stage::Enumeration => self.enumerate(session).await,
            Stage::Deduplicate => self.deduplicate(session).await,
            Stage::WildcardFilter => self.filter_wildcards(session).await,
            Stage::Takeover => self.check_takeovers(session).await,
            Stage::LiveCheck => self.check_live(session).await,
            Stage::WafDetection => self.detect_waf(session).await,
            Stage::PortScan => self.scan_ports(session).await,
            Stage::UrlDiscovery => self.discover_urls(session).await,
            Stage::JsAnalysis => self.analyze_js(session).await,
            Stage::TechDetection => self.detect_technologies(session).await,
            Stage::VulnScan => self.scan_vulnerabilities(session).await,
            Stage::DirectoryFuzzing => self.fuzz_directories(session).await,
            Stage::ExposureProbing => self.probe_exposures(session).await,
            Stage::ParameterMining => self.mine_parameters(session).await,
        }
    }
}
