//! The fourteen stages.
//!
//! Each stage reads its input from the artifacts persisted by earlier
//! stages, runs its tools, appends to its own artifacts and records its
//! summary rows. Single-tool stages report the tool's failure as their
//! error after recording whatever output arrived.

use super::category;
use super::extract::{self, FeroxHit};
use super::tools::{Toolbox, CORS_PROBE_ORIGIN, SEVERITY_ALL, SEVERITY_WAF};
use super::Pipeline;
use crate::config::ThrottleProfile;
use crate::error::{StageError, StageResult};
use crate::exec::ExecOutcome;
use crate::pacing::{JitterWindow, ProbeLimiter};
use crate::session::{Artifact, ArtifactStore, ScanSession};
use crate::templates::{build_surface_signals, group_hosts};
use crate::types::{filter_in_scope, host_of, origin_of, parse_tech_line, HostRecord};
use crate::waf::WafDetector;
use crate::wildcard::{detect_wildcards, filter_wildcards};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Live-check status codes reported in the summary.
const REPORTED_STATUS_CODES: [u16; 8] = [200, 301, 302, 400, 401, 403, 404, 500];

/// Status codes that make a host worth fuzzing.
const FUZZABLE_STATUS_CODES: [u16; 3] = [200, 301, 302];

const ENUMERATION_WORKERS: usize = 5;
const PASSIVE_URL_WORKERS: usize = 2;
const JS_ANALYSIS_WORKERS: usize = 2;
const WAF_PROBE_WORKERS: usize = 3;

/// Error for a tool that did not exit cleanly.
fn exec_result(outcome: &ExecOutcome) -> StageResult<()> {
    match outcome.error() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn log_failure(outcome: &ExecOutcome) {
    if let Some(e) = outcome.error() {
        warn!(error = %e, "tool failed");
    }
}

/// Parsed live-check lines; malformed lines are skipped.
async fn live_records(store: &ArtifactStore) -> StageResult<Vec<HostRecord>> {
    let lines = store.read_lines(Artifact::LiveHosts).await?;
    Ok(lines
        .iter()
        .filter_map(|line| match HostRecord::parse_live_line(line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "skipping live-check line");
                None
            }
        })
        .collect())
}

/// Live records joined with the fingerprint artifact and WAF results.
async fn enriched_records(
    store: &ArtifactStore,
    waf_map: &BTreeMap<String, bool>,
) -> StageResult<Vec<HostRecord>> {
    let techs = tech_map(store).await?;
    let mut records = live_records(store).await?;
    for record in &mut records {
        record.enrich(&techs, waf_map);
    }
    Ok(records)
}

fn urls_of(records: &[HostRecord]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.url.clone()))
        .map(|r| r.url.clone())
        .collect()
}

fn bare_hosts(urls: &[String]) -> Vec<String> {
    let hosts: BTreeSet<String> = urls
        .iter()
        .map(|u| host_of(u))
        .filter(|h| !h.is_empty())
        .collect();
    hosts.into_iter().collect()
}

impl Pipeline {
    fn tools(&self) -> Toolbox<'_> {
        Toolbox::new(&self.settings)
    }

    /// subfinder and assetfinder for every target, scoped into `subs.txt`.
    pub(super) async fn enumerate(&self, session: &mut ScanSession) -> StageResult<()> {
        let tools = self.tools();
        let specs: Vec<_> = session
            .targets()
            .iter()
            .flat_map(|t| [tools.subfinder(t), tools.assetfinder(t)])
            .collect();

        let outcomes = self
            .executor
            .execute_parallel(specs, ENUMERATION_WORKERS)
            .await;

        let store = Arc::clone(session.store());
        for outcome in &outcomes {
            log_failure(outcome);
            let found: Vec<&str> = outcome.stdout_lines().collect();
            let scoped = filter_in_scope(&found, session.targets());
            let scoped: Vec<String> = scoped.iter().map(|s| s.to_ascii_lowercase()).collect();
            store.append_unique(Artifact::Subdomains, &scoped).await?;
        }

        let total = store.count(Artifact::Subdomains).await?;
        info!(total, "subdomains enumerated");
        session.stats.set(category::SUBDOMAINS, total);
        Ok(())
    }

    pub(super) async fn deduplicate(&self, session: &mut ScanSession) -> StageResult<()> {
        let total = session.store().sort_unique(Artifact::Subdomains).await?;
        session.stats.set(category::SUBDOMAINS, total);
        Ok(())
    }

    pub(super) async fn filter_wildcards(&self, session: &mut ScanSession) -> StageResult<()> {
        let wildcard_ips = detect_wildcards(
            session.targets(),
            self.resolver.as_ref(),
            self.settings.wildcard_probes,
        )
        .await;
        session.stats.set(category::WILDCARD_IPS, wildcard_ips.len());

        if wildcard_ips.is_empty() {
            return Ok(());
        }

        warn!(count = wildcard_ips.len(), "wildcard DNS detected, filtering subdomains");
        let store = Arc::clone(session.store());
        let subs = store.read_lines(Artifact::Subdomains).await?;
        let kept = filter_wildcards(subs, &wildcard_ips, self.resolver.as_ref()).await;
        store.write_lines(Artifact::Subdomains, &kept).await?;
        session.stats.set(category::SUBDOMAINS, kept.len());
        Ok(())
    }

    pub(super) async fn check_takeovers(&self, session: &mut ScanSession) -> StageResult<()> {
        let store = Arc::clone(session.store());
        let subs = store.read_lines(Artifact::Subdomains).await?;
        if subs.is_empty() {
            session.stats.set(category::TAKEOVERS, 0);
            return Ok(());
        }

        let outcome = self.executor.execute(self.tools().dnstake(&subs)).await;
        store
            .append_unique(Artifact::Takeovers, outcome.stdout_lines())
            .await?;

        let count = store.count(Artifact::Takeovers).await?;
        session.stats.set_flagged(category::TAKEOVERS, count, count > 0);
        exec_result(&outcome)
    }

    /// httpx over the subdomains at a fixed rate, with per-status counts.
    pub(super) async fn check_live(&self, session: &mut ScanSession) -> StageResult<()> {
        let store = Arc::clone(session.store());
        let subs = store.read_lines(Artifact::Subdomains).await?;
        if subs.is_empty() {
            session.stats.set(category::LIVE_HOSTS, 0);
            return Ok(());
        }

        let outcome = self.executor.execute(self.tools().httpx_live(&subs)).await;
        store
            .append_unique(Artifact::LiveHosts, outcome.stdout_lines())
            .await?;

        let records = live_records(&store).await?;
        session.stats.set(category::LIVE_HOSTS, urls_of(&records).len());
        for code in REPORTED_STATUS_CODES {
            let count = records.iter().filter(|r| r.has_status(&[code])).count();
            if count > 0 {
                session.stats.set(&category::status(code), count);
            }
        }
        exec_result(&outcome)
    }

    /// Fingerprint live hosts and select the session profile.
    pub(super) async fn detect_waf(&self, session: &mut ScanSession) -> StageResult<()> {
        let records = match live_records(session.store()).await {
            Ok(records) => records,
            Err(e) => {
                session.activate_profile(ThrottleProfile::derive(false));
                return Err(e);
            }
        };
        let hosts = urls_of(&records);

        let detector = WafDetector::new(
            self.executor.as_ref(),
            self.pacing.as_ref(),
            self.waf_parser.as_ref(),
        )
        .with_timeout(std::time::Duration::from_secs(self.settings.timeouts.waf_probe))
        .with_concurrency(WAF_PROBE_WORKERS);
        let waf_map = detector.detect(&hosts).await;

        session.record_waf(waf_map);
        let any_waf = session.any_waf();
        let profile = session.activate_profile(ThrottleProfile::derive(any_waf));

        let flagged = session.waf_hosts();
        if any_waf {
            warn!(
                hosts = flagged.len(),
                profile = %profile.kind,
                "WAF detected, switching to stealthy profile"
            );
        } else {
            info!("no WAF detected, keeping aggressive profile");
        }

        session.stats.set_flagged(category::WAF_HOSTS, flagged.len(), any_waf);
        session
            .store()
            .write_lines(Artifact::WafHosts, &flagged)
            .await?;
        Ok(())
    }

    pub(super) async fn scan_ports(&self, session: &mut ScanSession) -> StageResult<()> {
        let profile = session.profile();
        let store = Arc::clone(session.store());
        let subs = store.read_lines(Artifact::Subdomains).await?;
        if subs.is_empty() {
            session.stats.set(category::OPEN_PORTS, 0);
            return Ok(());
        }

        let outcome = self
            .executor
            .execute(self.tools().naabu(&profile, &subs))
            .await;
        store
            .append_unique(Artifact::Ports, outcome.stdout_lines())
            .await?;

        let ports = extract::open_ports(store.read_lines(Artifact::Ports).await?);
        let value = if ports.is_empty() {
            "0".to_string()
        } else {
            ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        session.stats.set(category::OPEN_PORTS, value);
        exec_result(&outcome)
    }

    /// Passive archives, then two crawlers, merged and scoped.
    pub(super) async fn discover_urls(&self, session: &mut ScanSession) -> StageResult<()> {
        let profile = session.profile();
        let tools = self.tools();
        let store = Arc::clone(session.store());
        let live = urls_of(&live_records(&store).await?);

        if !live.is_empty() {
            let hosts = bare_hosts(&live);
            let passive = vec![tools.waybackurls(&hosts), tools.gau(&hosts)];
            for outcome in self
                .executor
                .execute_parallel(passive, PASSIVE_URL_WORKERS)
                .await
            {
                log_failure(&outcome);
                let from_gau = outcome.command.starts_with("gau ");
                let urls = outcome
                    .stdout_lines()
                    .filter(|u| !(from_gau && extract::is_static_asset(u)));
                store.append_unique(Artifact::Urls, urls).await?;
            }

            self.pacing.pause(profile.jitter).await;
            let outcome = self.executor.execute(tools.hakrawler(&live)).await;
            log_failure(&outcome);
            let found: Vec<&str> = outcome.stdout_lines().collect();
            store
                .append_unique(Artifact::Urls, filter_in_scope(&found, session.targets()))
                .await?;

            self.pacing.pause(profile.jitter).await;
            let outcome = self.executor.execute(tools.katana(&profile, &live)).await;
            log_failure(&outcome);
            store
                .append_unique(Artifact::Urls, outcome.stdout_lines())
                .await?;
        }

        let targets = session.targets().to_vec();
        store
            .retain(Artifact::Urls, |url| {
                !filter_in_scope(&[url], &targets).is_empty()
            })
            .await?;
        let total = store.sort_unique(Artifact::Urls).await?;
        session.stats.set(category::URLS, total);
        Ok(())
    }

    /// Collect JS files, then run the secret and link extractors over each.
    pub(super) async fn analyze_js(&self, session: &mut ScanSession) -> StageResult<()> {
        let tools = self.tools();
        let store = Arc::clone(session.store());

        let urls = store.read_lines(Artifact::Urls).await?;
        store
            .append_unique(
                Artifact::JsFiles,
                urls.iter().filter(|u| extract::is_js_url(u)),
            )
            .await?;

        let live = urls_of(&live_records(&store).await?);
        if !live.is_empty() {
            let outcome = self.executor.execute(tools.subjs(&live)).await;
            log_failure(&outcome);
            store
                .append_unique(Artifact::JsFiles, outcome.stdout_lines())
                .await?;
        }
        let js_files = store.sort_unique(Artifact::JsFiles).await?;

        let js = store.read_lines(Artifact::JsFiles).await?;
        let jobs: Vec<_> = js
            .iter()
            .flat_map(|url| {
                [
                    tools.secretfinder(url).map(|s| (Artifact::Secrets, s)),
                    tools.linkfinder(url).map(|s| (Artifact::Links, s)),
                ]
            })
            .flatten()
            .collect();
        if jobs.is_empty() && !js.is_empty() {
            debug!("no JS analysis scripts configured");
        }

        let executor = self.executor.as_ref();
        let store = &*store;
        let results: Vec<std::io::Result<usize>> = stream::iter(jobs)
            .map(|(artifact, spec)| async move {
                let outcome = executor.execute(spec).await;
                log_failure(&outcome);
                store.append_unique(artifact, outcome.stdout_lines()).await
            })
            .buffer_unordered(JS_ANALYSIS_WORKERS)
            .collect()
            .await;
        for result in results {
            result?;
        }

        let secrets = store.count(Artifact::Secrets).await?;
        session.stats.set(category::JS_FILES, js_files);
        session.stats.set_flagged(category::SECRETS, secrets, secrets > 0);
        Ok(())
    }

    pub(super) async fn detect_technologies(&self, session: &mut ScanSession) -> StageResult<()> {
        let profile = session.profile();
        let store = Arc::clone(session.store());
        let live = urls_of(&live_records(&store).await?);
        if live.is_empty() {
            session.stats.set(category::TECHNOLOGIES, 0);
            return Ok(());
        }

        let outcome = self
            .executor
            .execute(self.tools().httpx_tech(&profile, &live))
            .await;
        store
            .append_unique(Artifact::TechMap, outcome.stdout_lines())
            .await?;

        let tech_map = tech_map(&store).await?;
        let all: BTreeSet<&str> = tech_map.values().flatten().map(String::as_str).collect();
        info!(hosts = tech_map.len(), "hosts fingerprinted");
        if all.is_empty() {
            session.stats.set(category::TECHNOLOGIES, 0);
        } else {
            session
                .stats
                .set(category::TECHNOLOGIES, all.into_iter().collect::<Vec<_>>().join(", "));
        }
        exec_result(&outcome)
    }

    /// One nuclei run per template group.
    pub(super) async fn scan_vulnerabilities(&self, session: &mut ScanSession) -> StageResult<()> {
        let profile = session.profile();
        let waf_hosts = session.waf_hosts();
        let tools = self.tools();
        let store = Arc::clone(session.store());

        let records = enriched_records(&store, session.waf_map()).await?;
        let mut hosts = tech_map(&store).await?;
        for record in &records {
            hosts
                .entry(record.url.clone())
                .or_insert_with(|| record.technologies.clone());
        }
        let shielded: BTreeSet<String> = records
            .iter()
            .filter(|r| r.waf)
            .map(|r| r.url.clone())
            .chain(waf_hosts)
            .collect();

        let mut corpus = store.read_lines(Artifact::Ferox).await?;
        corpus.extend(store.read_lines(Artifact::Urls).await?);
        let signals = build_surface_signals(&corpus);
        if !signals.is_empty() {
            info!(signals = ?signals, "surface signals found");
        }

        let plan = group_hosts(&hosts, &signals);
        info!(
            groups = plan.group_count(),
            hosts = plan.universal.hosts.len(),
            "template plan built"
        );

        let mut failures = Vec::new();
        for group in plan.iter() {
            if group.hosts.is_empty() || group.templates.is_empty() {
                continue;
            }
            let list = store
                .write_named(&format!("nuclei_group_{}.txt", group.short_id()), &group.hosts)
                .await?;
            let severity = if group.touches(&shielded) {
                SEVERITY_WAF
            } else {
                SEVERITY_ALL
            };
            let templates = group.template_paths(&self.settings.templates_root);

            self.pacing.pause(profile.jitter).await;
            let outcome = self
                .executor
                .execute(tools.nuclei(&profile, &list, &templates, severity))
                .await;
            store
                .append_unique(Artifact::Nuclei, outcome.stdout_lines())
                .await?;
            if let Some(e) = outcome.error() {
                warn!(group = %group.short_id(), error = %e, "nuclei run failed");
                failures.push(e);
            }
        }

        let findings = store.count(Artifact::Nuclei).await?;
        session.stats.set_flagged(category::NUCLEI, findings, findings > 0);
        match failures.into_iter().next() {
            Some(e) => Err(StageError::Exec(e)),
            None => Ok(()),
        }
    }

    /// Shallow pass over responsive hosts, then a deep pass over new 200 origins.
    pub(super) async fn fuzz_directories(&self, session: &mut ScanSession) -> StageResult<()> {
        let profile = session.profile();
        let waf_hosts = session.waf_hosts();
        let tools = self.tools();
        let store = Arc::clone(session.store());

        let records = live_records(&store).await?;
        let fuzz_targets: Vec<String> = urls_of(&records)
            .into_iter()
            .filter(|url| {
                records
                    .iter()
                    .any(|r| &r.url == url && r.has_status(&FUZZABLE_STATUS_CODES))
            })
            .collect();

        if fuzz_targets.is_empty() {
            session.stats.set(category::FEROX, store.count(Artifact::Ferox).await?);
            return Ok(());
        }
        store.write_lines(Artifact::FuzzTargets, &fuzz_targets).await?;

        self.pacing.pause(profile.jitter).await;
        let outcome = self
            .executor
            .execute(tools.ferox_shallow(&profile, &fuzz_targets))
            .await;
        log_failure(&outcome);
        let hits: Vec<&str> = outcome
            .stdout_lines()
            .filter(|l| FeroxHit::parse(l).is_some())
            .collect();
        store.append_unique(Artifact::Ferox, &hits).await?;

        let deep_targets: BTreeSet<String> = hits
            .iter()
            .filter_map(|l| FeroxHit::parse(l))
            .filter(|hit| hit.status == 200)
            .filter_map(|hit| origin_of(&hit.url))
            .filter(|origin| !waf_hosts.contains(origin))
            .collect();

        if !deep_targets.is_empty() {
            if self.settings.wordlist_deep.exists() {
                let deep_targets: Vec<String> = deep_targets.into_iter().collect();
                store.write_lines(Artifact::DeepTargets, &deep_targets).await?;

                self.pacing.pause(profile.jitter).await;
                let deep = self
                    .executor
                    .execute(tools.ferox_deep(&profile, &deep_targets))
                    .await;
                log_failure(&deep);
                store
                    .append_unique(
                        Artifact::FeroxDeep,
                        deep.stdout_lines().filter(|l| FeroxHit::parse(l).is_some()),
                    )
                    .await?;
                let deep_hits = store.read_lines(Artifact::FeroxDeep).await?;
                store.append_unique(Artifact::Ferox, &deep_hits).await?;
            } else {
                info!(
                    wordlist = %self.settings.wordlist_deep.display(),
                    "deep wordlist missing, skipping deep pass"
                );
            }
        }

        session.stats.set(category::FEROX, store.count(Artifact::Ferox).await?);
        exec_result(&outcome)
    }

    /// Sensitive paths, cloud buckets and CORS reflection.
    pub(super) async fn probe_exposures(&self, session: &mut ScanSession) -> StageResult<()> {
        let profile = session.profile();
        let waf_hosts = session.waf_hosts();
        let tools = self.tools();
        let store = Arc::clone(session.store());
        let limiter = ProbeLimiter::per_second(profile.probe_rate);

        let fuzz_targets = store.read_lines(Artifact::FuzzTargets).await?;
        if !fuzz_targets.is_empty() {
            store
                .write_lines(Artifact::SensitivePatterns, &self.settings.sensitive_paths)
                .await?;
            self.pacing.pause(profile.jitter).await;
            let outcome = self
                .executor
                .execute(tools.httpx_sensitive(
                    &profile,
                    &store.path(Artifact::SensitivePatterns),
                    &fuzz_targets,
                ))
                .await;
            log_failure(&outcome);
            store
                .append_unique(Artifact::Sensitive, outcome.stdout_lines())
                .await?;
        }

        let mut bucket_probes = Vec::new();
        for target in session.targets() {
            for name in extract::bucket_variations(target.as_str()) {
                bucket_probes.push(tools.curl_status(
                    &format!("https://{}.s3.amazonaws.com/", name),
                    &format!("s3://{}", name),
                ));
                bucket_probes.push(tools.curl_status(
                    &format!("https://{}.storage.googleapis.com/", name),
                    &format!("gs://{}", name),
                ));
            }
        }
        let store = &*store;
        let tools = &tools;
        let bucket_results: Vec<std::io::Result<usize>> = stream::iter(bucket_probes)
            .map(|spec| {
                let limiter = limiter.clone();
                async move {
                    limiter.wait().await;
                    self.pacing.pause(JitterWindow::BUCKET_PROBE).await;
                    let outcome = self.executor.execute(spec).await;
                    let found = outcome.stdout_lines().filter(|line| {
                        matches!(extract::leading_status(line), Some(200) | Some(403))
                    });
                    store.append_unique(Artifact::CloudBuckets, found).await
                }
            })
            .buffer_unordered(profile.probe_concurrency.max(1))
            .collect()
            .await;
        for result in bucket_results {
            result?;
        }

        let live = urls_of(&live_records(&store).await?);
        let cors_targets: Vec<String> = live
            .into_iter()
            .take(self.settings.cors_probe_limit)
            .filter(|url| !waf_hosts.contains(url))
            .collect();
        let cors_results: Vec<std::io::Result<usize>> = stream::iter(cors_targets)
            .map(|url| {
                let limiter = limiter.clone();
                async move {
                    limiter.wait().await;
                    self.pacing.pause(profile.jitter).await;
                    let outcome = self.executor.execute(tools.curl_cors(&url)).await;
                    if extract::reflects_origin(&outcome.stdout, CORS_PROBE_ORIGIN) {
                        info!(url = %url, "CORS origin reflected");
                        store
                            .append_unique(Artifact::Cors, [format!("CORS_VULN: {}", url)])
                            .await
                    } else {
                        Ok(0)
                    }
                }
            })
            .buffer_unordered(profile.probe_concurrency.max(1))
            .collect()
            .await;
        for result in cors_results {
            result?;
        }

        let sensitive = store.count(Artifact::Sensitive).await?;
        let buckets = store.count(Artifact::CloudBuckets).await?;
        let cors = store.count(Artifact::Cors).await?;
        session.stats.set_flagged(category::SENSITIVE, sensitive, sensitive > 0);
        session.stats.set_flagged(category::CLOUD_BUCKETS, buckets, buckets > 0);
        session.stats.set_flagged(category::CORS, cors, cors > 0);
        Ok(())
    }

    /// paramspider over live hosts plus query names from the URL corpus.
    pub(super) async fn mine_parameters(&self, session: &mut ScanSession) -> StageResult<()> {
        let store = Arc::clone(session.store());
        let live = urls_of(&live_records(&store).await?);
        let hosts = bare_hosts(&live);

        if !hosts.is_empty() {
            store.write_lines(Artifact::ParamSpiderInput, &hosts).await?;
            let outcome = self
                .executor
                .execute(
                    self.tools()
                        .paramspider(&store.path(Artifact::ParamSpiderInput), session.dir()),
                )
                .await;
            log_failure(&outcome);
        }

        let mut corpus = store.read_lines(Artifact::Urls).await?;
        corpus.extend(paramspider_results(session).await?);
        let names = extract::unique_param_names(&corpus);
        store.append_unique(Artifact::Params, &names).await?;

        session
            .stats
            .set(category::PARAMS, store.count(Artifact::Params).await?);
        Ok(())
    }
}

/// URLs paramspider left under `results/` in the session directory.
async fn paramspider_results(session: &ScanSession) -> StageResult<Vec<String>> {
    let dir = session.dir().join("results");
    let mut urls = Vec::new();
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(urls),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            let content = tokio::fs::read_to_string(&path).await?;
            urls.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(String::from),
            );
        }
    }
    Ok(urls)
}

/// `host -> technologies` from the fingerprint artifact.
async fn tech_map(store: &ArtifactStore) -> StageResult<BTreeMap<String, Vec<String>>> {
    let mut map = BTreeMap::new();
    for line in store.read_lines(Artifact::TechMap).await? {
        match parse_tech_line(&line) {
            Ok((host, techs)) => {
                map.insert(host, techs);
            }
            Err(e) => debug!(error = %e, "skipping fingerprint line"),
        }
    }
    Ok(map)
}
