//! Command lines for the external collaborators.
//!
//! Every builder returns a [`CommandSpec`]; host lists go through stdin and
//! nothing is run through a shell. Rates and delays come from the active
//! [`ThrottleProfile`], deadlines from [`ToolTimeouts`](crate::config::ToolTimeouts).

use crate::config::{AppSettings, ThrottleProfile};
use crate::exec::CommandSpec;
use crate::types::Target;
use std::path::Path;

/// Fixed httpx rate for the live check, which runs before a profile exists.
pub const LIVE_CHECK_RATE: u32 = 30;

/// Origin sent by the CORS probe.
pub const CORS_PROBE_ORIGIN: &str = "https://evil.com";

/// Status codes kept by the directory fuzzer.
const FEROX_STATUS_CODES: &str = "200,301,302,403";

pub const SEVERITY_ALL: &str = "low,medium,high,critical";
pub const SEVERITY_WAF: &str = "medium,high,critical";

/// Builds tool invocations from the application settings.
pub struct Toolbox<'a> {
    settings: &'a AppSettings,
}

impl<'a> Toolbox<'a> {
    pub fn new(settings: &'a AppSettings) -> Self {
        Self { settings }
    }

    fn user_agent(&self) -> String {
        self.settings.random_user_agent().to_string()
    }

    fn proxy(&self) -> Option<String> {
        self.settings
            .proxy_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
    }

    pub fn subfinder(&self, target: &Target) -> CommandSpec {
        CommandSpec::new("subfinder")
            .args(["-d", target.as_str(), "-all", "-recursive", "-silent"])
            .timeout_secs(self.settings.timeouts.subfinder)
    }

    pub fn assetfinder(&self, target: &Target) -> CommandSpec {
        CommandSpec::new("assetfinder")
            .args(["--subs-only", target.as_str()])
            .timeout_secs(self.settings.timeouts.assetfinder)
    }

    pub fn dnstake<S: AsRef<str>>(&self, subdomains: &[S]) -> CommandSpec {
        CommandSpec::new("dnstake")
            .arg("-s")
            .stdin_lines(subdomains)
            .timeout_secs(self.settings.timeouts.takeover)
    }

    pub fn httpx_live<S: AsRef<str>>(&self, subdomains: &[S]) -> CommandSpec {
        CommandSpec::new("httpx")
            .arg("-H")
            .arg(format!("User-Agent: {}", self.user_agent()))
            .arg("-rate-limit")
            .arg(LIVE_CHECK_RATE.to_string())
            .args(["-sc", "-td", "-ip", "-no-color", "-silent"])
            .opt_arg("-proxy", self.proxy())
            .stdin_lines(subdomains)
            .timeout_secs(self.settings.timeouts.live_check)
    }

    pub fn naabu<S: AsRef<str>>(&self, profile: &ThrottleProfile, subdomains: &[S]) -> CommandSpec {
        CommandSpec::new("naabu")
            .arg("-rate")
            .arg(profile.naabu_rate.to_string())
            .args(["-timeout", "5", "-silent"])
            .stdin_lines(subdomains)
            .timeout_secs(self.settings.timeouts.port_scan)
    }

    pub fn waybackurls<S: AsRef<str>>(&self, hosts: &[S]) -> CommandSpec {
        CommandSpec::new("waybackurls")
            .stdin_lines(hosts)
            .timeout_secs(self.settings.timeouts.waybackurls)
    }

    pub fn gau<S: AsRef<str>>(&self, hosts: &[S]) -> CommandSpec {
        CommandSpec::new("gau")
            .args(["--subs", "--threads", "50"])
            .stdin_lines(hosts)
            .timeout_secs(self.settings.timeouts.gau)
    }

    pub fn hakrawler<S: AsRef<str>>(&self, urls: &[S]) -> CommandSpec {
        CommandSpec::new("hakrawler")
            .args(["-d", "2"])
            .arg("-h")
            .arg(format!("User-Agent: {}", self.user_agent()))
            .stdin_lines(urls)
            .timeout_secs(self.settings.timeouts.hakrawler)
    }

    pub fn katana<S: AsRef<str>>(&self, profile: &ThrottleProfile, urls: &[S]) -> CommandSpec {
        CommandSpec::new("katana")
            .arg("-c")
            .arg(profile.katana_concurrency.to_string())
            .args(["-d", "2", "-jc", "-kf", "all", "-fs", "rdn", "-aff", "-silent"])
            .arg("-H")
            .arg(format!("User-Agent: {}", self.user_agent()))
            .arg("-delay")
            .arg(profile.katana_delay.to_string())
            .args(["-ef", "png,jpg,jpeg,gif,css,woff,woff2,svg,pdf"])
            .opt_arg("-proxy", self.proxy())
            .stdin_lines(urls)
            .timeout_secs(self.settings.timeouts.katana)
    }

    pub fn subjs<S: AsRef<str>>(&self, urls: &[S]) -> CommandSpec {
        CommandSpec::new("subjs")
            .stdin_lines(urls)
            .timeout_secs(self.settings.timeouts.subjs)
    }

    /// SecretFinder over one JS file; `None` when the script is not configured.
    pub fn secretfinder(&self, js_url: &str) -> Option<CommandSpec> {
        self.python_script(self.settings.secretfinder_script.as_deref(), js_url)
    }

    /// LinkFinder over one JS file; `None` when the script is not configured.
    pub fn linkfinder(&self, js_url: &str) -> Option<CommandSpec> {
        self.python_script(self.settings.linkfinder_script.as_deref(), js_url)
    }

    fn python_script(&self, script: Option<&Path>, js_url: &str) -> Option<CommandSpec> {
        let script = script?;
        Some(
            CommandSpec::new(self.settings.python.as_str())
                .arg(script.to_string_lossy())
                .args(["-i", js_url, "-o", "cli"])
                .timeout_secs(self.settings.timeouts.js_analysis),
        )
    }

    pub fn httpx_tech<S: AsRef<str>>(&self, profile: &ThrottleProfile, urls: &[S]) -> CommandSpec {
        CommandSpec::new("httpx")
            .arg("-H")
            .arg(format!("User-Agent: {}", self.user_agent()))
            .args(["-td", "-no-color", "-silent"])
            .arg("-rate-limit")
            .arg(profile.httpx_rate_limit.to_string())
            .opt_arg("-delay", profile.httpx_delay_arg())
            .opt_arg("-proxy", self.proxy())
            .stdin_lines(urls)
            .timeout_secs(self.settings.timeouts.tech_detect)
    }

    pub fn nuclei(
        &self,
        profile: &ThrottleProfile,
        host_list: &Path,
        templates: &[String],
        severity: &str,
    ) -> CommandSpec {
        let mut spec = CommandSpec::new("nuclei")
            .arg("-l")
            .arg(host_list.to_string_lossy());
        for template in templates {
            spec = spec.arg("-t").arg(template.as_str());
        }
        spec.args(["-severity", severity])
            .arg("-rate-limit")
            .arg(profile.nuclei_rate.to_string())
            .arg("-bulk-size")
            .arg(profile.nuclei_bulk.to_string())
            .arg("-H")
            .arg(format!("User-Agent: {}", self.user_agent()))
            .opt_arg("-proxy", self.proxy())
            .args(["-silent", "-no-color"])
            .timeout_secs(self.settings.timeouts.nuclei)
    }

    /// Shallow fuzzing pass with the common wordlist.
    pub fn ferox_shallow<S: AsRef<str>>(&self, profile: &ThrottleProfile, targets: &[S]) -> CommandSpec {
        self.ferox(
            &self.settings.wordlist_common,
            profile.ferox_threads,
            2,
            profile.ferox_delay,
            targets,
        )
        .timeout_secs(self.settings.timeouts.ferox)
    }

    /// Deep fuzzing pass with the large wordlist and reduced threads.
    pub fn ferox_deep<S: AsRef<str>>(&self, profile: &ThrottleProfile, targets: &[S]) -> CommandSpec {
        self.ferox(
            &self.settings.wordlist_deep,
            profile.deep_ferox_threads(),
            3,
            profile.deep_ferox_delay(),
            targets,
        )
        .timeout_secs(self.settings.timeouts.ferox_deep)
    }

    fn ferox<S: AsRef<str>>(
        &self,
        wordlist: &Path,
        threads: u32,
        depth: u32,
        delay: u32,
        targets: &[S],
    ) -> CommandSpec {
        CommandSpec::new("feroxbuster")
            .arg("--stdin")
            .arg("--wordlist")
            .arg(wordlist.to_string_lossy())
            .arg("--threads")
            .arg(threads.to_string())
            .arg("--depth")
            .arg(depth.to_string())
            .arg("--delay")
            .arg(delay.to_string())
            .args(["--status-codes", FEROX_STATUS_CODES])
            .arg("--user-agent")
            .arg(self.user_agent())
            .opt_arg("--proxy", self.proxy().map(|p| format!("file://{}", p)))
            .args(["--quiet", "--insecure"])
            .stdin_lines(targets)
    }

    pub fn httpx_sensitive<S: AsRef<str>>(
        &self,
        profile: &ThrottleProfile,
        paths_file: &Path,
        targets: &[S],
    ) -> CommandSpec {
        CommandSpec::new("httpx")
            .arg("-H")
            .arg(format!("User-Agent: {}", self.user_agent()))
            .arg("-rate-limit")
            .arg(profile.httpx_rate_limit.to_string())
            .opt_arg("-delay", profile.httpx_delay_arg())
            .arg("-path")
            .arg(paths_file.to_string_lossy())
            .args(["-mc", "200", "-no-color", "-silent"])
            .opt_arg("-proxy", self.proxy())
            .stdin_lines(targets)
            .timeout_secs(self.settings.timeouts.sensitive)
    }

    /// `curl` printing `<status> <label>` for `url`.
    pub fn curl_status(&self, url: &str, label: &str) -> CommandSpec {
        CommandSpec::new("curl")
            .args(["-sk", "-H"])
            .arg(format!("User-Agent: {}", self.user_agent()))
            .args(["-o", "/dev/null", "-w"])
            .arg(format!("%{{http_code}} {}\\n", label))
            .arg(url)
            .timeout_secs(self.settings.timeouts.http_probe)
    }

    /// `curl` dumping response headers for a request with a foreign Origin.
    pub fn curl_cors(&self, url: &str) -> CommandSpec {
        CommandSpec::new("curl")
            .args(["-sk", "-H"])
            .arg(format!("User-Agent: {}", self.user_agent()))
            .arg("-H")
            .arg(format!("Origin: {}", CORS_PROBE_ORIGIN))
            .args(["-D", "-", "-o", "/dev/null"])
            .arg(url)
            .timeout_secs(self.settings.timeouts.http_probe)
    }

    pub fn paramspider(&self, host_list: &Path, session_dir: &Path) -> CommandSpec {
        CommandSpec::new("paramspider")
            .arg("-l")
            .arg(host_list.to_string_lossy())
            .current_dir(session_dir)
            .timeout_secs(self.settings.timeouts.paramspider)
    }
}
