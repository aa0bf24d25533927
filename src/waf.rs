//! WAF detection.
//!
//! Each live host is fingerprinted with `wafw00f`, and its output is reduced
//! to a yes/no verdict by a [`WafOutputParser`]. Anything the parser cannot
//! make sense of counts as "not flagged".

use crate::error::ParseError;
use crate::exec::{CommandSpec, Executor};
use crate::pacing::{JitterWindow, Pacing};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reduced fingerprinter output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WafVerdict {
    pub flagged: bool,
    /// Named defenses, when the output carried names.
    pub defenses: Vec<String>,
}

impl WafVerdict {
    fn named(defenses: Vec<String>) -> Self {
        Self {
            flagged: !defenses.is_empty(),
            defenses,
        }
    }

    fn flagged() -> Self {
        Self {
            flagged: true,
            defenses: Vec::new(),
        }
    }
}

/// Turns raw fingerprinter stdout into a verdict.
pub trait WafOutputParser: Send + Sync {
    fn parse(&self, output: &str) -> Result<WafVerdict, ParseError>;
}

/// Parser for `wafw00f` output, JSON first with a text fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct Wafw00fParser;

impl WafOutputParser for Wafw00fParser {
    fn parse(&self, output: &str) -> Result<WafVerdict, ParseError> {
        let output = output.trim();
        if output.is_empty() {
            return Err(ParseError::Empty);
        }

        if let Some(verdict) = trailing_json(output).as_ref().and_then(parse_structured) {
            return Ok(verdict);
        }

        let lower = output.to_lowercase();
        if lower.contains("detected") && !lower.contains("none") {
            return Ok(WafVerdict::flagged());
        }
        if lower.contains("is behind") {
            return Ok(WafVerdict::flagged());
        }
        Err(ParseError::Unrecognized(truncate(output, 120)))
    }
}

/// The JSON document that ends the output, skipping any banner before it.
fn trailing_json(output: &str) -> Option<Value> {
    output
        .char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
        .find_map(|(start, _)| {
            let rest = &output[start..];
            let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
            let value = values.next()?.ok()?;
            rest[values.byte_offset()..]
                .trim()
                .is_empty()
                .then_some(value)
        })
}

fn parse_structured(value: &Value) -> Option<WafVerdict> {
    match value {
        // {"detected": [{"waf": "Cloudflare"}, ...]}
        Value::Object(map) => {
            let detected = map.get("detected")?.as_array()?;
            let names = detected
                .iter()
                .filter_map(|entry| entry.get("waf").and_then(Value::as_str))
                .filter(|name| is_named(name))
                .map(String::from)
                .collect();
            Some(WafVerdict::named(names))
        }
        // [{"url": ..., "detected": true, "firewall": "Cloudflare", ...}]
        Value::Array(entries) => {
            let mut recognized = false;
            let mut names = Vec::new();
            for entry in entries {
                let Some(detected) = entry.get("detected").and_then(Value::as_bool) else {
                    continue;
                };
                recognized = true;
                let firewall = entry
                    .get("firewall")
                    .and_then(Value::as_str)
                    .unwrap_or("Generic");
                if detected && is_named(firewall) {
                    names.push(firewall.to_string());
                }
            }
            recognized.then(|| WafVerdict::named(names))
        }
        _ => None,
    }
}

fn is_named(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && !name.eq_ignore_ascii_case("none")
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Fingerprinter command for one host.
pub fn wafw00f_command(host: &str, timeout: Duration) -> CommandSpec {
    CommandSpec::new("wafw00f")
        .arg(host)
        .args(["-f", "json", "-o", "-"])
        .timeout(timeout)
}

/// Probes hosts through a bounded pool with randomized spacing.
pub struct WafDetector<'a> {
    executor: &'a dyn Executor,
    pacing: &'a dyn Pacing,
    parser: &'a dyn WafOutputParser,
    timeout: Duration,
    concurrency: usize,
}

impl<'a> WafDetector<'a> {
    pub fn new(
        executor: &'a dyn Executor,
        pacing: &'a dyn Pacing,
        parser: &'a dyn WafOutputParser,
    ) -> Self {
        Self {
            executor,
            pacing,
            parser,
            timeout: Duration::from_secs(15),
            concurrency: 3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Probe each distinct host once. Every input host appears in the result.
    pub async fn detect<S: AsRef<str>>(&self, hosts: &[S]) -> BTreeMap<String, bool> {
        let unique: BTreeSet<String> = hosts
            .iter()
            .map(|h| h.as_ref().trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        stream::iter(unique)
            .map(|host| async move {
                let flagged = self.probe(&host).await;
                (host, flagged)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn probe(&self, host: &str) -> bool {
        self.pacing.pause(JitterWindow::WAF_PROBE).await;
        let outcome = self.executor.execute(wafw00f_command(host, self.timeout)).await;
        if outcome.is_timeout() {
            warn!(host, "WAF probe timed out, assuming no WAF");
            return false;
        }

        match self.parser.parse(&outcome.stdout) {
            Ok(verdict) if verdict.flagged => {
                info!(host, defenses = ?verdict.defenses, "WAF detected");
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!(host, error = %e, "unparseable WAF probe output");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecOutcome;
    use crate::pacing::NoDelay;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn test_parse_detected_object() {
        let verdict = Wafw00fParser
            .parse(r#"{"detected": [{"waf": "Cloudflare (Cloudflare Inc.)"}]}"#)
            .unwrap();
        assert!(verdict.flagged);
        assert_eq!(verdict.defenses, vec!["Cloudflare (Cloudflare Inc.)"]);
    }

    #[test]
    fn test_parse_none_named_defense() {
        let verdict = Wafw00fParser.parse(r#"{"detected": [{"waf": "None"}]}"#).unwrap();
        assert!(!verdict.flagged);
        let verdict = Wafw00fParser.parse(r#"{"detected": []}"#).unwrap();
        assert!(!verdict.flagged);
    }

    #[test]
    fn test_parse_wafw00f_list() {
        let output = r#"[{"url": "https://a.example.com", "detected": true, "firewall": "Akamai", "manufacturer": "Akamai"},
                         {"url": "https://b.example.com", "detected": false, "firewall": "None", "manufacturer": "None"}]"#;
        let verdict = Wafw00fParser.parse(output).unwrap();
        assert!(verdict.flagged);
        assert_eq!(verdict.defenses, vec!["Akamai"]);

        let verdict = Wafw00fParser
            .parse(r#"[{"url": "https://b.example.com", "detected": false, "firewall": "None"}]"#)
            .unwrap();
        assert!(!verdict.flagged);
    }

    #[test]
    fn test_json_after_banner() {
        let output = "\n  ______\n ( WOOF! )\n [*] Checking https://a.example.com\n\
                      [+] Generic Detection results:\n\
                      [{\"url\": \"https://a.example.com\", \"detected\": true, \
                      \"firewall\": \"Cloudflare\", \"manufacturer\": \"Cloudflare Inc.\"}]\n";
        let verdict = Wafw00fParser.parse(output).unwrap();
        assert!(verdict.flagged);
        assert_eq!(verdict.defenses, vec!["Cloudflare"]);

        let quiet = "[*] Checking https://b.example.com\n{\"detected\": []}";
        assert!(!Wafw00fParser.parse(quiet).unwrap().flagged);
    }

    #[test]
    fn test_lexical_fallback() {
        assert!(Wafw00fParser.parse("Generic WAF detected").unwrap().flagged);
        assert!(Wafw00fParser
            .parse("[+] The site https://a.example.com is behind Sucuri")
            .unwrap()
            .flagged);
        assert!(Wafw00fParser.parse("detected: none").is_err());
    }

    #[test]
    fn test_unrecognized_output() {
        assert_eq!(Wafw00fParser.parse("   "), Err(ParseError::Empty));
        assert!(matches!(
            Wafw00fParser.parse("connection refused"),
            Err(ParseError::Unrecognized(_))
        ));
        assert!(matches!(
            Wafw00fParser.parse(r#"{"status": "ok"}"#),
            Err(ParseError::Unrecognized(_))
        ));
    }

    struct CannedExecutor {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Executor for CannedExecutor {
        async fn execute(&self, spec: CommandSpec) -> ExecOutcome {
            let host = spec.args[0].clone();
            self.seen.lock().unwrap().push(spec.to_string());
            let stdout = match host.as_str() {
                "https://shielded.example.com" => r#"{"detected": [{"waf": "Cloudflare"}]}"#,
                "https://open.example.com" => r#"{"detected": []}"#,
                _ => "garbage",
            };
            if host == "https://slow.example.com" {
                return ExecOutcome::timed_out(spec.to_string(), spec.timeout, spec.timeout);
            }
            ExecOutcome::completed(spec.to_string(), 0, stdout, "", Duration::ZERO)
        }
    }

    #[tokio::test]
    async fn test_detect_builds_presence_map() {
        let executor = CannedExecutor {
            seen: Mutex::new(Vec::new()),
        };
        let detector = WafDetector::new(&executor, &NoDelay, &Wafw00fParser).with_concurrency(2);
        let hosts = [
            "https://shielded.example.com",
            "https://open.example.com",
            "https://open.example.com",
            "https://weird.example.com",
            "https://slow.example.com",
        ];

        let map = detector.detect(&hosts).await;
        assert_eq!(map.len(), 4);
        assert_eq!(map["https://shielded.example.com"], true);
        assert_eq!(map["https://open.example.com"], false);
        assert_eq!(map["https://weird.example.com"], false);
        assert_eq!(map["https://slow.example.com"], false);

        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen
            .iter()
            .any(|c| c == "wafw00f https://open.example.com -f json -o -"));
    }
}
