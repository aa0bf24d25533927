//! Discovered hosts and the line formats that describe them.
//!
//! The live-check artifact stores one host per line as
//! `<url> [<status>] [<title>] [<ip>] ...`; the fingerprint artifact stores
//! `<url> [<tech1>, <tech2>, ...]`. Both are parsed here.

use crate::error::ParseError;
use crate::types::target::web_url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// A live host and whatever later stages learned about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub ips: BTreeSet<IpAddr>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub waf: bool,
}

impl HostRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: None,
            ips: BTreeSet::new(),
            technologies: Vec::new(),
            waf: false,
        }
    }

    /// Parse a live-check line.
    pub fn parse_live_line(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        let url = line
            .split_whitespace()
            .next()
            .ok_or(ParseError::Empty)?;
        if !is_http_url(url) {
            return Err(ParseError::Malformed(line.to_string()));
        }

        let mut record = Self::new(url);
        for (idx, group) in bracket_groups(&line[url.len()..]).into_iter().enumerate() {
            if idx == 0 {
                if let Ok(code) = group.trim().parse::<u16>() {
                    record.status = Some(code);
                    continue;
                }
            }
            let ips: Option<Vec<IpAddr>> = group
                .split(',')
                .map(|part| part.trim().parse::<IpAddr>().ok())
                .collect();
            if let Some(ips) = ips {
                record.ips.extend(ips);
            }
        }
        Ok(record)
    }

    /// Attach fingerprint and WAF results keyed by URL.
    pub fn enrich(
        &mut self,
        tech_map: &BTreeMap<String, Vec<String>>,
        waf_map: &BTreeMap<String, bool>,
    ) {
        if let Some(techs) = tech_map.get(&self.url) {
            self.technologies = techs.clone();
        }
        self.waf = waf_map.get(&self.url).copied().unwrap_or(false);
    }

    /// Whether the live check reported one of the given status codes.
    pub fn has_status(&self, codes: &[u16]) -> bool {
        self.status.is_some_and(|s| codes.contains(&s))
    }
}

/// Parse a fingerprint line into `(url, technologies)`.
pub fn parse_tech_line(line: &str) -> Result<(String, Vec<String>), ParseError> {
    let line = line.trim();
    let (url, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| ParseError::Malformed(line.to_string()))?;
    let rest = rest.trim();
    if !is_http_url(url) || !rest.starts_with('[') || !rest.ends_with(']') {
        return Err(ParseError::Malformed(line.to_string()));
    }

    let techs: Vec<String> = rest[1..rest.len() - 1]
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();
    if techs.is_empty() {
        return Err(ParseError::Malformed(line.to_string()));
    }
    Ok((url.to_string(), techs))
}

/// Scheme plus authority of a URL (`https://host:port`).
///
/// Default ports are dropped, so `https://a:443/x` yields `https://a`.
pub fn origin_of(url: &str) -> Option<String> {
    if !is_http_url(url) {
        return None;
    }
    web_url(url).map(|u| u.origin().ascii_serialization())
}

fn is_http_url(s: &str) -> bool {
    s.contains("://") && web_url(s).is_some()
}

fn bracket_groups(s: &str) -> Vec<&str> {
    let mut groups = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find(']') else {
            break;
        };
        groups.push(&rest[open + 1..open + close]);
        rest = &rest[open + close + 1..];
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_live_line() {
        let record =
            HostRecord::parse_live_line("https://a.example.com [200] [Welcome] [93.184.216.34]")
                .unwrap();
        assert_eq!(record.url, "https://a.example.com");
        assert_eq!(record.status, Some(200));
        assert!(record.ips.contains(&"93.184.216.34".parse::<IpAddr>().unwrap()));
        assert!(record.has_status(&[200, 301]));
    }

    #[test]
    fn test_parse_live_line_without_groups() {
        let record = HostRecord::parse_live_line("http://b.example.com").unwrap();
        assert_eq!(record.status, None);
        assert!(!record.has_status(&[200]));
    }

    #[test]
    fn test_parse_live_line_rejects_garbage() {
        assert!(HostRecord::parse_live_line("").is_err());
        assert!(HostRecord::parse_live_line("example.com [200]").is_err());
    }

    #[test]
    fn test_enrich() {
        let tech_map = BTreeMap::from([(
            "https://a.example.com".to_string(),
            vec!["WordPress".to_string()],
        )]);
        let waf_map = BTreeMap::from([
            ("https://a.example.com".to_string(), true),
            ("https://b.example.com".to_string(), false),
        ]);

        let mut a = HostRecord::parse_live_line("https://a.example.com [200]").unwrap();
        a.enrich(&tech_map, &waf_map);
        assert_eq!(a.technologies, vec!["WordPress"]);
        assert!(a.waf);

        let mut b = HostRecord::parse_live_line("https://b.example.com [403]").unwrap();
        b.enrich(&tech_map, &waf_map);
        assert!(b.technologies.is_empty());
        assert!(!b.waf);

        let mut c = HostRecord::new("https://c.example.com");
        c.enrich(&tech_map, &BTreeMap::new());
        assert!(!c.waf);
    }

    #[test]
    fn test_parse_tech_line() {
        let (url, techs) =
            parse_tech_line("https://shop.example.com [WordPress, PHP,  Nginx ]").unwrap();
        assert_eq!(url, "https://shop.example.com");
        assert_eq!(techs, vec!["WordPress", "PHP", "Nginx"]);

        assert!(parse_tech_line("https://x.example.com").is_err());
        assert!(parse_tech_line("https://x.example.com []").is_err());
        assert!(parse_tech_line("x.example.com [PHP]").is_err());
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://a.example.com:8443/admin/login?x=1").as_deref(),
            Some("https://a.example.com:8443")
        );
        assert_eq!(origin_of("no-scheme/path"), None);
        assert_eq!(
            origin_of("https://a.example.com:443/x").as_deref(),
            Some("https://a.example.com")
        );
        assert_eq!(
            origin_of("https://a.example.com@evil.com/").as_deref(),
            Some("https://evil.com")
        );
        assert_eq!(origin_of("javascript://a.example.com/%0aalert(1)"), None);
    }
}
