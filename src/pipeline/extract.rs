//! Small parsers for tool output and artifact lines.

use crate::types::web_url;
use std::collections::BTreeSet;

const STATIC_EXTENSIONS: [&str; 16] = [
    "jpg", "jpeg", "png", "gif", "svg", "css", "woff", "woff2", "ttf", "otf", "ico", "pdf", "mp4",
    "txt", "xml", "js",
];

/// A result line of the directory fuzzer: `<status> <method> ... <url>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeroxHit {
    pub status: u16,
    pub url: String,
}

impl FeroxHit {
    pub fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return None;
        }
        let status = parts[0].parse().ok()?;
        let url = parts[parts.len() - 1];
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return None;
        }
        Some(Self {
            status,
            url: url.to_string(),
        })
    }
}

fn path_of(url: &str) -> String {
    web_url(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether the URL path ends in a static asset extension.
pub fn is_static_asset(url: &str) -> bool {
    let path = path_of(url);
    path.rsplit_once('.')
        .filter(|(_, ext)| !ext.contains('/'))
        .is_some_and(|(_, ext)| STATIC_EXTENSIONS.contains(&ext))
}

/// Whether the URL points at a JavaScript file.
pub fn is_js_url(url: &str) -> bool {
    path_of(url).ends_with(".js")
}

/// Query parameter names of a URL, decoded.
pub fn param_names(url: &str) -> Vec<String> {
    web_url(url)
        .map(|u| {
            u.query_pairs()
                .map(|(name, _)| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Unique parameter names across a URL corpus, sorted.
pub fn unique_param_names<I, S>(urls: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names = BTreeSet::new();
    for url in urls {
        names.extend(param_names(url.as_ref()));
    }
    names
}

/// Bucket name guesses for a domain: as is, dots to hyphens, dots removed.
pub fn bucket_variations(domain: &str) -> Vec<String> {
    let mut variations = vec![
        domain.to_string(),
        domain.replace('.', "-"),
        domain.replace('.', ""),
    ];
    variations.dedup();
    variations
}

/// Status code printed first on a probe output line.
pub fn leading_status(line: &str) -> Option<u16> {
    line.split_whitespace().next()?.parse().ok()
}

/// Whether response headers reflect the probe origin.
pub fn reflects_origin(headers: &str, origin: &str) -> bool {
    let needle = format!("access-control-allow-origin: {}", origin.to_ascii_lowercase());
    headers.to_ascii_lowercase().contains(&needle)
}

/// Sorted unique port numbers from `host:port` lines.
pub fn open_ports<I, S>(lines: I) -> Vec<u16>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ports: BTreeSet<u16> = lines
        .into_iter()
        .filter_map(|l| l.as_ref().trim().rsplit(':').next()?.parse().ok())
        .collect();
    ports.into_iter().collect()
}
