use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the scan summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    pub category: String,
    pub value: String,
    /// Rendered highlighted: the category holds findings worth a look.
    #[serde(default)]
    pub alert: bool,
}

/// Ordered category -> value mapping, in first-insertion order.
///
/// Categories are never removed; setting an existing one overwrites its
/// value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stats {
    entries: Vec<StatEntry>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, category: &str, value: impl ToString) {
        self.upsert(category, value.to_string(), false);
    }

    /// Set a value and flag it as an alert when `alert` holds.
    pub fn set_flagged(&mut self, category: &str, value: impl ToString, alert: bool) {
        self.upsert(category, value.to_string(), alert);
    }

    /// Insert `category` with value `0` unless it is already present.
    pub fn ensure(&mut self, category: &str) {
        if self.get(category).is_none() {
            self.upsert(category, "0".to_string(), false);
        }
    }

    pub fn get(&self, category: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.category == category)
            .map(|e| e.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.category.clone(), e.value.clone()))
            .collect()
    }

    fn upsert(&mut self, category: &str, value: String, alert: bool) {
        match self.entries.iter_mut().find(|e| e.category == category) {
            Some(entry) => {
                entry.value = value;
                entry.alert = alert;
            }
            None => self.entries.push(StatEntry {
                category: category.to_string(),
                value,
                alert,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let mut stats = Stats::new();
        stats.set("Subdomains", 12);
        stats.set("Live Hosts", 4);
        stats.set("Subdomains", 10);

        let categories: Vec<_> = stats.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(categories, vec!["Subdomains", "Live Hosts"]);
        assert_eq!(stats.get("Subdomains"), Some("10"));
    }

    #[test]
    fn test_ensure_does_not_overwrite() {
        let mut stats = Stats::new();
        stats.set("Ports", "80,443");
        stats.ensure("Ports");
        stats.ensure("Nuclei Findings");
        assert_eq!(stats.get("Ports"), Some("80,443"));
        assert_eq!(stats.get("Nuclei Findings"), Some("0"));
        assert_eq!(stats.len(), 2);
    }

    #[test]
    fn test_alert_flag() {
        let mut stats = Stats::new();
        stats.set_flagged("Takeover Candidates", 2, true);
        assert!(stats.iter().next().unwrap().alert);
        stats.set_flagged("Takeover Candidates", 0, false);
        assert!(!stats.iter().next().unwrap().alert);
    }

    #[test]
    fn test_serializes_as_list() {
        let mut stats = Stats::new();
        stats.set("JS Files", 3);
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(json, r#"[{"category":"JS Files","value":"3","alert":false}]"#);
    }
}
