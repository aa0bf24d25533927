//! Technology to template mapping and targeted-scan planning.
//!
//! Hosts are grouped by the exact set of template directories their
//! fingerprints (plus corpus-wide surface signals) call for, so each
//! distinct template set is scanned once over all hosts that need it. A
//! universal group with the baseline templates always covers every host.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Baseline templates run against every live host.
pub const UNIVERSAL_TEMPLATES: [&str; 4] = [
    "http/misconfigurations/",
    "http/exposures/",
    "http/security-audit/",
    "http/cves/",
];

const CVES: &str = "http/cves/";

static TECH_TEMPLATES: &[(&str, &[&str])] = &[
    ("wordpress", &[CVES, "http/exposures/", "wordpress/"]),
    ("drupal", &[CVES, "drupal/"]),
    ("joomla", &[CVES, "joomla/"]),
    ("wp-includes", &["wordpress/"]),
    ("wp-json", &["wordpress/"]),
    ("laravel", &[CVES, "laravel/"]),
    ("django", &[CVES, "django/"]),
    ("symfony", &[CVES, "symfony/"]),
    ("ruby on rails", &[CVES, "rails/"]),
    ("rails", &[CVES, "rails/"]),
    ("express", &[CVES, "nodejs/"]),
    ("node.js", &[CVES, "nodejs/"]),
    ("spring", &[CVES, "springboot/"]),
    ("spring boot", &[CVES, "springboot/"]),
    ("struts", &[CVES, "struts/"]),
    ("angular", &[CVES]),
    ("react", &[CVES]),
    ("vue.js", &[CVES]),
    ("php", &[CVES, "php/"]),
    ("python", &[CVES]),
    ("java", &[CVES, "java/"]),
    ("asp.net", &[CVES, "aspnet/"]),
    ("ruby", &[CVES]),
    ("apache", &[CVES, "apache/"]),
    ("nginx", &[CVES, "nginx/"]),
    ("microsoft iis", &[CVES, "iis/"]),
    ("iis", &[CVES, "iis/"]),
    ("tomcat", &[CVES, "tomcat/"]),
    ("jetty", &[CVES]),
    ("caddy", &[CVES]),
    ("aws", &[CVES, "aws/"]),
    ("amazon", &[CVES, "aws/"]),
    ("azure", &[CVES, "azure/"]),
    ("gcloud", &[CVES, "gcp/"]),
    ("google cloud", &[CVES, "gcp/"]),
    ("cloudflare", &[CVES]),
    ("heroku", &[CVES]),
    ("jenkins", &[CVES, "jenkins/"]),
    ("gitlab", &[CVES, "gitlab/"]),
    ("github", &[CVES]),
    ("confluence", &[CVES, "confluence/"]),
    ("jira", &[CVES, "jira/"]),
    ("grafana", &[CVES, "grafana/"]),
    ("kibana", &[CVES, "kibana/"]),
    ("elasticsearch", &[CVES, "elasticsearch/"]),
    ("docker", &[CVES, "docker/"]),
    ("kubernetes", &[CVES, "kubernetes/"]),
    ("graphql", &[CVES, "graphql/"]),
    ("swagger", &[CVES, "swagger/"]),
    ("openapi", &[CVES, "swagger/"]),
    ("jquery", &[]),
    ("bootstrap", &[]),
    ("wix", &[CVES, "wix/"]),
    ("shopify", &[CVES]),
    ("x-powered-by", &[CVES]),
];

/// Template fragments for a technology name. Unknown names map to nothing.
pub fn resolve_templates(name: &str) -> BTreeSet<&'static str> {
    let key = name.trim().to_lowercase();
    TECH_TEMPLATES
        .iter()
        .find(|(tech, _)| *tech == key)
        .map(|(_, templates)| templates.iter().copied().collect())
        .unwrap_or_default()
}

/// Technology evidenced somewhere in the crawl/fuzz corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SurfaceSignal {
    GraphQl,
    Swagger,
    SpringBoot,
    WordPress,
    Jenkins,
    GitLab,
    Confluence,
    Grafana,
    Kibana,
}

impl SurfaceSignal {
    const MARKERS: [(&'static str, SurfaceSignal); 12] = [
        ("graphql", SurfaceSignal::GraphQl),
        ("swagger", SurfaceSignal::Swagger),
        ("openapi", SurfaceSignal::Swagger),
        ("api-docs", SurfaceSignal::Swagger),
        ("actuator", SurfaceSignal::SpringBoot),
        ("wp-json", SurfaceSignal::WordPress),
        ("wp-includes", SurfaceSignal::WordPress),
        ("jenkins", SurfaceSignal::Jenkins),
        ("gitlab", SurfaceSignal::GitLab),
        ("confluence", SurfaceSignal::Confluence),
        ("grafana", SurfaceSignal::Grafana),
        ("kibana", SurfaceSignal::Kibana),
    ];

    /// Technology name used for the template lookup.
    pub fn tech_name(self) -> &'static str {
        match self {
            Self::GraphQl => "graphql",
            Self::Swagger => "swagger",
            Self::SpringBoot => "spring boot",
            Self::WordPress => "wordpress",
            Self::Jenkins => "jenkins",
            Self::GitLab => "gitlab",
            Self::Confluence => "confluence",
            Self::Grafana => "grafana",
            Self::Kibana => "kibana",
        }
    }
}

impl fmt::Display for SurfaceSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tech_name())
    }
}

/// Scan every corpus line for surface markers, case-insensitively.
pub fn build_surface_signals<I, S>(corpus: I) -> BTreeSet<SurfaceSignal>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut signals = BTreeSet::new();
    for line in corpus {
        let lower = line.as_ref().to_lowercase();
        for (marker, signal) in SurfaceSignal::MARKERS {
            if lower.contains(marker) {
                signals.insert(signal);
            }
        }
    }
    signals
}

/// Hosts sharing one template set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateGroup {
    /// Derived from the template set alone.
    pub id: Uuid,
    pub templates: BTreeSet<String>,
    pub hosts: Vec<String>,
    pub universal: bool,
}

impl TemplateGroup {
    fn new(templates: BTreeSet<String>, mut hosts: Vec<String>, universal: bool) -> Self {
        hosts.sort();
        hosts.dedup();
        Self {
            id: group_id(&templates),
            templates,
            hosts,
            universal,
        }
    }

    /// Short id used in host list file names.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..12].to_string()
    }

    /// Whether any member host is in `flagged`.
    pub fn touches(&self, flagged: &BTreeSet<String>) -> bool {
        self.hosts.iter().any(|h| flagged.contains(h))
    }

    /// Template paths rooted at `root`.
    pub fn template_paths(&self, root: &Path) -> Vec<String> {
        self.templates
            .iter()
            .map(|t| root.join(t).to_string_lossy().into_owned())
            .collect()
    }
}

/// Content-derived id: UUID v5 over the sorted, newline-joined template set.
pub fn group_id(templates: &BTreeSet<String>) -> Uuid {
    let canonical = templates
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, canonical.as_bytes())
}

/// The targeted scan: technology groups plus the universal group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePlan {
    pub groups: Vec<TemplateGroup>,
    pub universal: TemplateGroup,
}

impl TemplatePlan {
    /// Every group, technology groups first.
    pub fn iter(&self) -> impl Iterator<Item = &TemplateGroup> {
        self.groups.iter().chain(std::iter::once(&self.universal))
    }

    /// Number of nuclei runs the plan needs, universal group included.
    pub fn group_count(&self) -> usize {
        self.groups.len() + 1
    }
}

/// Partition hosts by identical template sets.
///
/// A host's set is the union of its technologies' templates and the global
/// signals' templates. Hosts with an empty set appear only in the universal
/// group. Groups are ordered by id.
pub fn group_hosts(
    tech_map: &BTreeMap<String, Vec<String>>,
    signals: &BTreeSet<SurfaceSignal>,
) -> TemplatePlan {
    let signal_templates: BTreeSet<&'static str> = signals
        .iter()
        .flat_map(|s| resolve_templates(s.tech_name()))
        .collect();

    let mut by_set: BTreeMap<BTreeSet<String>, Vec<String>> = BTreeMap::new();
    for (host, techs) in tech_map {
        let templates: BTreeSet<String> = techs
            .iter()
            .flat_map(|t| resolve_templates(t))
            .chain(signal_templates.iter().copied())
            .map(String::from)
            .collect();
        by_set.entry(templates).or_default().push(host.clone());
    }

    let mut groups: Vec<TemplateGroup> = by_set
        .into_iter()
        .filter(|(templates, _)| !templates.is_empty())
        .map(|(templates, hosts)| TemplateGroup::new(templates, hosts, false))
        .collect();
    groups.sort_by_key(|g| g.id);

    let universal = TemplateGroup::new(
        UNIVERSAL_TEMPLATES.iter().map(|t| t.to_string()).collect(),
        tech_map.keys().cloned().collect(),
        true,
    );

    TemplatePlan { groups, universal }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech_map(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(host, techs)| {
                (
                    host.to_string(),
                    techs.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_templates_is_case_insensitive() {
        assert_eq!(
            resolve_templates("WordPress"),
            BTreeSet::from(["http/cves/", "http/exposures/", "wordpress/"])
        );
        assert_eq!(resolve_templates(" Microsoft IIS "), BTreeSet::from(["http/cves/", "iis/"]));
        assert!(resolve_templates("jQuery").is_empty());
        assert!(resolve_templates("CustomFramework").is_empty());
    }

    #[test]
    fn test_surface_signals() {
        let corpus = [
            "https://a.example.com/GraphQL",
            "https://a.example.com/v2/api-docs",
            "https://b.example.com/actuator/health",
            "https://c.example.com/static/app.css",
        ];
        assert_eq!(
            build_surface_signals(corpus),
            BTreeSet::from([
                SurfaceSignal::GraphQl,
                SurfaceSignal::Swagger,
                SurfaceSignal::SpringBoot
            ])
        );
        assert!(build_surface_signals(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_groups_partition_by_template_set() {
        let map = tech_map(&[
            ("https://a.example.com", &["WordPress"]),
            ("https://b.example.com", &["Drupal"]),
            ("https://c.example.com", &["wordpress"]),
            ("https://d.example.com", &["jQuery"]),
        ]);
        let plan = group_hosts(&map, &BTreeSet::new());

        assert_eq!(plan.groups.len(), 2);
        let wp = plan
            .groups
            .iter()
            .find(|g| g.templates.contains("wordpress/"))
            .unwrap();
        assert_eq!(wp.hosts, vec!["https://a.example.com", "https://c.example.com"]);
        assert_eq!(wp.templates, set(&["http/cves/", "http/exposures/", "wordpress/"]));

        let drupal = plan
            .groups
            .iter()
            .find(|g| g.templates.contains("drupal/"))
            .unwrap();
        assert_eq!(drupal.hosts, vec!["https://b.example.com"]);

        // Hosts without a template set only ride along in the universal group.
        assert!(plan
            .groups
            .iter()
            .all(|g| !g.hosts.contains(&"https://d.example.com".to_string())));
        assert!(plan.universal.universal);
        assert_eq!(plan.universal.hosts.len(), 4);
        assert_eq!(plan.universal.templates, set(&UNIVERSAL_TEMPLATES));
    }

    #[test]
    fn test_signals_apply_to_every_host() {
        let map = tech_map(&[
            ("https://a.example.com", &["nginx"]),
            ("https://b.example.com", &[]),
        ]);
        let plan = group_hosts(&map, &BTreeSet::from([SurfaceSignal::GraphQl]));

        assert_eq!(plan.groups.len(), 2);
        assert!(plan.groups.iter().all(|g| g.templates.contains("graphql/")));
        let b = plan
            .groups
            .iter()
            .find(|g| g.hosts == vec!["https://b.example.com"])
            .unwrap();
        assert_eq!(b.templates, set(&["graphql/", "http/cves/"]));
    }

    #[test]
    fn test_no_host_in_two_technology_groups() {
        let map = tech_map(&[
            ("https://a.example.com", &["php", "apache"]),
            ("https://b.example.com", &["apache", "php"]),
            ("https://c.example.com", &["php"]),
        ]);
        let plan = group_hosts(&map, &BTreeSet::new());
        let mut seen = BTreeSet::new();
        for group in &plan.groups {
            for host in &group.hosts {
                assert!(seen.insert(host.clone()), "{} grouped twice", host);
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_group_ids_depend_on_content_only() {
        let first = group_hosts(
            &tech_map(&[("https://a.example.com", &["drupal"])]),
            &BTreeSet::new(),
        );
        let second = group_hosts(
            &tech_map(&[
                ("https://z.example.com", &["laravel"]),
                ("https://y.example.com", &["drupal"]),
            ]),
            &BTreeSet::new(),
        );
        let drupal_id = |plan: &TemplatePlan| {
            plan.groups
                .iter()
                .find(|g| g.templates.contains("drupal/"))
                .map(|g| g.id)
                .unwrap()
        };
        assert_eq!(drupal_id(&first), drupal_id(&second));
        assert_eq!(first.universal.id, second.universal.id);
        assert_eq!(first.universal.short_id().len(), 12);
    }

    #[test]
    fn test_empty_tech_map() {
        let plan = group_hosts(&BTreeMap::new(), &BTreeSet::from([SurfaceSignal::Kibana]));
        assert!(plan.groups.is_empty());
        assert!(plan.universal.hosts.is_empty());
        assert_eq!(plan.iter().count(), 1);
    }
}
