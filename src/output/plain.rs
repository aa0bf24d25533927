//! Plain text output formatting.
//!
//! Produces the human-readable scan summary with colors and formatting.

use crate::report::Report;
use console::{style, Style};
use std::io::{self, Write};
use std::path::Path;

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Print the summary of a finished scan to stdout.
pub fn print_plain(report: &Report) -> io::Result<()> {
    let stdout = io::stdout();
    write_plain(&mut stdout.lock(), report)
}

/// Write the summary table, the WAF table and the artifact locations.
pub fn write_plain<W: Write>(out: &mut W, report: &Report) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).magenta())?;
    writeln!(out, "                      {}", style("SCAN SUMMARY").magenta().bold())?;
    writeln!(out, "{}", style(RULE).magenta())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Targets:").bold(), report.targets.join(", "))?;
    writeln!(
        out,
        "  {} {}",
        style("Session:").bold(),
        style(report.session_id.short()).dim()
    )?;
    if let Some(profile) = report.profile {
        writeln!(out, "  {} {}", style("Profile:").bold(), profile)?;
    }
    writeln!(
        out,
        "  {} {}s",
        style("Duration:").bold(),
        report.duration().num_seconds()
    )?;
    writeln!(out)?;

    if report.summary.is_empty() {
        writeln!(out, "  {}", style("No statistics recorded.").dim())?;
    } else {
        let width = report
            .summary
            .iter()
            .map(|e| e.category.len())
            .max()
            .unwrap_or(0)
            .max(25);

        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:<width$}  {}",
            style("CATEGORY").bold(),
            style("RESULT").bold(),
            width = width
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for entry in report.summary.iter() {
            let row_style = if entry.alert {
                Style::new().red().bold()
            } else {
                Style::new()
            };
            let category_style = if entry.alert {
                row_style.clone()
            } else {
                Style::new().yellow()
            };
            writeln!(
                out,
                "  {}  {}",
                category_style.apply_to(format!("{:<width$}", entry.category, width = width)),
                row_style.apply_to(truncate_string(&entry.value, 60))
            )?;
        }
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    if !report.waf_detection.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "  {} ({} host(s))",
            style("WAF Detection").bold(),
            report.waf_detection.len()
        )?;
        for (host, flagged) in &report.waf_detection {
            let verdict = if *flagged {
                style("WAF").red().bold()
            } else {
                style("none").green()
            };
            writeln!(out, "    {:<50} {}", host, verdict)?;
        }
    }

    writeln!(out)?;
    print_location(out, "Scan Dir", &report.session_dir)?;
    print_location(out, "Report", &report.session_dir.join(crate::report::REPORT_FILE))?;
    print_location(out, "Log", &report.session_dir.join("scan.log"))?;
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).magenta())?;
    writeln!(out)?;

    Ok(())
}

fn print_location<W: Write>(out: &mut W, label: &str, path: &Path) -> io::Result<()> {
    writeln!(
        out,
        "  {} {}",
        style(format!("{:<9}", format!("{}:", label))).dim(),
        style(path.display()).dim()
    )
}

/// Print a header before the pipeline starts.
pub fn print_scan_header(targets: &[String], session_dir: &Path, profile_hint: Option<&str>) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("reconflow").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "{} Targets: {}",
        style("•").dim(),
        style(targets.join(", ")).white().bold()
    );
    println!(
        "{} Scan dir: {}",
        style("•").dim(),
        session_dir.display()
    );
    if let Some(hint) = profile_hint {
        println!("{} {}", style("•").dim(), style(hint).yellow());
    }
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate to at most `max_len` characters, adding an ellipsis if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Stats;
    use crate::types::SessionId;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }

    #[test]
    fn test_write_plain_lists_every_category() {
        let mut summary = Stats::new();
        summary.set("Total Subdomains", 42);
        summary.set_flagged("CORS Vulns", 3, true);
        let now = Utc::now();
        let report = Report {
            tool: "reconflow".to_string(),
            version: "0.1.0".to_string(),
            session_id: SessionId::new(),
            scan_time: now,
            completed_at: now,
            session_dir: PathBuf::from("/tmp/scan_x"),
            profile: None,
            targets: vec!["example.com".to_string()],
            summary,
            stats: BTreeMap::new(),
            waf_detection: BTreeMap::from([("https://a.example.com".to_string(), true)]),
            files: BTreeMap::new(),
        };

        let mut buf = Vec::new();
        write_plain(&mut buf, &report).unwrap();
        let raw = String::from_utf8(buf).unwrap();
        let text = console::strip_ansi_codes(&raw);
        assert!(text.contains("Total Subdomains"));
        assert!(text.contains("42"));
        assert!(text.contains("CORS Vulns"));
        assert!(text.contains("https://a.example.com"));
        assert!(text.contains("/tmp/scan_x/report.json"));
    }
}
