//! History subcommand implementation.

use crate::cli::Context;
use crate::error::CliResult;
use crate::output;
use crate::storage::ReportStore;
use clap::Parser;
use console::style;

/// View and manage session history.
#[derive(Parser, Debug)]
pub struct HistoryCommand {
    /// Number of recent sessions to show
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Show detailed information for each session
    #[arg(short, long)]
    pub detailed: bool,

    /// Clear all session history
    #[arg(long)]
    pub clear: bool,

    /// Delete sessions older than N days
    #[arg(long, value_name = "DAYS")]
    pub prune: Option<u32>,
}

impl HistoryCommand {
    pub fn execute(&self, ctx: &Context) -> CliResult<()> {
        let store = ReportStore::new(&ctx.paths)?;

        if self.clear {
            let removed = store.clear()?;
            if !ctx.quiet {
                output::print_success(&format!("Removed {} session(s)", removed));
            }
            return Ok(());
        }

        if let Some(days) = self.prune {
            let removed = store.cleanup(chrono::Duration::days(i64::from(days)))?;
            if !ctx.quiet {
                output::print_success(&format!(
                    "Pruned {} session(s) older than {} day(s)",
                    removed, days
                ));
            }
            return Ok(());
        }

        let reports = store.list_recent(self.count)?;
        if reports.is_empty() {
            if !ctx.quiet {
                println!("No sessions recorded yet.");
            }
            return Ok(());
        }

        if !ctx.quiet {
            println!(
                "\n{:<10} {:<17} {:<11} {:>7} {:>6}  {}",
                "ID", "STARTED", "PROFILE", "ALERTS", "WAF", "TARGETS"
            );
            println!("{}", "-".repeat(78));
        }

        for report in &reports {
            let profile = report
                .profile
                .map_or_else(|| "-".to_string(), |p| p.to_string());
            let alerts = report.alert_count();
            let alerts_cell = format!("{:>7}", alerts);
            let alerts_cell = if alerts > 0 {
                style(alerts_cell).red().bold().to_string()
            } else {
                alerts_cell
            };
            println!(
                "{:<10} {:<17} {:<11} {} {:>6}  {}",
                report.session_id.short(),
                report.scan_time.format("%Y-%m-%d %H:%M"),
                profile,
                alerts_cell,
                report.waf_host_count(),
                output::truncate_string(&report.targets.join(", "), 30)
            );

            if self.detailed {
                println!("    dir:      {}", report.session_dir.display());
                println!("    duration: {}s", report.duration().num_seconds());
                for entry in report.summary.iter() {
                    println!("    {:<20} {}", entry.category, entry.value);
                }
                println!();
            }
        }

        if !ctx.quiet && !self.detailed {
            let stats = store.stats()?;
            println!(
                "\n{} session(s) stored, {} KiB",
                stats.session_count,
                stats.total_size_bytes / 1024
            );
        }
        Ok(())
    }
}
