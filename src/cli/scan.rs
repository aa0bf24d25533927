//! Scan subcommand implementation.
//!
//! Handles the `reconflow scan <target>` command: one session directory,
//! fourteen stages, one report.

use crate::cli::{Context, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::output;
use crate::pipeline::Pipeline;
use crate::report::Report;
use crate::session::ScanSession;
use crate::storage::ReportStore;
use crate::types::load_targets;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Run the recon pipeline.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Target domain, or a file with one domain per line
    ///
    /// Examples:
    ///   example.com        Single domain
    ///   *.example.com      Wildcard marker is stripped
    ///   scope.txt          Domain list
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Proxy list handed to tools that support one
    #[arg(long, value_name = "FILE")]
    pub proxy: Option<PathBuf>,

    /// Root of the nuclei template tree
    #[arg(long, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    /// Wordlist for the shallow fuzzing pass
    #[arg(long, value_name = "FILE")]
    pub wordlist: Option<PathBuf>,

    /// Wordlist for the deep fuzzing pass
    #[arg(long, value_name = "FILE")]
    pub deep_wordlist: Option<PathBuf>,

    /// Keep scratch files in the session directory
    #[arg(long)]
    pub keep_temp: bool,

    /// Don't save the report to session history
    #[arg(long)]
    pub no_save: bool,

    /// Output format for the summary (defaults to the settings file)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

impl ScanCommand {
    /// Execute the scan command.
    pub async fn execute(&self, ctx: Context) -> CliResult<()> {
        let list = load_targets(&self.target)?;
        for (entry, reason) in &list.rejected {
            output::print_warning(&format!("skipping '{}': {}", entry, reason));
        }
        if list.targets.is_empty() {
            return Err(CliError::NoTargets);
        }

        let format = self.output.unwrap_or_else(|| {
            ctx.settings
                .default_output_format
                .parse()
                .unwrap_or_default()
        });

        let mut settings = ctx.settings.clone();
        if let Some(proxy) = &self.proxy {
            settings.proxy_file = Some(proxy.clone());
        }
        if let Some(templates) = &self.templates {
            settings.templates_root = templates.clone();
        }
        if let Some(wordlist) = &self.wordlist {
            settings.wordlist_common = wordlist.clone();
        }
        if let Some(deep) = &self.deep_wordlist {
            settings.wordlist_deep = deep.clone();
        }
        let save = settings.save_sessions && !self.no_save;

        let base_dir = match &ctx.output_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let mut session = ScanSession::create(&base_dir, list.targets)?;
        session.keep_temporary(self.keep_temp);
        ctx.scan_log.attach(&session.log_file())?;

        let targets: Vec<String> = session.targets().iter().map(ToString::to_string).collect();
        info!(
            session = %session.id(),
            targets = %targets.join(","),
            dir = %session.dir().display(),
            "scan started"
        );

        let interactive = !ctx.quiet && format == OutputFormat::Plain;
        if interactive {
            output::print_scan_header(
                &targets,
                session.dir(),
                Some("throttling profile is chosen after WAF detection"),
            );
        }

        let pipeline = Pipeline::with_defaults(settings);
        let pipeline = if interactive {
            pipeline.with_progress()
        } else {
            pipeline
        };
        let outcomes = pipeline.run(&mut session).await;

        let failed: Vec<_> = outcomes.iter().filter(|o| !o.succeeded()).collect();
        for outcome in &failed {
            warn!(stage = %outcome.stage, error = ?outcome.error, "stage did not complete cleanly");
        }

        let report = Report::collect(&session).await?;
        let report_path = report.write_to(session.dir())?;
        info!(report = %report_path.display(), "{}", report.summary_line());

        if save {
            let store = ReportStore::new(&ctx.paths)?;
            store.save(&report)?;
            if interactive {
                output::print_info(&format!("Session saved as {}", report.session_id.short()));
            }
        }

        output::print_results(&report, format)?;
        if interactive && !failed.is_empty() {
            output::print_warning(&format!(
                "{} stage(s) did not complete cleanly, see {}",
                failed.len(),
                session.log_file().display()
            ));
        }

        ctx.scan_log.detach();
        Ok(())
    }
}
