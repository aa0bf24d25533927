//! Export subcommand implementation.
//!
//! Handles the `reconflow export <session-id>` command for exporting saved
//! session reports.

use crate::cli::{Context, OutputFormat};
use crate::error::CliResult;
use crate::output;
use crate::storage::ReportStore;
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

/// Export a saved session report.
#[derive(Parser, Debug)]
pub struct ExportCommand {
    /// Session ID or prefix to export
    ///
    /// Can be a full UUID or the first few characters (short ID).
    #[arg(value_name = "SESSION_ID")]
    pub session_id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Output file path (prints to stdout if not specified)
    #[arg(short = 'o', long = "output")]
    pub output_file: Option<PathBuf>,
}

impl ExportCommand {
    /// Execute the export command.
    pub fn execute(&self, ctx: &Context) -> CliResult<()> {
        let store = ReportStore::new(&ctx.paths)?;
        let report = store.find_by_prefix(&self.session_id)?;

        match &self.output_file {
            Some(path) => {
                let mut out = BufWriter::new(File::create(path)?);
                output::write_results(&mut out, &report, self.format)?;
                if !ctx.quiet {
                    output::print_success(&format!(
                        "Exported session {} to {}",
                        report.session_id.short(),
                        path.display()
                    ));
                }
            }
            None => output::print_results(&report, self.format)?,
        }

        Ok(())
    }
}
