//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `reconflow scan <target>` - Run the pipeline against a domain or domain list
//! - `reconflow profiles list|show` - Inspect the throttling profiles
//! - `reconflow export <session-id>` - Export a saved session report
//! - `reconflow history` - View session history

mod export;
mod history;
mod profiles;
mod scan;

pub use export::ExportCommand;
pub use history::HistoryCommand;
pub use profiles::{ProfilesAction, ProfilesCommand};
pub use scan::ScanCommand;

use crate::config::{AppSettings, Paths};
use crate::error::CliResult;
use crate::logging::ScanLog;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// reconflow - adaptive reconnaissance pipeline.
///
/// Drives subdomain enumeration, live checks, WAF detection, crawling,
/// fingerprinting and technology-targeted vulnerability scanning, slowing
/// every later tool down as soon as a WAF is seen.
#[derive(Parser, Debug)]
#[command(name = "reconflow")]
#[command(author = "HueCodes <huecodes@proton.me>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "An adaptive reconnaissance pipeline", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to custom settings file
    #[arg(long, global = true, value_name = "PATH", env = "RECONFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory in which session directories are created
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the recon pipeline against a target
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Inspect throttling profiles
    #[command(alias = "p")]
    Profiles(ProfilesCommand),

    /// Export a saved session report
    #[command(alias = "e")]
    Export(ExportCommand),

    /// View session history
    #[command(alias = "h")]
    History(HistoryCommand),
}

/// Shared state every subcommand runs with.
pub struct Context {
    pub paths: Paths,
    pub settings: AppSettings,
    pub output_dir: Option<PathBuf>,
    pub verbose: bool,
    pub quiet: bool,
    pub scan_log: ScanLog,
}

impl Cli {
    /// Resolve directories and settings for this invocation.
    pub fn context(&self, scan_log: ScanLog) -> CliResult<Context> {
        let paths = Paths::discover()?;
        let settings = match &self.config {
            Some(path) => AppSettings::load_from(path)?,
            None => AppSettings::load(&paths)?,
        };
        Ok(Context {
            paths,
            settings,
            output_dir: self.output_dir.clone(),
            verbose: self.verbose,
            quiet: self.quiet,
            scan_log,
        })
    }

    /// Dispatch to the selected subcommand.
    pub async fn run(self, scan_log: ScanLog) -> CliResult<()> {
        let ctx = self.context(scan_log)?;
        match &self.command {
            Commands::Scan(cmd) => cmd.execute(ctx).await,
            Commands::Profiles(cmd) => cmd.execute(&ctx),
            Commands::Export(cmd) => cmd.execute(&ctx),
            Commands::History(cmd) => cmd.execute(&ctx),
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as clap::ValueEnum>::from_str(s, true)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan() {
        let cli = Cli::parse_from([
            "reconflow",
            "-v",
            "scan",
            "example.com",
            "--proxy",
            "proxies.txt",
            "--keep-temp",
            "-o",
            "json",
        ]);
        assert!(cli.verbose);
        let Commands::Scan(scan) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(scan.target, "example.com");
        assert_eq!(scan.proxy, Some(PathBuf::from("proxies.txt")));
        assert!(scan.keep_temp);
        assert_eq!(scan.output, Some(OutputFormat::Json));
    }

    #[test]
    fn test_output_format_from_settings_string() {
        assert_eq!("CSV".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
