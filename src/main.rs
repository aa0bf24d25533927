use anyhow::Context;
use clap::Parser;
use reconflow::cli::{Cli, Commands};
use reconflow::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let scan_log = logging::init(cli.verbose, cli.quiet);

    let action = match &cli.command {
        Commands::Scan(cmd) => format!("scan of {}", cmd.target),
        Commands::Profiles(_) => "profiles".to_string(),
        Commands::Export(cmd) => format!("export of session {}", cmd.session_id),
        Commands::History(_) => "history".to_string(),
    };
    cli.run(scan_log)
        .await
        .with_context(|| format!("{} failed", action))
}
