//! Profiles subcommand implementation.
//!
//! Handles `reconflow profiles`, which prints the two fixed throttling
//! profiles the pipeline chooses between.

use crate::cli::Context;
use crate::config::ThrottleProfile;
use crate::error::CliResult;
use clap::{Parser, Subcommand};
use console::style;

/// Inspect throttling profiles.
#[derive(Parser, Debug)]
pub struct ProfilesCommand {
    #[command(subcommand)]
    pub action: ProfilesAction,
}

/// Profile inspection actions.
#[derive(Subcommand, Debug)]
pub enum ProfilesAction {
    /// List both profiles
    List,

    /// Show every setting of one profile
    Show {
        /// Profile name (aggressive or stealthy)
        name: String,
    },
}

impl ProfilesCommand {
    /// Execute the profiles command.
    pub fn execute(&self, ctx: &Context) -> CliResult<()> {
        match &self.action {
            ProfilesAction::List => list_profiles(ctx.quiet),
            ProfilesAction::Show { name } => show_profile(name),
        }
    }
}

fn list_profiles(quiet: bool) -> CliResult<()> {
    if !quiet {
        println!(
            "\n{:<12} {:>6} {:>6} {:>7} {:>7} {:>12}  {}",
            "NAME", "HTTPX", "NAABU", "NUCLEI", "FEROX", "JITTER (ms)", "USED WHEN"
        );
        println!("{}", "-".repeat(76));
    }

    for profile in ThrottleProfile::builtins() {
        let when = if profile.is_stealthy() {
            "a WAF was detected on any host"
        } else {
            "no WAF was detected"
        };
        println!(
            "{:<12} {:>6} {:>6} {:>7} {:>7} {:>12}  {}",
            profile.kind.to_string(),
            profile.httpx_rate_limit,
            profile.naabu_rate,
            profile.nuclei_rate,
            profile.ferox_threads,
            format!("{}-{}", profile.jitter.min_ms, profile.jitter.max_ms),
            when
        );
    }

    if !quiet {
        println!();
    }
    Ok(())
}

fn show_profile(name: &str) -> CliResult<()> {
    let profile = ThrottleProfile::by_name(name)?;

    println!("\nProfile: {}", style(profile.kind).bold());
    println!("{}", "=".repeat(40));
    println!("httpx rate:        {} req/s", profile.httpx_rate_limit);
    println!("httpx delay:       {} s", profile.httpx_delay);
    println!("naabu rate:        {} pps", profile.naabu_rate);
    println!("katana:            {} workers, {} s delay", profile.katana_concurrency, profile.katana_delay);
    println!("nuclei:            {} req/s, bulk {}", profile.nuclei_rate, profile.nuclei_bulk);
    println!(
        "ferox shallow:     {} threads, {} s delay",
        profile.ferox_threads, profile.ferox_delay
    );
    println!(
        "ferox deep:        {} threads, {} s delay",
        profile.deep_ferox_threads(),
        profile.deep_ferox_delay()
    );
    println!(
        "jitter:            {}-{} ms",
        profile.jitter.min_ms, profile.jitter.max_ms
    );
    println!(
        "probes:            {} workers, {} /s",
        profile.probe_concurrency, profile.probe_rate
    );
    println!();

    Ok(())
}
