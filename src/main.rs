//! strata - stacked pull requests from commit trailers

mod cli;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cli::{LandCommandOptions, SyncCommandOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "strata", version, about = "Stacked pull requests from commit trailers")]
struct Cli {
    /// Path inside the repository (defaults to the current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Remote to use (defaults to the configured remote, usually origin)
    #[arg(long, global = true)]
    remote: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stack as PR units
    View,

    /// Push branches and keep the PR chain in line with the local stack
    Sync {
        /// Open PRs for units that do not have one yet
        #[arg(long)]
        publish: bool,

        /// Only open PRs for this unit (repeatable)
        #[arg(long, value_name = "UNIT", conflicts_with = "up_to")]
        only: Vec<String>,

        /// Only open PRs for units up to and including this one
        #[arg(long, value_name = "UNIT")]
        up_to: Option<String>,

        /// Show what would be done without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Preview the plan and ask before executing
        #[arg(long)]
        confirm: bool,
    },

    /// Land ready PRs by fast-forwarding the default branch
    Land {
        /// Land every consecutive ready PR, not just the bottom one
        #[arg(long)]
        all: bool,

        /// Show readiness without landing anything
        #[arg(long)]
        dry_run: bool,

        /// Show readiness and ask before landing
        #[arg(long)]
        confirm: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "strata=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = match cli.path {
        Some(path) => path,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let remote = cli.remote.as_deref();

    match cli.command {
        Commands::View => cli::run_view(&path, remote).await?,
        Commands::Sync {
            publish,
            only,
            up_to,
            dry_run,
            confirm,
        } => {
            let options = SyncCommandOptions {
                publish,
                only,
                up_to,
                dry_run,
                confirm,
            };
            cli::run_sync(&path, remote, options).await?;
        }
        Commands::Land {
            all,
            dry_run,
            confirm,
        } => {
            let options = LandCommandOptions {
                all,
                dry_run,
                confirm,
            };
            cli::run_land(&path, remote, options).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            anstream::eprintln!("{} {e:#}", cli::error_label());
            ExitCode::FAILURE
        }
    }
}
