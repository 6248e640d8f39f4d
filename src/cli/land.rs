//! Land command - fast-forward ready PRs onto the default branch

use crate::cli::CliProgress;
use crate::cli::context::CommandContext;
use crate::cli::style::{CHECK, Stylize, check, pr_link, spinner_style};
use anstream::println;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use std::path::Path;
use std::time::Duration;
use strata::error::{Error, Result};
use strata::git::VcsService;
use strata::land::{
    LandCandidate, LandMode, LandOptions, LandReport, capture_snapshots, land_candidates,
    land_stack,
};
use strata::platform::enrich_units;

/// Options for the land command
#[derive(Debug, Clone, Default)]
pub struct LandCommandOptions {
    /// Land every consecutive ready PR instead of just the bottom one
    pub all: bool,
    /// Dry run - show readiness without landing anything
    pub dry_run: bool,
    /// Prompt for confirmation before landing
    pub confirm: bool,
}

/// Run the land command
pub async fn run_land(path: &Path, remote: Option<&str>, options: LandCommandOptions) -> Result<()> {
    let ctx = CommandContext::new(path, remote).await?;
    let vcs = ctx.vcs();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(spinner_style());
    spinner.set_message(format!("Fetching from {}...", ctx.git.remote().emphasis()));
    spinner.enable_steady_tick(Duration::from_millis(80));
    vcs.fetch().await?;
    spinner.finish_with_message(format!(
        "{} Fetched from {}",
        check(),
        ctx.git.remote().emphasis()
    ));

    let units = ctx.read_units().await?;
    if units.is_empty() {
        println!("{}", "No stack found ahead of the default branch.".muted());
        return Ok(());
    }

    let host = ctx.connect().await?;
    let enriched = enrich_units(&host, &units, &ctx.config.branch_prefix).await?;
    let candidates = land_candidates(&enriched);
    if candidates.is_empty() {
        println!("{}", "No open PRs in the stack.".muted());
        return Ok(());
    }

    if options.dry_run || options.confirm {
        print_readiness(&host, &candidates).await?;
        if options.dry_run {
            println!("{}", "Run without --dry-run to land.".muted());
            return Ok(());
        }
        if !Confirm::new()
            .with_prompt("Proceed with land?")
            .default(true)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?
        {
            println!("{}", "Aborted".muted());
            return Ok(());
        }
        println!();
    }

    let land_options = LandOptions {
        mode: if options.all {
            LandMode::AllConsecutive
        } else {
            LandMode::Single
        },
        default_branch: ctx.default_branch.clone(),
        poll_interval: ctx.config.land.poll_interval(),
        poll_timeout: ctx.config.land.poll_timeout(),
    };

    println!(
        "{} onto {}",
        "Landing".emphasis(),
        ctx.default_branch.accent()
    );
    let progress = CliProgress::compact();
    let report = land_stack(&enriched, &host, &vcs, &land_options, &progress).await?;

    print_land_summary(&report);
    Ok(())
}

/// Show readiness per candidate (takes its own snapshot)
async fn print_readiness(
    host: &dyn strata::platform::HostService,
    candidates: &[LandCandidate],
) -> Result<()> {
    let snapshots = capture_snapshots(host, candidates).await?;

    println!("{}:", "Land plan".emphasis());
    println!();
    for candidate in candidates {
        let number = candidate.pr.number;
        let link = pr_link(number, &candidate.pr.html_url);
        match snapshots.get(&number) {
            Some(snapshot) if snapshot.is_ready => {
                println!("  {} {link}: {}", "✓ ready".success(), candidate.pr.title);
            }
            Some(snapshot) => {
                println!("  {} {link}: {}", "✗ blocked".warn(), candidate.pr.title);
                for reason in snapshot.blocking_reasons() {
                    println!("    - {}", reason.muted());
                }
            }
            None => println!("  {} {link}", "? unknown".muted()),
        }
    }
    println!();
    Ok(())
}

fn print_land_summary(report: &LandReport) {
    println!();
    if report.has_landed() {
        println!(
            "{} {} PR(s)",
            format!("{CHECK} Landed").success(),
            report.landed.len().accent()
        );
        for landed in &report.landed {
            println!("   #{} ({})", landed.pr_number, landed.unit_id.accent());
        }
    } else {
        println!("{}", "Nothing landed".muted());
    }

    if let Some(stopped) = &report.stopped_at {
        println!(
            "   {} #{}: {}",
            "Stopped at".warn(),
            stopped.pr_number,
            stopped.reasons.join(", ").muted()
        );
    }

    if !report.failed_deletions.is_empty() {
        println!(
            "   {} {}",
            "Could not delete:".warn(),
            report.failed_deletions.join(", ")
        );
    }
}
