//! Sync command - sync current stack with remote

use crate::cli::CliProgress;
use crate::cli::context::CommandContext;
use crate::cli::style::{CHECK, Stylize, arrow, check, pr_link, spinner_style};
use anstream::println;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use std::path::Path;
use std::time::Duration;
use strata::error::{Error, Result};
use strata::git::VcsService;
use strata::progress::NoopProgress;
use strata::stack::{Selection, resolve_selection};
use strata::sync::{self, SyncAction, SyncOptions, SyncPlanOptions, SyncReport};

/// Options for the sync command
#[derive(Debug, Clone, Default)]
pub struct SyncCommandOptions {
    /// Open PRs for units that have none
    pub publish: bool,
    /// Only these units may get new PRs
    pub only: Vec<String>,
    /// Units up to and including this one may get new PRs
    pub up_to: Option<String>,
    /// Dry run - show what would be done without making changes
    pub dry_run: bool,
    /// Preview plan and prompt for confirmation before executing
    pub confirm: bool,
}

impl SyncCommandOptions {
    fn selection(&self) -> Option<Selection> {
        if !self.only.is_empty() {
            Some(Selection::Only(self.only.clone()))
        } else {
            self.up_to.clone().map(Selection::UpTo)
        }
    }
}

/// Run the sync command
pub async fn run_sync(path: &Path, remote: Option<&str>, options: SyncCommandOptions) -> Result<()> {
    let ctx = CommandContext::new(path, remote).await?;
    let vcs = ctx.vcs();

    // Fetch from remote with spinner
    if !options.dry_run {
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
    }

    let units = ctx.read_units().await?;
    if units.is_empty() {
        println!("{}", "No stack to sync".muted());
        println!(
            "{}",
            format!("Commit on top of {} first.", ctx.default_branch).muted()
        );
        return Ok(());
    }

    let selected = options
        .selection()
        .map(|selection| resolve_selection(&units, &selection))
        .transpose()?;

    let host = ctx.connect().await?;
    let mut sync_options = SyncOptions {
        plan: SyncPlanOptions {
            publish: options.publish,
            selected,
            default_branch: ctx.default_branch.clone(),
        },
        dry_run: true,
    };

    // Show confirmation if requested
    if options.confirm && !options.dry_run {
        let preview =
            sync::run_sync(&units, &host, &vcs, &ctx.config, &sync_options, &NoopProgress).await?;
        print_sync_preview(&preview);
        if !Confirm::new()
            .with_prompt("Proceed with sync?")
            .default(true)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?
        {
            println!("{}", "Aborted".muted());
            return Ok(());
        }
        println!();
    }

    println!(
        "{} {} unit(s)",
        "Syncing stack:".emphasis(),
        units.len().accent()
    );

    sync_options.dry_run = options.dry_run;
    let progress = CliProgress::compact();
    let report =
        sync::run_sync(&units, &host, &vcs, &ctx.config, &sync_options, &progress).await?;

    // Summary
    println!();
    if options.dry_run {
        print_sync_preview(&report);
        println!("{}", "Dry run complete".muted());
        return Ok(());
    }

    for pr in &report.created {
        println!("  {} {}", pr_link(pr.number, &pr.html_url), pr.title);
    }

    if !report.is_success() {
        println!("{}", "Sync finished with errors:".error());
        for failure in &report.failures {
            println!("  {} {}: {}", arrow(), failure.unit_id.accent(), failure.message);
        }
        return Err(Error::SyncIncomplete(report.failures.len()));
    }

    println!(
        "{} {} pushed, {} created, {} retargeted, {} retired",
        format!("{CHECK} Sync complete:").success(),
        report.pushed.len().accent(),
        report.created.len().accent(),
        (report.retargeted.len() + report.retirement.retargeted.len()).accent(),
        report.retirement.merged_branches.len().accent()
    );

    Ok(())
}

/// Print the sync plan
fn print_sync_preview(report: &SyncReport) {
    println!("{}:", "Sync plan".emphasis());
    println!();

    if !report.retirement.merged_branches.is_empty() {
        println!("  {}:", "Merged".emphasis());
        for branch in &report.retirement.merged_branches {
            println!("    {} delete {}", arrow(), branch.muted());
        }
        for number in &report.retirement.retargeted {
            println!("    {} retarget #{number} onto the default branch", arrow());
        }
        println!();
    }

    if report.change_count() == 0 && !report.entries.iter().any(|e| e.push) {
        println!("  {}", "Already in sync".muted());
        println!();
        return;
    }

    println!("  {}:", "Units".emphasis());
    for entry in &report.entries {
        let line = format!("{} {}", entry.unit_id.accent(), entry);
        match entry.action {
            SyncAction::Create | SyncAction::Update => println!("    {} {line}", arrow()),
            _ => println!("    {} {}", arrow(), line.muted()),
        }
    }

    println!();
}
