//! View command - show the parsed stack

use crate::cli::context::CommandContext;
use crate::cli::style::Stylize;
use anstream::println;
use std::path::Path;
use strata::error::Result;
use strata::types::{PrUnit, UnitKind, short_hash};

/// Run the view command
pub async fn run_view(path: &Path, remote: Option<&str>) -> Result<()> {
    let ctx = CommandContext::new(path, remote).await?;
    let units = ctx.read_units().await?;

    if units.is_empty() {
        println!(
            "{}",
            format!("No commits ahead of {}", ctx.default_branch).muted()
        );
        return Ok(());
    }

    println!(
        "{} {} unit(s) on {}",
        "Stack:".emphasis(),
        units.len().accent(),
        ctx.default_branch.accent()
    );
    println!();

    // Newest at the top, like `git log`
    for (index, unit) in units.iter().enumerate().rev() {
        print_unit(index + 1, unit, &ctx.config.branch_prefix);
    }

    if units.iter().any(PrUnit::needs_commit_ids) {
        println!();
        println!(
            "{}",
            "* some commits have no Strata-Commit-Id trailer".warn()
        );
    }

    Ok(())
}

fn print_unit(position: usize, unit: &PrUnit, prefix: &str) {
    let marker = if unit.needs_commit_ids() { " *" } else { "" };
    let kind = match unit.kind {
        UnitKind::Single => "single".muted(),
        UnitKind::Group => "group ".accent(),
    };

    println!(
        "  {position:>2}. {kind} {}{}",
        unit.display_title().emphasis(),
        marker.warn()
    );
    let count = unit.commit_hashes.len();
    println!(
        "      {} {}",
        unit.head_branch(prefix).muted(),
        format!("({count} commit{})", if count == 1 { "" } else { "s" }).muted()
    );

    if unit.kind == UnitKind::Group {
        for hash in &unit.commit_hashes {
            println!("      {}", short_hash(hash).muted());
        }
    }
}
