//! Terminal styling helpers
//!
//! Output goes through `anstream`, which strips these escapes when the
//! terminal does not support color.

use indicatif::ProgressStyle;
use owo_colors::OwoColorize;
use std::fmt::Display;

/// Check mark for completed steps
pub const CHECK: &str = "✓";

/// Semantic styles for CLI output
pub trait Stylize: Display + Sized {
    /// Headings and names the user should notice
    fn emphasis(&self) -> String {
        self.bold().to_string()
    }

    /// Secondary information
    fn muted(&self) -> String {
        self.dimmed().to_string()
    }

    /// Identifiers: branches, PR numbers, counts
    fn accent(&self) -> String {
        self.cyan().to_string()
    }

    /// Completed actions
    fn success(&self) -> String {
        self.green().to_string()
    }

    /// Things that need attention
    fn warn(&self) -> String {
        self.yellow().to_string()
    }

    /// Failures
    fn error(&self) -> String {
        self.red().bold().to_string()
    }
}

impl<T: Display> Stylize for T {}

/// Green check mark
pub fn check() -> String {
    CHECK.success()
}

/// Dimmed arrow for list items
pub fn arrow() -> String {
    "→".muted()
}

/// Spinner used while waiting on the network
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

/// PR reference, hyperlinked when the terminal supports it
pub fn pr_link(number: u64, url: &str) -> String {
    let text = format!("#{number}");
    if url.is_empty() || !supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        return text.accent();
    }
    terminal_link::Link::new(&text, url).to_string().accent()
}
