//! CLI commands

mod context;
mod land;
mod style;
mod sync;
mod view;

pub use land::{LandCommandOptions, run_land};
pub use sync::{SyncCommandOptions, run_sync};
pub use view::run_view;

use anstream::{eprintln, println};
use async_trait::async_trait;
use strata::progress::ProgressCallback;
use style::{Stylize, arrow};

/// Progress printer for CLI commands
pub struct CliProgress {
    indent: usize,
}

impl CliProgress {
    /// One indented line per step
    pub const fn compact() -> Self {
        Self { indent: 2 }
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_message(&self, message: &str) {
        println!("{:indent$}{} {message}", "", arrow(), indent = self.indent);
    }

    async fn on_warning(&self, message: &str) {
        eprintln!("{:indent$}{}", "", message.warn(), indent = self.indent);
    }
}

/// Prefix for errors printed by `main`
pub fn error_label() -> String {
    "error:".error()
}
