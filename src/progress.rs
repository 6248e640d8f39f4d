//! Progress reporting for long-running operations

use async_trait::async_trait;

/// Receives human-readable progress from sync and land
///
/// The library never prints; the CLI decides how (and whether) to show these.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// A step started or finished
    async fn on_message(&self, message: &str);

    /// Something went wrong but the operation carried on
    async fn on_warning(&self, message: &str) {
        self.on_message(message).await;
    }
}

/// Progress sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_message(&self, _message: &str) {}
}
