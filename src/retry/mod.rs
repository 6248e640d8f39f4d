//! Bounded-concurrency retry layer for remote calls (host API and git network)
//!
//! Every remote call goes through an [`ApiLimiter`]:
//! - a FIFO-fair counting semaphore caps in-flight calls regardless of how
//!   much fan-out callers do
//! - recognized transient failures are retried with exponential backoff and
//!   jitter
//! - an explicit "retry after N seconds" hint from the host replaces the
//!   generic backoff, and exhausting retries while rate limited surfaces as
//!   [`Error::RateLimited`] instead of the raw failure
//! - anything else (not found, permission denied, ...) returns immediately

use crate::error::{Error, Result};
use regex::Regex;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default number of concurrent host calls
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Retry policy for a single admitted call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Backoff base
    pub base_delay: Duration,
    /// Backoff cap (also caps host-suggested waits)
    pub max_delay: Duration,
    /// Jitter factor in `[0, 1]`
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: 0.5,
        }
    }
}

/// How a failure should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Host is rate limiting; carries its suggested wait if it gave one
    RateLimited(Option<Duration>),
    /// Worth retrying with backoff
    Transient,
    /// Retrying will not help
    Permanent,
}

static RETRY_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry[- ]after\D{0,3}(\d+)\s*(ms|milliseconds?|s|secs?|seconds?)?")
        .expect("valid regex")
});

/// HTTP status leading a message, after an optional `<kind> error: ` prefix
static LEADING_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w ]+ error: )?([1-5]\d\d)\b").expect("valid regex")
});

static RATE_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rate[- ]?limit|too many requests").expect("valid regex")
});

static TRANSIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)bad gateway|service unavailable|gateway time-?out|timed? ?out|connection (reset|refused|closed|aborted)|econnreset|etimedout|broken pipe|could not resolve host|remote end hung up|early eof|rpc failed|returned error: 5\d\d",
    )
    .expect("valid regex")
});

static PERMANENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)not found|permission denied|forbidden|unauthorized|bad credentials|validation failed")
        .expect("valid regex")
});

/// Extract an explicit "retry after N seconds" hint from a failure message
pub fn parse_retry_after(message: &str) -> Option<Duration> {
    let caps = RETRY_AFTER.captures(message)?;
    let amount: u64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2).map_or("s", |m| m.as_str());
    if unit.to_ascii_lowercase().starts_with("ms") || unit.to_ascii_lowercase().starts_with("milli") {
        Some(Duration::from_millis(amount))
    } else {
        Some(Duration::from_secs(amount))
    }
}

/// Decide whether a failure is retryable, by its message
///
/// Status codes only count when they lead the message, the way host errors
/// are rendered; a number elsewhere (a PR number, say) is just text. A 429
/// or rate-limit phrasing wins over everything (GitHub reports secondary
/// rate limits as 403), then server errors, then permanent markers, then
/// transient ones. Unknown failures are permanent.
pub fn classify_failure(message: &str) -> FailureKind {
    let status = LEADING_STATUS
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok());

    if status == Some(429) || RATE_LIMIT.is_match(message) {
        return FailureKind::RateLimited(parse_retry_after(message));
    }
    match status {
        Some(500 | 502 | 503 | 504) => return FailureKind::Transient,
        Some(400..=499) => return FailureKind::Permanent,
        _ => {}
    }
    if PERMANENT.is_match(message) {
        return FailureKind::Permanent;
    }
    if TRANSIENT.is_match(message) {
        return FailureKind::Transient;
    }
    FailureKind::Permanent
}

/// Exponential backoff with jitter
///
/// `min(max, base * 2^attempt * (1 + rand * jitter))`, where `attempt` is
/// zero-based. With `jitter == 0` this is deterministic and non-decreasing
/// until it reaches `max`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    let factor = 2f64.powi(i32::try_from(attempt.min(62)).unwrap_or(62));
    let noise = if jitter > 0.0 {
        1.0 + rand::random::<f64>() * jitter
    } else {
        1.0
    };
    let scaled = base.as_secs_f64() * factor * noise;
    if !scaled.is_finite() || scaled >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(scaled.max(0.0))
}

/// Gate for all host API calls
#[derive(Debug, Clone)]
pub struct ApiLimiter {
    semaphore: Arc<Semaphore>,
    policy: RetryPolicy,
}

impl Default for ApiLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, RetryPolicy::default())
    }
}

impl ApiLimiter {
    /// Create a limiter admitting `capacity` concurrent calls
    pub fn new(capacity: usize, policy: RetryPolicy) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
            policy,
        }
    }

    /// The retry policy in force
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Permits currently free
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `op` once admitted, retrying transient failures
    ///
    /// The permit is held across retries so a struggling host sees less
    /// traffic, not more.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| Error::Internal(format!("API limiter closed: {e}")))?;

        let mut attempt = 0;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let message = err.to_string();
            let kind = classify_failure(&message);
            let last_attempt = attempt + 1 >= self.policy.max_attempts;

            let wait = match kind {
                FailureKind::Permanent => return Err(err),
                FailureKind::RateLimited(hint) if last_attempt => {
                    let retry_after = hint
                        .unwrap_or_else(|| self.backoff(attempt))
                        .min(self.policy.max_delay);
                    warn!(label, attempt, ?retry_after, "rate limited, giving up");
                    return Err(Error::RateLimited { retry_after });
                }
                FailureKind::Transient if last_attempt => {
                    warn!(label, attempt, error = %message, "retries exhausted");
                    return Err(err);
                }
                FailureKind::RateLimited(Some(hint)) => hint.min(self.policy.max_delay),
                FailureKind::RateLimited(None) | FailureKind::Transient => self.backoff(attempt),
            };

            debug!(label, attempt, ?wait, error = %message, "retrying remote call");
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.policy.base_delay,
            self.policy.max_delay,
            self.policy.jitter,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: 0.0,
        }
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(1_000);
        assert_eq!(calculate_backoff(0, base, max, 0.0), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, base, max, 0.0), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, base, max, 0.0), Duration::from_millis(800));
        assert_eq!(calculate_backoff(4, base, max, 0.0), max);
        assert_eq!(calculate_backoff(40, base, max, 0.0), max);
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(60);
        for _ in 0..100 {
            let wait = calculate_backoff(2, base, max, 0.5);
            assert!(wait >= Duration::from_millis(400));
            assert!(wait <= Duration::from_millis(600));
        }
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(
            parse_retry_after("API rate limit exceeded, retry after 30 seconds"),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Retry-After: 7"),
            Some(Duration::from_secs(7))
        );
        assert_eq!(
            parse_retry_after("retry after 250ms"),
            Some(Duration::from_millis(250))
        );
        assert_eq!(parse_retry_after("secondary rate limit"), None);
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("GitHub API error: 403 You have exceeded a secondary rate limit"),
            FailureKind::RateLimited(None)
        );
        assert_eq!(
            classify_failure("429 too many requests, retry after 12 seconds"),
            FailureKind::RateLimited(Some(Duration::from_secs(12)))
        );
        assert_eq!(classify_failure("GitHub API error: 502 Bad Gateway"), FailureKind::Transient);
        assert_eq!(classify_failure("connection reset by peer"), FailureKind::Transient);
        assert_eq!(classify_failure("operation timed out"), FailureKind::Transient);
        assert_eq!(classify_failure("GitHub API error: 404 Not Found"), FailureKind::Permanent);
        assert_eq!(classify_failure("permission denied"), FailureKind::Permanent);
        assert_eq!(classify_failure("something odd"), FailureKind::Permanent);
    }

    #[test]
    fn test_status_numbers_inside_text_are_not_statuses() {
        assert_eq!(classify_failure("PR #429 not found"), FailureKind::Permanent);
        assert_eq!(
            classify_failure(&Error::PrNotFound(429).to_string()),
            FailureKind::Permanent
        );
        assert_eq!(
            classify_failure("platform error: PR #503 is closed"),
            FailureKind::Permanent
        );
        assert_eq!(
            classify_failure("platform error: 503 Service Unavailable"),
            FailureKind::Transient
        );
        assert_eq!(
            classify_failure("GitHub API error: 429 https://api.github.com/repos/o/r/commits/abc/status"),
            FailureKind::RateLimited(None)
        );
    }

    #[test]
    fn test_git_network_failures_are_transient() {
        assert_eq!(
            classify_failure("git error: git push failed: fatal: unable to access 'https://github.com/o/r/': Could not resolve host: github.com"),
            FailureKind::Transient
        );
        assert_eq!(
            classify_failure("git error: git push failed: fatal: the remote end hung up unexpectedly"),
            FailureKind::Transient
        );
        assert_eq!(
            classify_failure("git error: git push failed: ! [remote rejected] main -> main (protected branch hook declined)"),
            FailureKind::Permanent
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let limiter = ApiLimiter::new(1, quick_policy(3));
        let calls = &AtomicU32::new(0);

        let result = limiter
            .run("test", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::GitHubApi("503 Service Unavailable".to_string()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let limiter = ApiLimiter::new(1, quick_policy(5));
        let calls = &AtomicU32::new(0);

        let result: Result<()> = limiter
            .run("test", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::GitHubApi("404 Not Found".to_string()))
            })
            .await;

        assert!(matches!(result, Err(Error::GitHubApi(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_rate_limit_is_distinguishable() {
        let limiter = ApiLimiter::new(1, quick_policy(2));

        let start = tokio::time::Instant::now();
        let result: Result<()> = limiter
            .run("test", || async {
                Err(Error::GitHubApi(
                    "403 API rate limit exceeded, retry after 5 seconds".to_string(),
                ))
            })
            .await;

        match result {
            Err(Error::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(5));
            }
            other => panic!("Expected RateLimited, got: {other:?}"),
        }
        // One wait between the two attempts, using the host's hint verbatim
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_hint_is_capped() {
        let limiter = ApiLimiter::new(1, quick_policy(1));
        let result: Result<()> = limiter
            .run("test", || async {
                Err(Error::Platform("rate limit: retry after 3600 seconds".to_string()))
            })
            .await;

        assert!(matches!(
            result,
            Err(Error::RateLimited { retry_after }) if retry_after == Duration::from_secs(10)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let limiter = ApiLimiter::new(2, quick_policy(1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let limiter = limiter.clone();
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    limiter
                        .run("test", || {
                            let in_flight = Arc::clone(&in_flight);
                            let peak = Arc::clone(&peak);
                            async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(50)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok(())
                            }
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.available_permits(), 2);
    }
}
