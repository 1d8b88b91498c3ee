//! Retry logic with exponential backoff for transient download failures.
//!
//! When a download attempt fails, the error is classified into a
//! [`FailureType`]:
//! - [`FailureType::Transient`] - network faults, timeouts, unexpected HTTP
//!   statuses and non-permission IO errors; the attempt is retried
//! - [`FailureType::Permanent`] - unwritable destinations, permission errors
//!   and invalid URLs; retrying cannot help
//!
//! [`RetryPolicy`] owns the attempt budget and the backoff schedule, so the
//! downloader never re-derives the math at call sites.
//!
//! # Example
//!
//! ```
//! use anac_core::download::{
//!     DownloadError, RetryPolicy, RetryDecision, classify_error
//! };
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/a.zip", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::io::ErrorKind;
use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::{DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES, MAX_BACKOFF_DELAY};

/// Classification of download failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,

    /// Failure that won't succeed regardless of retries.
    Permanent,
}

/// Decision on whether to retry a failed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the download after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the download.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Attempt budget and backoff schedule.
///
/// # Delay Calculation
///
/// ```text
/// delay(n) = min(backoff_base^n seconds, max_delay)
/// ```
///
/// where `n` is the attempt that just failed. With the defaults (5 attempts,
/// base 2) the sleeps are 2s, 4s, 8s and 16s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base of the exponential backoff, in seconds.
    backoff_base: f64,

    /// Maximum delay cap.
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF,
            max_delay: MAX_BACKOFF_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and backoff base.
    ///
    /// `max_attempts` is clamped to at least 1; a negative or non-finite
    /// base is treated as 0 (no sleep).
    #[must_use]
    pub fn new(max_attempts: u32, backoff_base: f64) -> Self {
        let backoff_base = if backoff_base.is_finite() && backoff_base > 0.0 {
            backoff_base
        } else {
            0.0
        };
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            max_delay: MAX_BACKOFF_DELAY,
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after attempt `attempt` (1-indexed) failed.
    #[instrument(level = "debug", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.delay_for(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Sleep before the retry that follows failed attempt `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.backoff_base.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Classifies a download error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Network, Timeout | Transient |
/// | HttpStatus (any) | Transient |
/// | Incomplete | Transient |
/// | Io (permission denied, read-only fs) | Permanent |
/// | Io (other) | Transient |
/// | Destination, InvalidUrl, Client | Permanent |
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::HttpStatus { .. }
        | DownloadError::Incomplete { .. } => FailureType::Transient,

        DownloadError::Io { source, .. } => {
            if matches!(
                source.kind(),
                ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem
            ) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }

        DownloadError::Destination { .. }
        | DownloadError::InvalidUrl { .. }
        | DownloadError::Client { .. } => FailureType::Permanent,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert!((policy.backoff_base - 2.0).abs() < f64::EPSILON);
        assert_eq!(policy.max_delay, MAX_BACKOFF_DELAY);
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::new(0, 2.0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_retry_policy_negative_base_means_no_sleep() {
        let policy = RetryPolicy::new(3, -1.0);
        assert_eq!(policy.delay_for(2), Duration::ZERO);
    }

    // ==================== Delay Calculation Tests ====================

    #[test]
    fn test_delay_is_base_to_the_attempt() {
        let policy = RetryPolicy::new(5, 2.0);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::new(50, 2.0);
        assert_eq!(policy.delay_for(20), MAX_BACKOFF_DELAY);
    }

    #[test]
    fn test_zero_base_gives_zero_delay() {
        let policy = RetryPolicy::new(3, 0.0);
        assert_eq!(policy.delay_for(1), Duration::ZERO);
    }

    // ==================== should_retry Tests ====================

    #[test]
    fn test_should_retry_transient_within_budget() {
        let policy = RetryPolicy::new(3, 2.0);
        assert_eq!(
            policy.should_retry(FailureType::Transient, 1),
            RetryDecision::Retry {
                delay: Duration::from_secs(2),
                attempt: 2
            }
        );
    }

    #[test]
    fn test_should_not_retry_when_budget_exhausted() {
        let policy = RetryPolicy::new(3, 2.0);
        let decision = policy.should_retry(FailureType::Transient, 3);
        assert!(
            matches!(decision, RetryDecision::DoNotRetry { ref reason } if reason.contains("exhausted"))
        );
    }

    #[test]
    fn test_should_not_retry_permanent() {
        let policy = RetryPolicy::new(3, 2.0);
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    // ==================== classify_error Tests ====================

    #[test]
    fn test_classify_http_status_is_transient() {
        for status in [404, 416, 500, 503] {
            let error = DownloadError::http_status("https://x.com/a", status);
            assert_eq!(classify_error(&error), FailureType::Transient);
        }
    }

    #[test]
    fn test_classify_io_permission_is_permanent() {
        let denied = DownloadError::io(
            "/tmp/a",
            std::io::Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        let other = DownloadError::io("/tmp/a", std::io::Error::other("disk hiccup"));
        assert_eq!(classify_error(&denied), FailureType::Permanent);
        assert_eq!(classify_error(&other), FailureType::Transient);
    }

    #[test]
    fn test_classify_destination_and_url_are_permanent() {
        let destination = DownloadError::destination(
            "/readonly",
            std::io::Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(classify_error(&destination), FailureType::Permanent);
        assert_eq!(
            classify_error(&DownloadError::invalid_url("nope")),
            FailureType::Permanent
        );
        assert_eq!(
            classify_error(&DownloadError::timeout("https://x.com")),
            FailureType::Transient
        );
    }
}
