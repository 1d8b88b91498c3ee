//! Constants for the download module (block sizes, timeouts, retry defaults).

use std::time::Duration;

/// Default streaming block size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default total attempts per download.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default backoff base: attempt `n` waits `base^n` seconds.
pub const DEFAULT_BACKOFF: f64 = 2.0;

/// Default connect/read timeout for GET requests (60 seconds).
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Timeout for the best-effort HEAD probe (10 seconds).
pub const HEAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single backoff sleep (5 minutes).
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(300);

/// Minimum interval between progress display updates.
pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

/// Browser-like User-Agent; the portal rejects obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
