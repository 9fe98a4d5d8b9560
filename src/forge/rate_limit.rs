//! GitHub API rate-limit tracking.
//!
//! Reads `X-RateLimit-Remaining` / `X-RateLimit-Reset` (or the standardised
//! `RateLimit-Remaining` / `RateLimit-Reset`) from every API response.  The
//! tree walker issues many small listing calls, so an exhausted budget is the
//! most common reason a subtree comes back empty; the state lets us say so.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

/// Shared rate-limit state, updated after every GitHub response.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    remaining: Arc<AtomicU64>,
    /// Unix timestamp at which the window resets.
    reset_at: Arc<AtomicU64>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitState {
    pub fn new() -> Self {
        Self {
            remaining: Arc::new(AtomicU64::new(u64::MAX)),
            reset_at: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Remaining calls, or `u64::MAX` before the first response was seen.
    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::Relaxed)
    }

    pub fn reset_at(&self) -> u64 {
        self.reset_at.load(Ordering::Relaxed)
    }

    /// True once a response reported zero remaining calls.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Update state from response headers.  Returns the remaining count when
    /// the response carried one.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) -> Option<u64> {
        let header_u64 = |primary: &str, fallback: &str| {
            headers
                .get(primary)
                .or_else(|| headers.get(fallback))
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        let remaining = header_u64("X-RateLimit-Remaining", "RateLimit-Remaining");
        let reset = header_u64("X-RateLimit-Reset", "RateLimit-Reset");

        if let Some(r) = remaining {
            self.remaining.store(r, Ordering::Relaxed);
        }
        if let Some(r) = reset {
            self.reset_at.store(r, Ordering::Relaxed);
        }
        if remaining.is_some() || reset.is_some() {
            debug!(?remaining, ?reset, "rate limit state updated");
        }
        remaining
    }

    /// Seconds until the window resets, or 0 if already reset.
    pub fn retry_after_secs(&self) -> u64 {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.reset_at().saturating_sub(now)
    }
}
