//! Crate-wide error handling.
//!
//! Mirrors the error taxonomy a monitoring server/proxy actually needs to
//! act on (spec §7): some errors are per-record and get logged-and-skipped,
//! some abort the current exchange and ask the peer to retry, and a small
//! set are fatal. The enum carries enough structure that callers branch on
//! variants rather than matching strings.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed interval string, wire JSON, or certificate DN.
    #[error("parse error in {kind}: {span}")]
    Parse { kind: &'static str, span: String },

    /// Connection rejected before any payload was read. `reason` is a
    /// coarse category only (spec §4.7: never leak which specific check
    /// failed beyond a category).
    #[error("connection rejected: {reason}")]
    Admission { reason: &'static str },

    /// Version/session-token mismatch reported back to the peer with
    /// `response=failed`; the connection stays open for the current
    /// request only.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A single item/record failed a caller-specific policy check. Per-item,
    /// logged, item dropped, batch continues.
    #[error("validation failed for item {item_id}: {reason}")]
    Validation { item_id: u64, reason: String },

    /// Deadlock, lock timeout, or other recoverable storage failure. Rolled
    /// back and retried with bounded exponential backoff; surfaced to the
    /// peer as a [`CoreError::Protocol`] if retries are exhausted.
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// Schema mismatch, allocator failure, or anything else that means the
    /// process cannot make further progress.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl CoreError {
    /// Whether the caller should retry the operation that produced this
    /// error rather than surface it immediately.
    pub fn recoverable(&self) -> bool {
        matches!(self, CoreError::TransientStore(_))
    }
}

/// Exponential backoff policy for [`CoreError::TransientStore`] retries
/// (spec §7: "retried with exponential backoff up to a small cap").
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max_attempts: u32,
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(50),
            max_attempts: 5,
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.initial * self.multiplier.saturating_pow(attempt)
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping with exponential
/// backoff between attempts, as long as the returned error is
/// [`CoreError::recoverable`]. A non-recoverable error returns immediately.
pub async fn retry_with_backoff<F, Fut, T>(policy: BackoffPolicy, mut op: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = CoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.recoverable() && attempt + 1 < policy.max_attempts => {
                tokio::time::sleep(policy.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

impl fmt::Display for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backoff(initial={:?}, attempts={}, x{})",
            self.initial, self.max_attempts, self.multiplier
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_and_gives_up() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy {
            initial: Duration::from_millis(1),
            max_attempts: 3,
            multiplier: 1,
        };
        let result: CoreResult<()> = retry_with_backoff(policy, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::TransientStore("locked".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_recoverable_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = retry_with_backoff(BackoffPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::Fatal("schema mismatch".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
