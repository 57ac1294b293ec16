//! Per-request cancellation for socket timeouts (spec §5).
//!
//! "The timeout is implemented as a single flag consulted at each
//! suspension point; firing it sets a thread-local timed_out bit and the
//! in-flight operation returns a timeout error at the next check." A
//! [`CancelToken`] is that flag, made shareable and composable the way the
//! teacher's cancellation primitive is (clone-and-share, notify-on-cancel),
//! but without the hierarchical parent/child scopes the teacher's editor
//! domain needs — one flat token per request is all a socket operation
//! timeout requires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::CoreError;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cooperative cancellation flag shared across the suspension points of
/// one request.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<Inner>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(Inner::default()))
    }

    /// Fires the flag; every suspension point checking this token will
    /// observe `is_cancelled() == true` from this point on.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Returns a timeout error if the token has fired, otherwise `Ok(())`.
    /// Call this at each suspension point (spec §5).
    pub fn check(&self) -> Result<(), CoreError> {
        if self.is_cancelled() {
            Err(CoreError::Protocol("request timed out".into()))
        } else {
            Ok(())
        }
    }

    /// Resolves once [`CancelToken::cancel`] has been called.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.0.notify.notified().await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Arms a [`CancelToken`] after `timeout` unless the returned guard is
/// dropped first. Mirrors the per-request 30s default in spec §5.
pub fn arm_timeout(token: CancelToken, timeout: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => token.cancel(),
            _ = token.cancelled() => {}
        }
    })
}
