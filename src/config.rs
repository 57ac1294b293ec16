//! Plain configuration structs consumed by the core.
//!
//! Per spec §6, file/env loading and CLI parsing live outside this crate —
//! callers build these structs themselves and pass them in. The fields
//! just collect the magic numbers spec.md calls out by name so they live in
//! one documented place instead of scattered literals.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for [`crate::scheduler::next_check`] and the interval
/// parser.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on how far forward the scheduler searches for a
    /// candidate before giving up and returning the sentinel (spec §4.3).
    pub max_search_horizon_secs: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_search_horizon_secs: 365 * 24 * 3600,
        }
    }
}

/// Tuning knobs for the proxy data-exchange protocol (spec §4.4, §4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProxyExchangeConfig {
    /// Maximum accepted packet size in bytes.
    pub max_recv_bytes: usize,
    /// Bytes reserved for envelope overhead plus at least one record.
    pub json_reserved_bytes: usize,
    /// Maximum records returned by a single `fetch_batch` call.
    pub max_records_per_batch: usize,
    /// Pause before retrying once on an ID-sequence gap.
    pub gap_retry_pause: Duration,
    /// Minimum spacing between repeated version-mismatch warnings.
    pub version_warning_rate_limit: Duration,
    /// Per-request socket timeout.
    pub request_timeout: Duration,
}

impl Default for ProxyExchangeConfig {
    fn default() -> Self {
        Self {
            max_recv_bytes: 128 * 1024 * 1024,
            json_reserved_bytes: 16 * 1024,
            max_records_per_batch: 10_000,
            gap_retry_pause: Duration::from_millis(100),
            version_warning_rate_limit: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ProxyExchangeConfig {
    /// Byte budget available to record emission for a single-kind batch
    /// (spec §4.8: "stops when the cumulative size exceeds
    /// `MAX_RECV - JSON_RESERVED`").
    pub fn single_kind_budget(&self) -> usize {
        self.max_recv_bytes.saturating_sub(self.json_reserved_bytes)
    }

    /// Byte budget per record kind when multiple kinds share one message
    /// (spec §4.8: half of the single-kind budget).
    pub fn batch_kind_budget(&self) -> usize {
        self.single_kind_budget() / 2
    }
}

/// Tuning knobs for [`crate::admission`] (spec §4.7) and
/// [`crate::session`] (spec §4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Session tokens must be exactly this many hex characters.
    pub token_len: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { token_len: 32 }
    }
}
