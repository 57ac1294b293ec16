//! Tracing spans and a metrics-sink seam for the core.
//!
//! The log/metric sinks themselves are out of scope (spec §1: "abstracted
//! as a preprocessor sink that accepts `(item_id, timestamp, value_or_state)`
//! triples"), so this module only standardizes *how* the core announces
//! work to whatever backend the caller wires in — one [`tracing::Span`]
//! helper per major operation, and a trait the caller implements for
//! counters/gauges without this crate depending on a concrete exporter.

use tracing::{span, Level, Span};

/// Span for a single scheduling decision.
pub fn schedule_item_span(item_id: u64, seed: u64) -> Span {
    span!(Level::DEBUG, "schedule_item", item.id = item_id, item.seed = seed)
}

/// Span for one proxy data-exchange request.
pub fn exchange_batch_span(proxy_id: u64, table: &str) -> Span {
    span!(Level::INFO, "exchange_batch", proxy.id = proxy_id, table)
}

/// Span for a configuration-sync apply pass over one table.
pub fn sync_config_span(table: &str) -> Span {
    span!(Level::INFO, "sync_config", table)
}

/// Span for one connection-admission decision.
pub fn admit_connection_span(peer: &str) -> Span {
    span!(Level::DEBUG, "admit_connection", peer)
}

/// Counters and gauges the core reports during normal operation. Callers
/// provide a concrete implementation (Prometheus, StatsD, a test double);
/// the default no-op implementation lets the core run without one wired up.
pub trait MetricsSink: Send + Sync {
    fn record_scheduled(&self, _item_type: &str) {}
    fn record_batch_sent(&self, _table: &str, _records: usize, _bytes: usize) {}
    fn record_dedup_discard(&self, _owner: &str) {}
    fn record_admission_rejected(&self, _reason: &str) {}
    fn record_config_sync(&self, _table: &str, _inserts: usize, _updates: usize, _deletes: usize) {}
}

/// A [`MetricsSink`] that discards everything, used when the caller has not
/// wired in a real backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_all_calls() {
        let sink = NoopMetrics;
        sink.record_scheduled("snmp");
        sink.record_batch_sent("history", 10, 2048);
        sink.record_dedup_discard("proxy-1");
        sink.record_admission_rejected("cert issuer mismatch");
        sink.record_config_sync("items", 1, 2, 0);
    }
}
