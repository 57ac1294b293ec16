//! Record buffer & batcher (C4, spec §4.4): drains a proxy-local append-only
//! queue in monotone-ID batches bounded by row count and JSON byte budget.
//! Grounded on the teacher's queue/batching pair (`execution/queue.rs`,
//! `performance/batching.rs`): a trait over the backing store plus a pure
//! `fetch_batch` that walks it, same division of concerns kept here between
//! [`RecordTable`] (storage) and [`fetch_batch`] (policy).

use std::time::Duration;

use crate::config::ProxyExchangeConfig;
use crate::error::CoreResult;

/// One row in a proxy-local record queue (history, discovery, or
/// autoregistration). The batcher only needs the id and its JSON-encoded
/// size; the actual field layout is the caller's (spec §4.4's declarative
/// per-table schema lives above this trait, not inside it).
pub trait RecordRow {
    fn id(&self) -> u64;
    /// Size in bytes this row would occupy once JSON-encoded, including its
    /// array-element overhead (comma, brackets).
    fn json_size(&self) -> usize;
}

/// Backing store for one proxy-local record queue.
pub trait RecordTable {
    type Row: RecordRow;

    /// Rows with `id > after`, ordered by id, without a count bound —
    /// [`fetch_batch`] applies the bound and the gap-retry policy.
    fn rows_after(&self, after: u64) -> CoreResult<Vec<Self::Row>>;

    /// Persists `last_sent_id` for this table, inserting if absent.
    fn advance(&self, new_high_water: u64) -> CoreResult<()>;

    /// Count of rows not yet sent (`id > last_sent_id`).
    fn pending_count(&self, last_sent_id: u64) -> CoreResult<u64>;
}

/// Result of one [`fetch_batch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<R> {
    pub records: Vec<R>,
    pub high_water_id: u64,
    pub more: bool,
}

/// Drains up to `max_records` rows (or until `json_budget_bytes` is
/// exceeded) with `id > last_sent_id`, retrying once on a detected ID gap
/// before proceeding anyway (spec §4.4).
pub fn fetch_batch<T: RecordTable>(
    table: &T,
    last_sent_id: u64,
    max_records: usize,
    json_budget_bytes: usize,
) -> CoreResult<Batch<T::Row>> {
    let mut rows = table.rows_after(last_sent_id)?;

    if has_gap(last_sent_id, &rows) {
        std::thread::sleep(Duration::from_millis(100));
        rows = table.rows_after(last_sent_id)?;
        // Gap persists: proceed anyway, per spec.md's retry-once-then-proceed policy.
    }

    let mut out = Vec::new();
    let mut size = 0usize;
    let mut hit_budget = false;

    for row in rows {
        if out.len() >= max_records {
            break;
        }
        let next_size = size + row.json_size();
        if next_size > json_budget_bytes && !out.is_empty() {
            hit_budget = true;
            break;
        }
        size = next_size;
        out.push(row);
    }

    let high_water_id = out.last().map(|r| r.id()).unwrap_or(last_sent_id);
    let more = out.len() == max_records || hit_budget;

    Ok(Batch { records: out, high_water_id, more })
}

fn has_gap<R: RecordRow>(last_sent_id: u64, rows: &[R]) -> bool {
    match rows.first() {
        Some(first) if last_sent_id != 0 => first.id() > last_sent_id + 1,
        _ => false,
    }
}

/// Per-kind byte budget for a batch exchange carrying a single record kind
/// (spec §4.8 size discipline: `MAX_RECV - JSON_RESERVED`).
pub fn single_kind_budget(cfg: &ProxyExchangeConfig) -> usize {
    cfg.single_kind_budget()
}

/// Per-kind byte budget when multiple record kinds share one exchange
/// (half of [`single_kind_budget`]).
pub fn batch_kind_budget(cfg: &ProxyExchangeConfig) -> usize {
    cfg.batch_kind_budget()
}
