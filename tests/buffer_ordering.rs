//! Property 4 from spec.md §8: fetch_batch emits strictly ID-ordered
//! records, all greater than the caller-supplied last_sent_id.

use std::sync::Mutex;
use vigil_core::buffer::{fetch_batch, RecordRow, RecordTable};
use vigil_core::error::CoreResult;

#[derive(Debug, Clone, Copy)]
struct HistoryRow {
    id: u64,
}

impl RecordRow for HistoryRow {
    fn id(&self) -> u64 {
        self.id
    }
    fn json_size(&self) -> usize {
        32
    }
}

struct HistoryTable {
    rows: Vec<HistoryRow>,
    high_water: Mutex<u64>,
}

impl RecordTable for HistoryTable {
    type Row = HistoryRow;

    fn rows_after(&self, after: u64) -> CoreResult<Vec<HistoryRow>> {
        Ok(self.rows.iter().filter(|r| r.id > after).copied().collect())
    }

    fn advance(&self, new_high_water: u64) -> CoreResult<()> {
        *self.high_water.lock().unwrap() = new_high_water;
        Ok(())
    }

    fn pending_count(&self, last_sent_id: u64) -> CoreResult<u64> {
        Ok(self.rows.iter().filter(|r| r.id > last_sent_id).count() as u64)
    }
}

#[test]
fn batch_is_strictly_ordered_and_all_ids_exceed_last_sent() {
    let table = HistoryTable {
        rows: (1..=500u64).map(|id| HistoryRow { id }).collect(),
        high_water: Mutex::new(0),
    };

    let last_sent_id = 120;
    let batch = fetch_batch(&table, last_sent_id, 50, 100_000).unwrap();

    assert!(!batch.records.is_empty());
    for record in &batch.records {
        assert!(record.id() > last_sent_id);
    }
    let ids: Vec<u64> = batch.records.iter().map(|r| r.id()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted, "batch must be strictly ID-ordered");
    assert_eq!(ids.windows(2).filter(|w| w[0] == w[1]).count(), 0, "no duplicate ids");
}

#[test]
fn advancing_high_water_persists() {
    let table = HistoryTable { rows: vec![], high_water: Mutex::new(0) };
    table.advance(42).unwrap();
    assert_eq!(*table.high_water.lock().unwrap(), 42);
}
