//! Configuration sync (C6, spec §4.6): applies a server-produced
//! `{fields, data}` table payload against the proxy's local mirror inside
//! one logical transaction — insert/update/delete diffing, two-phase
//! staging for unique-indexed columns, never-overwritten fields, and
//! availability resync via a generation counter.
//!
//! Grounded on the teacher's `state/store.rs` (hashed-by-primary-key index
//! pattern) generalized from a single spec-cache to the many dependency-
//! ordered tables spec §4.6 names.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// Apply order across tables, dependency-first (spec §4.6).
pub const APPLY_ORDER: &[&str] = &[
    "globalmacro",
    "hosts",
    "interface",
    "hosts_templates",
    "hostmacro",
    "items",
    "drules",
    "dchecks",
    "regexps",
    "expressions",
    "hstgrp",
    "config",
    "httptest",
    "httptestitem",
    "httptest_field",
    "httpstep",
    "httpstepitem",
    "httpstep_field",
];

/// Fields never overwritten by a sync because the proxy runtime owns them.
pub const NEVER_OVERWRITE: &[(&str, &str)] = &[("items", "lastlogsize"), ("items", "mtime")];

/// Host availability fields that trigger a re-publish instead of a local
/// overwrite when the server's value disagrees (spec §4.6 point 4).
pub const AVAILABILITY_FIELDS: &[&str] =
    &["available", "snmp_available", "ipmi_available", "jmx_available"];

/// Tables with an additional unique index beyond the primary key, requiring
/// two-phase staging before the real value is written (spec §4.6 point 3).
pub const UNIQUE_INDEXED: &[(&str, &str)] = &[
    ("globalmacro", "macro"),
    ("hostmacro", "macro"),
    ("items", "key_"),
    ("drules", "name"),
    ("regexps", "name"),
    ("httptest", "name"),
    ("hosts_templates", "templateid"),
];

/// A single row keyed by primary id, with field/value pairs. Null vs
/// "absent" is distinguished by the caller populating the map or not —
/// this type only ever represents "present with this value".
pub type Row = HashMap<String, Value>;

/// One server-produced table payload, as wire-decoded (spec §4.6,
/// `{fields, data}`).
#[derive(Debug, Clone)]
pub struct TablePayload {
    pub fields: Vec<String>,
    pub rows: Vec<(u64, Vec<Value>)>,
}

impl TablePayload {
    fn to_rows(&self) -> CoreResult<HashMap<u64, Row>> {
        let mut out = HashMap::new();
        for (id, values) in &self.rows {
            if values.len() != self.fields.len() {
                return Err(CoreError::Protocol(format!(
                    "row {id} has {} values, expected {}",
                    values.len(),
                    self.fields.len()
                )));
            }
            let row: Row = self
                .fields
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();
            out.insert(*id, row);
        }
        Ok(out)
    }
}

/// Local mirror of one table: a primary-key-indexed hash of rows, mirroring
/// spec §4.6 point 1's "in-memory index hashed by primary key".
pub trait ConfigTable {
    fn table_name(&self) -> &str;
    fn local_rows(&self) -> CoreResult<HashMap<u64, Row>>;
    fn insert_row(&self, id: u64, row: &Row) -> CoreResult<()>;
    fn update_row(&self, id: u64, row: &Row) -> CoreResult<()>;
    fn delete_rows(&self, ids: &[u64]) -> CoreResult<()>;
    /// Stages a unique-indexed column to a disambiguated value before the
    /// real value is written, to avoid mid-apply collisions.
    fn stage_unique(&self, id: u64, column: &str, disambiguated: &Value) -> CoreResult<()>;
}

/// Diff between the payload and the local mirror.
#[derive(Debug, Default)]
pub struct ConfigDelta {
    pub inserts: Vec<(u64, Row)>,
    pub updates: Vec<(u64, Row)>,
    pub deletes: Vec<u64>,
    /// Host ids whose availability fields disagreed and must be
    /// re-published by the proxy on the next exchange.
    pub republish: HashSet<u64>,
}

/// Computes [`ConfigDelta`] between the incoming payload and `table`'s
/// current local rows, without mutating anything (spec §4.6 point 2).
pub fn diff_table(table: &dyn ConfigTable, payload: &TablePayload) -> CoreResult<ConfigDelta> {
    let incoming = payload.to_rows()?;
    let local = table.local_rows()?;
    let name = table.table_name();

    let mut delta = ConfigDelta::default();

    for (id, row) in &incoming {
        match local.get(id) {
            None => delta.inserts.push((*id, row.clone())),
            Some(local_row) => {
                if let Some(changed) = diff_row(name, local_row, row, &mut delta.republish, *id) {
                    delta.updates.push((*id, changed));
                }
            }
        }
    }
    for id in local.keys() {
        if !incoming.contains_key(id) {
            delta.deletes.push(*id);
        }
    }
    delta.deletes.sort_unstable();
    delta.inserts.sort_unstable_by_key(|(id, _)| *id);
    delta.updates.sort_unstable_by_key(|(id, _)| *id);

    Ok(delta)
}

/// Returns the subset of `incoming` fields that differ from `local` and
/// should be written, or `None` if nothing changed. Fields in
/// [`NEVER_OVERWRITE`] are skipped; availability fields that disagree are
/// redirected into `republish` instead of being written.
fn diff_row(
    table: &str,
    local: &Row,
    incoming: &Row,
    republish: &mut HashSet<u64>,
    id: u64,
) -> Option<Row> {
    let mut changed = Row::new();
    for (field, value) in incoming {
        if NEVER_OVERWRITE.contains(&(table, field.as_str())) {
            continue;
        }
        let local_value = local.get(field);
        if local_value == Some(value) {
            continue;
        }
        if table == "hosts" && AVAILABILITY_FIELDS.contains(&field.as_str()) {
            republish.insert(id);
            continue;
        }
        changed.insert(field.clone(), value.clone());
    }
    if changed.is_empty() {
        None
    } else {
        Some(changed)
    }
}

/// Applies a computed [`ConfigDelta`] to `table`: unique-index staging,
/// inserts, updates, then deletes last (spec §4.6 points 3 and 5).
pub fn apply_delta(table: &dyn ConfigTable, delta: &ConfigDelta) -> CoreResult<()> {
    let unique_column = UNIQUE_INDEXED
        .iter()
        .find(|(name, _)| *name == table.table_name())
        .map(|(_, col)| *col);

    if let Some(column) = unique_column {
        stage_unique_conflicts(table, delta, column)?;
    }

    for (id, row) in &delta.inserts {
        table.insert_row(*id, row)?;
    }
    for (id, row) in &delta.updates {
        table.update_row(*id, row)?;
    }
    if !delta.deletes.is_empty() {
        table.delete_rows(&delta.deletes)?;
    }
    Ok(())
}

fn stage_unique_conflicts(table: &dyn ConfigTable, delta: &ConfigDelta, column: &str) -> CoreResult<()> {
    let local = table.local_rows()?;
    // `Value` has no `Hash` impl (it can hold floats), so dedupe on each
    // value's canonical JSON text instead of the value itself.
    let local_values: HashSet<String> = local
        .values()
        .filter_map(|row| row.get(column))
        .map(|v| v.to_string())
        .collect();

    let incoming_values: HashMap<u64, &Value> = delta
        .updates
        .iter()
        .chain(delta.inserts.iter())
        .filter_map(|(id, row)| row.get(column).map(|v| (*id, v)))
        .collect();

    for (id, target) in &incoming_values {
        let currently_held_by_other = local
            .get(id)
            .and_then(|row| row.get(column))
            .map(|current| current != *target)
            .unwrap_or(true);
        if currently_held_by_other && local_values.contains(&target.to_string()) {
            let disambiguated = serde_json::json!(format!("__staging_{id}"));
            table.stage_unique(*id, column, &disambiguated)?;
        }
    }
    Ok(())
}

/// A proxy's local view of one host's availability fields plus the
/// generation counter that resolves resync termination (DESIGN.md Open
/// Question 3: the original protocol has no explicit stop condition for
/// "keep re-publishing until the server agrees", so this crate adds a
/// monotone generation per field set — the proxy only republishes when its
/// own generation is strictly newer than what the server last
/// acknowledged).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostAvailability {
    pub host_id: u64,
    pub generation: u32,
}

/// Decides whether `local` should be republished given the `last_acked`
/// generation the server has confirmed receiving for this host, if any.
pub fn should_republish(local: HostAvailability, last_acked: Option<u32>) -> bool {
    match last_acked {
        Some(acked) => local.generation > acked,
        None => true,
    }
}
