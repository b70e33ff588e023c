//! Per-table poll checkpoints.
//!
//! A checkpoint records the instant up to which a table's changes have been
//! observed and broadcast. Checkpoints start at the Unix epoch, only move
//! forward, and live in memory: a restart costs one redundant snapshot per
//! table, never a missed change, because the database stays authoritative.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::{TableName, TrackedTables};

/// Monotonic checkpoint per tracked table, safe to share across tasks.
#[derive(Debug)]
pub struct CheckpointMap {
    inner: Mutex<HashMap<TableName, DateTime<Utc>>>,
}

impl CheckpointMap {
    /// Start every table in `tables` at the epoch.
    pub fn new(tables: &TrackedTables) -> Self {
        let inner = tables
            .iter()
            .map(|table| (table.clone(), DateTime::<Utc>::UNIX_EPOCH))
            .collect();
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Current checkpoint; unknown tables report the epoch.
    pub fn get(&self, table: &TableName) -> DateTime<Utc> {
        self.lock()
            .get(table)
            .copied()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Move `table` forward to `to`. Returns `false`, leaving the checkpoint
    /// untouched, when `to` is not later than the current value.
    pub fn advance(&self, table: &TableName, to: DateTime<Utc>) -> bool {
        let mut checkpoints = self.lock();
        let current = checkpoints
            .entry(table.clone())
            .or_insert(DateTime::<Utc>::UNIX_EPOCH);
        if to > *current {
            *current = to;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TableName, DateTime<Utc>>> {
        // Timestamps are written whole, so a poisoned map is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
