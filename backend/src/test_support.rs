//! Test doubles shared by unit tests (in `src/`) and integration tests (in
//! `tests/`). Compiled for tests and behind the `test-support` feature.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;

use crate::domain::ports::{ChangeSource, ChangeSourceError, ConnectionSink, DeliveryError};
use crate::domain::{OutboundEvent, Row, TableName};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("test support mutex poisoned"),
    }
}

/// Clock whose time only moves when a test says so.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => {
                panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}")
            }
        };
        *lock(&self.0) += delta;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.0) = now;
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0)
    }
}

/// In-memory tables keyed by `updated_at`, with switchable failures.
#[derive(Default)]
pub struct InMemoryChangeSource {
    tables: Mutex<HashMap<TableName, Vec<(DateTime<Utc>, Row)>>>,
    failing: Mutex<HashSet<TableName>>,
}

impl InMemoryChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row last modified at `updated_at`.
    pub fn insert(&self, table: &TableName, updated_at: DateTime<Utc>, row: Row) {
        lock(&self.tables)
            .entry(table.clone())
            .or_default()
            .push((updated_at, row));
    }

    /// Make every read of `table` fail until [`Self::recover`].
    pub fn fail(&self, table: &TableName) {
        lock(&self.failing).insert(table.clone());
    }

    pub fn recover(&self, table: &TableName) {
        lock(&self.failing).remove(table);
    }

    fn read(
        &self,
        table: &TableName,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Row>, ChangeSourceError> {
        if lock(&self.failing).contains(table) {
            return Err(ChangeSourceError::store_unavailable(format!(
                "{table} is failing"
            )));
        }
        let mut rows: Vec<(DateTime<Utc>, Row)> = lock(&self.tables)
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|(updated_at, _)| since.is_none_or(|since| *updated_at > since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }
}

#[async_trait]
impl ChangeSource for InMemoryChangeSource {
    async fn changed_since(
        &self,
        table: &TableName,
        since: DateTime<Utc>,
    ) -> Result<Vec<Row>, ChangeSourceError> {
        self.read(table, Some(since))
    }

    async fn snapshot(&self, table: &TableName) -> Result<Vec<Row>, ChangeSourceError> {
        self.read(table, None)
    }
}

/// Sink that records every event it accepts.
#[derive(Default)]
pub struct RecordingSink(Mutex<Vec<Arc<OutboundEvent>>>);

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Arc<OutboundEvent>> {
        lock(&self.0).clone()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.0)
            .iter()
            .map(|event| event.event.to_string())
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.0).clear();
    }
}

impl ConnectionSink for RecordingSink {
    fn deliver(&self, event: Arc<OutboundEvent>) -> Result<(), DeliveryError> {
        lock(&self.0).push(event);
        Ok(())
    }
}
