//! Driven port for reading table changes and snapshots.
//!
//! The poll scheduler and the ingest service only ever ask two questions of
//! the data store: which rows of a table changed after a checkpoint, and what
//! the whole table looks like now. Both answers are ordered by the table's
//! `updated_at` column, newest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Row, TableName};

use super::define_port_error;

define_port_error! {
    /// Failures reading from the change source. Always transient: callers
    /// log, skip, and retry on the next opportunity.
    pub enum ChangeSourceError {
        /// The store is unreachable, the query failed or timed out, or the
        /// table is unknown to the store.
        StoreUnavailable { message: String } =>
            "change source unavailable: {message}",
    }
}

/// Port for incremental and full reads of tracked tables.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Rows of `table` whose `updated_at` is strictly after `since`,
    /// newest first.
    async fn changed_since(
        &self,
        table: &TableName,
        since: DateTime<Utc>,
    ) -> Result<Vec<Row>, ChangeSourceError>;

    /// Every row of `table`, newest first.
    async fn snapshot(&self, table: &TableName) -> Result<Vec<Row>, ChangeSourceError>;
}

/// Source used when no database is configured: every table is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureChangeSource;

#[async_trait]
impl ChangeSource for FixtureChangeSource {
    async fn changed_since(
        &self,
        _table: &TableName,
        _since: DateTime<Utc>,
    ) -> Result<Vec<Row>, ChangeSourceError> {
        Ok(Vec::new())
    }

    async fn snapshot(&self, _table: &TableName) -> Result<Vec<Row>, ChangeSourceError> {
        Ok(Vec::new())
    }
}
