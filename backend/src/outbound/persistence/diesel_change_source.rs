//! PostgreSQL-backed change source.
//!
//! Tracked tables are not known to Diesel's schema DSL, so reads use raw SQL
//! over a validated, quoted identifier and let PostgreSQL serialise each row
//! with `row_to_json`. Every call is bounded by the store timeout.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::QueryableByName;
use diesel::sql_query;
use diesel::sql_types::{Jsonb, Timestamptz};
use diesel_async::RunQueryDsl;
use serde_json::Value;
use tokio::time;
use tracing::debug;

use crate::domain::ports::{ChangeSource, ChangeSourceError};
use crate::domain::{Row, TableName, TrackedTables};

use super::pool::{DbPool, PoolError};

/// Default bound on a single change-source call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Jsonb)]
    payload: Value,
}

fn changed_since_sql(table: &TableName) -> String {
    format!(
        "SELECT row_to_json(t)::jsonb AS payload FROM {} AS t \
         WHERE t.updated_at > $1 ORDER BY t.updated_at DESC",
        table.quoted()
    )
}

fn snapshot_sql(table: &TableName) -> String {
    format!(
        "SELECT row_to_json(t)::jsonb AS payload FROM {} AS t ORDER BY t.updated_at DESC",
        table.quoted()
    )
}

fn map_pool_error(error: PoolError) -> ChangeSourceError {
    ChangeSourceError::store_unavailable(error.into_message())
}

fn map_diesel_error(error: diesel::result::Error, table: &TableName) -> ChangeSourceError {
    let message = error.to_string();
    debug!(%message, table = %table, "change source query failed");
    ChangeSourceError::store_unavailable(format!("query on {table} failed: {message}"))
}

/// Diesel implementation of [`ChangeSource`].
#[derive(Clone)]
pub struct DieselChangeSource {
    pool: DbPool,
    tables: TrackedTables,
    timeout: Duration,
}

impl DieselChangeSource {
    pub fn new(pool: DbPool, tables: TrackedTables) -> Self {
        Self {
            pool,
            tables,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn ensure_tracked(&self, table: &TableName) -> Result<(), ChangeSourceError> {
        if self.tables.contains(table) {
            Ok(())
        } else {
            Err(ChangeSourceError::store_unavailable(format!(
                "table {table} is not tracked"
            )))
        }
    }

    async fn bounded<F>(&self, table: &TableName, query: F) -> Result<Vec<Row>, ChangeSourceError>
    where
        F: std::future::Future<Output = Result<Vec<JsonRow>, ChangeSourceError>>,
    {
        let rows = time::timeout(self.timeout, query).await.map_err(|_| {
            ChangeSourceError::store_unavailable(format!(
                "query on {table} exceeded {} ms",
                self.timeout.as_millis()
            ))
        })??;
        Ok(rows.into_iter().map(|row| row.payload).collect())
    }
}

#[async_trait]
impl ChangeSource for DieselChangeSource {
    async fn changed_since(
        &self,
        table: &TableName,
        since: DateTime<Utc>,
    ) -> Result<Vec<Row>, ChangeSourceError> {
        self.ensure_tracked(table)?;
        let sql = changed_since_sql(table);
        self.bounded(table, async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            sql_query(sql)
                .bind::<Timestamptz, _>(since)
                .load::<JsonRow>(&mut conn)
                .await
                .map_err(|error| map_diesel_error(error, table))
        })
        .await
    }

    async fn snapshot(&self, table: &TableName) -> Result<Vec<Row>, ChangeSourceError> {
        self.ensure_tracked(table)?;
        let sql = snapshot_sql(table);
        self.bounded(table, async {
            let mut conn = self.pool.get().await.map_err(map_pool_error)?;
            sql_query(sql)
                .load::<JsonRow>(&mut conn)
                .await
                .map_err(|error| map_diesel_error(error, table))
        })
        .await
    }
}
