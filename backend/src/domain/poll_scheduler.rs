//! Interval-driven change detection.
//!
//! Every tick asks the change source which rows of each tracked table moved
//! past that table's checkpoint. Tables with changes get a `newData` event,
//! a fresh `refreshData` snapshot, and a checkpoint advanced to the tick
//! start. A table that fails is skipped for the tick and keeps its
//! checkpoint, so the same rows are seen again next time.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use mockable::Clock;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::ports::{ChangeSource, ChangeSourceError};
use super::{BroadcastHub, CheckpointMap, OutboundEvent, TableName, TrackedTables};

/// Default period between ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Tables broadcast and tables skipped during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub broadcast: Vec<TableName>,
    pub failed: Vec<TableName>,
}

impl TickReport {
    /// `true` when nothing was broadcast and nothing failed.
    pub fn is_quiet(&self) -> bool {
        self.broadcast.is_empty() && self.failed.is_empty()
    }
}

enum TableOutcome {
    Unchanged,
    Broadcast,
    Failed,
}

/// Periodic poller over the tracked table set.
pub struct PollScheduler {
    source: Arc<dyn ChangeSource>,
    hub: Arc<BroadcastHub>,
    checkpoints: Arc<CheckpointMap>,
    tables: TrackedTables,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        hub: Arc<BroadcastHub>,
        checkpoints: Arc<CheckpointMap>,
        tables: TrackedTables,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            hub,
            checkpoints,
            tables,
            clock,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the tick period. Zero is raised to one millisecond.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll every tracked table once, concurrently.
    pub async fn tick(&self) -> TickReport {
        let tick_time = self.clock.utc();
        let outcomes = join_all(
            self.tables
                .iter()
                .map(|table| self.poll_table(table, tick_time)),
        )
        .await;

        let mut report = TickReport::default();
        for (table, outcome) in self.tables.iter().zip(outcomes) {
            match outcome {
                TableOutcome::Unchanged => {}
                TableOutcome::Broadcast => report.broadcast.push(table.clone()),
                TableOutcome::Failed => report.failed.push(table.clone()),
            }
        }
        report
    }

    /// Tick on the configured interval until `shutdown` resolves.
    ///
    /// A tick still in flight when `shutdown` resolves is abandoned; its
    /// tables keep their old checkpoints.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            tables = self.tables.len(),
            "poll scheduler started"
        );
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                report = self.tick() => log_report(&report),
            }
        }
        info!("poll scheduler stopped");
    }

    async fn poll_table(&self, table: &TableName, tick_time: DateTime<Utc>) -> TableOutcome {
        match self.refresh_changed(table, tick_time).await {
            Ok(true) => TableOutcome::Broadcast,
            Ok(false) => TableOutcome::Unchanged,
            Err(error) => {
                warn!(table = %table, %error, "skipping table for this tick");
                TableOutcome::Failed
            }
        }
    }

    async fn refresh_changed(
        &self,
        table: &TableName,
        tick_time: DateTime<Utc>,
    ) -> Result<bool, ChangeSourceError> {
        let since = self.checkpoints.get(table);
        let changed = self.source.changed_since(table, since).await?;
        if changed.is_empty() {
            return Ok(false);
        }

        let changed_rows = changed.len();
        self.hub
            .publish_event(OutboundEvent::new_data(table, changed, tick_time));
        let rows = self.source.snapshot(table).await?;
        self.hub.publish_snapshot(table, rows);
        self.checkpoints.advance(table, tick_time);
        debug!(table = %table, changed_rows, checkpoint = %tick_time, "table refreshed");
        Ok(true)
    }
}

fn log_report(report: &TickReport) {
    if report.is_quiet() {
        return;
    }
    let broadcast: Vec<&str> = report.broadcast.iter().map(TableName::as_str).collect();
    let failed: Vec<&str> = report.failed.iter().map(TableName::as_str).collect();
    info!(?broadcast, ?failed, "poll tick complete");
}
