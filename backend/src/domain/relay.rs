//! Shared relay state assembled once by the composition root.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use mockable::Clock;
use serde_json::{Map, Value};
use tracing::warn;

use super::ports::ChangeSource;
use super::{
    BroadcastHub, CheckpointMap, ClientRegistry, IngestService, PollScheduler, TrackedTables,
};

/// Every piece of in-memory relay state plus the change source.
pub struct RelayContext {
    hub: Arc<BroadcastHub>,
    registry: Arc<ClientRegistry>,
    checkpoints: Arc<CheckpointMap>,
    tables: TrackedTables,
    source: Arc<dyn ChangeSource>,
    clock: Arc<dyn Clock>,
}

impl RelayContext {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        tables: TrackedTables,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            hub: Arc::new(BroadcastHub::new()),
            registry: Arc::new(ClientRegistry::new(Arc::clone(&clock))),
            checkpoints: Arc::new(CheckpointMap::new(&tables)),
            tables,
            source,
            clock,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn checkpoints(&self) -> &Arc<CheckpointMap> {
        &self.checkpoints
    }

    pub fn tables(&self) -> &TrackedTables {
        &self.tables
    }

    pub fn ingest_service(&self) -> IngestService {
        IngestService::new(Arc::clone(&self.hub), Arc::clone(&self.source))
    }

    pub fn poll_scheduler(&self, interval: Duration) -> PollScheduler {
        PollScheduler::new(
            Arc::clone(&self.source),
            Arc::clone(&self.hub),
            Arc::clone(&self.checkpoints),
            self.tables.clone(),
            Arc::clone(&self.clock),
        )
        .with_interval(interval)
    }

    /// Snapshot of every tracked table keyed by table name.
    ///
    /// Tables that cannot be read are logged and left out.
    pub async fn initial_dataset(&self) -> Map<String, Value> {
        let reads = join_all(self.tables.iter().map(|table| async move {
            (table, self.source.snapshot(table).await)
        }))
        .await;

        let mut dataset = Map::new();
        for (table, result) in reads {
            match result {
                Ok(rows) => {
                    dataset.insert(table.to_string(), Value::Array(rows));
                }
                Err(error) => warn!(table = %table, %error, "initial dataset read failed"),
            }
        }
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TableName;
    use crate::domain::ports::{ChangeSourceError, MockChangeSource};
    use mockable::DefaultClock;
    use mockall::predicate::eq;
    use serde_json::json;

    #[tokio::test]
    async fn initial_dataset_omits_unreadable_tables() {
        let faqs = TableName::new("faqs").expect("table");
        let users = TableName::new("users").expect("table");
        let mut source = MockChangeSource::new();
        source
            .expect_snapshot()
            .with(eq(faqs.clone()))
            .returning(|_| Ok(vec![json!({ "id": 1 })]));
        source
            .expect_snapshot()
            .with(eq(users.clone()))
            .returning(|_| Err(ChangeSourceError::store_unavailable("denied")));
        let relay = RelayContext::new(
            Arc::new(source),
            TrackedTables::new([faqs, users]),
            Arc::new(DefaultClock),
        );

        let dataset = relay.initial_dataset().await;

        assert_eq!(Value::Object(dataset), json!({ "faqs": [{ "id": 1 }] }));
    }

    #[test]
    fn services_share_the_same_hub() {
        let relay = RelayContext::new(
            Arc::new(MockChangeSource::new()),
            TrackedTables::default(),
            Arc::new(DefaultClock),
        );
        let scheduler = relay.poll_scheduler(Duration::from_millis(250));

        assert_eq!(scheduler.interval(), Duration::from_millis(250));
        assert_eq!(relay.hub().connection_count(), 0);
        assert_eq!(
            relay.checkpoints().get(&TableName::new("faqs").expect("table")),
            chrono::DateTime::<chrono::Utc>::UNIX_EPOCH
        );
    }
}
