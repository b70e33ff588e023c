//! In-process change ingestion.
//!
//! A write-side collaborator reports `(table, action, data)`. The service
//! publishes the action-qualified event and any derived events straight
//! away, then refreshes the table snapshot in the background so the caller
//! never waits on the store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::ports::{ChangeNotifier, ChangeSource, ChangeSourceError, NotifyError};
use super::{BroadcastHub, ChangeEvent, EventName, TableName, TraceId};

/// Ingest service backing `POST /emit`.
#[derive(Clone)]
pub struct IngestService {
    hub: Arc<BroadcastHub>,
    source: Arc<dyn ChangeSource>,
}

impl IngestService {
    pub fn new(hub: Arc<BroadcastHub>, source: Arc<dyn ChangeSource>) -> Self {
        Self { hub, source }
    }

    /// Publish the light event plus derived events for `change`.
    ///
    /// Returns the event names published, primary first.
    pub fn ingest(&self, change: &ChangeEvent) -> Vec<EventName> {
        let primary = change.primary_event();
        let delivered = self.hub.publish(&primary, change.payload());
        debug!(event = %primary, delivered, "published change event");

        let mut published = vec![primary];
        for derived in change.derived_events() {
            self.hub.publish(&derived, change.payload());
            published.push(derived);
        }
        published
    }

    /// Read the full table and broadcast it as `refreshData`.
    ///
    /// Returns the number of rows broadcast.
    pub async fn refresh_snapshot(&self, table: &TableName) -> Result<usize, ChangeSourceError> {
        let rows = self.source.snapshot(table).await?;
        let count = rows.len();
        self.hub.publish_snapshot(table, rows);
        Ok(count)
    }

    fn spawn_refresh(&self, table: TableName) {
        let service = self.clone();
        let trace_id = TraceId::current();
        tokio::spawn(TraceId::propagate(trace_id, async move {
            if let Err(error) = service.refresh_snapshot(&table).await {
                warn!(table = %table, %error, "snapshot refresh after ingest failed");
            }
        }));
    }
}

#[async_trait]
impl ChangeNotifier for IngestService {
    async fn notify(&self, change: ChangeEvent) -> Result<(), NotifyError> {
        self.ingest(&change);
        match change.table_name() {
            Ok(table) => self.spawn_refresh(table),
            Err(error) => {
                debug!(
                    table = change.table(),
                    %error,
                    "table is not an identifier; skipping snapshot refresh"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{ConnectionSink, DeliveryError, MockChangeSource};
    use crate::domain::{ConnectionId, OutboundEvent};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recording(Mutex<Vec<Arc<OutboundEvent>>>);

    impl ConnectionSink for Recording {
        fn deliver(&self, event: Arc<OutboundEvent>) -> Result<(), DeliveryError> {
            self.0.lock().expect("recording lock").push(event);
            Ok(())
        }
    }

    impl Recording {
        fn names(&self) -> Vec<String> {
            self.0
                .lock()
                .expect("recording lock")
                .iter()
                .map(|event| event.event.to_string())
                .collect()
        }
    }

    fn service_with(source: MockChangeSource) -> (IngestService, Arc<Recording>) {
        let hub = Arc::new(BroadcastHub::new());
        let sink = Arc::new(Recording::default());
        hub.add(ConnectionId::generate(), sink.clone());
        (IngestService::new(hub, Arc::new(source)), sink)
    }

    fn change(table: &str, action: &str, data: Value) -> ChangeEvent {
        ChangeEvent::from_parts(Some(table), Some(action), Some(data)).expect("valid change")
    }

    #[test]
    fn ingest_publishes_without_touching_the_store() {
        let (service, sink) = service_with(MockChangeSource::new());

        let published = service.ingest(&change("announcements", "new", json!({ "id": 7 })));

        assert_eq!(published.len(), 1);
        assert_eq!(sink.names(), vec!["new_announcements"]);
    }

    #[test]
    fn complaint_is_sub_routed_after_the_primary_event() {
        let (service, sink) = service_with(MockChangeSource::new());

        service.ingest(&change("comreqs", "new", json!({ "category": "Complaint" })));

        assert_eq!(sink.names(), vec!["new_comreqs", "new_complaint"]);
    }

    #[tokio::test]
    async fn refresh_snapshot_broadcasts_rows() {
        let mut source = MockChangeSource::new();
        source
            .expect_snapshot()
            .times(1)
            .returning(|_| Ok(vec![json!({ "id": 2 }), json!({ "id": 1 })]));
        let (service, sink) = service_with(source);
        let table = TableName::new("faqs").expect("table");

        let count = service.refresh_snapshot(&table).await.expect("refresh");

        assert_eq!(count, 2);
        assert_eq!(sink.names(), vec!["refreshData"]);
    }

    #[tokio::test]
    async fn notify_succeeds_even_when_the_snapshot_fails() {
        let mut source = MockChangeSource::new();
        source
            .expect_snapshot()
            .times(1)
            .returning(|_| Err(ChangeSourceError::store_unavailable("down")));
        let (service, sink) = service_with(source);

        let outcome = service
            .notify(change("feedback", "update", json!({ "id": 3 })))
            .await;

        assert!(outcome.is_ok());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.names(), vec!["update_feedback"]);
    }

    #[tokio::test]
    async fn notify_publishes_but_skips_snapshot_for_non_identifier_tables() {
        let mut source = MockChangeSource::new();
        source.expect_snapshot().never();
        let (service, sink) = service_with(source);

        service
            .notify(change("visitorLogs", "new", json!({ "id": 4 })))
            .await
            .expect("notify");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.names(), vec!["new_visitorLogs"]);
    }

    #[tokio::test]
    async fn notify_refreshes_snapshot_in_background() {
        let mut source = MockChangeSource::new();
        source
            .expect_snapshot()
            .times(1)
            .returning(|_| Ok(vec![json!({ "id": 1 })]));
        let (service, sink) = service_with(source);

        service
            .notify(change("faqs", "new", json!({ "id": 1 })))
            .await
            .expect("notify");

        tokio::time::timeout(Duration::from_secs(1), async {
            while sink.names().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("snapshot broadcast");
        assert_eq!(sink.names(), vec!["new_faqs", "refreshData"]);
    }
}
