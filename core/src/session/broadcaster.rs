use crate::prelude::{Point, PointFields, ScanError, ScanResult};
use crate::protocol::ServerMessage;
use crate::session::registry::{ConnectionId, Outbox, SessionRegistry};
use crate::store::PointStore;
use crate::telemetry::{LogManager, MetricsRecorder};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

/// Outcome of one fan-out call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: Vec<ConnectionId>,
}

/// Fans point batches and control events out to registered observers.
///
/// Store mutations and the recipient snapshot that must observe them are taken
/// together under the registry lock; the sends happen afterwards, one observer
/// at a time. An observer whose outbox is closed is removed on the spot.
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn PointStore>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn PointStore>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            registry,
            store,
            metrics,
            logger: LogManager::new("broadcaster"),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn PointStore> {
        &self.store
    }

    /// Promotes a connection to observer and queues the current snapshot as its
    /// `initial_state`, ahead of any later delta. Returns the snapshot size.
    pub fn register(&self, id: ConnectionId) -> ScanResult<usize> {
        self.registry.with_members(|members| {
            let outbox = members
                .outbox(id)
                .cloned()
                .ok_or(ScanError::ConnectionClosed)?;
            let snapshot = self.store.get_all();
            let text = ServerMessage::initial_state(&snapshot).to_text()?;

            match outbox.try_send(text) {
                Ok(()) => {
                    members.promote(id);
                    Ok(snapshot.len())
                }
                Err(TrySendError::Full(_)) => Err(ScanError::OutboxFull),
                Err(TrySendError::Closed(_)) => {
                    members.remove(id);
                    Err(ScanError::ChannelClosed)
                }
            }
        })
    }

    /// Stores a batch and sends the points that were persisted as `new_points`.
    pub async fn ingest(&self, batch: Vec<PointFields>) -> ScanResult<(Vec<Point>, Delivery)> {
        let (stored, recipients) = self
            .registry
            .with_members(|members| (self.store.insert_batch(batch), members.recipients()));

        if stored.is_empty() {
            return Ok((stored, Delivery::default()));
        }
        let text = ServerMessage::new_points(&stored).to_text()?;
        let delivery = self.deliver(recipients, text).await;
        Ok((stored, delivery))
    }

    /// Sends an incremental `new_points` event to every registered observer.
    pub async fn broadcast_new_points(&self, points: &[Point]) -> ScanResult<Delivery> {
        let text = ServerMessage::new_points(points).to_text()?;
        Ok(self.deliver(self.registry.snapshot(), text).await)
    }

    /// Clears the store and, on success, tells every registered observer.
    pub async fn clear_scan(&self) -> ScanResult<bool> {
        let text = ServerMessage::scan_cleared().to_text()?;
        let (cleared, recipients) = self.registry.with_members(|members| {
            if self.store.clear() {
                (true, members.recipients())
            } else {
                (false, Vec::new())
            }
        });

        if !cleared {
            self.logger.warn("store clear failed; nothing broadcast");
            return Ok(false);
        }
        self.metrics.record_clear();
        let delivery = self.deliver(recipients, text).await;
        self.logger.record(&format!(
            "scan cleared, notified {} observers",
            delivery.delivered
        ));
        Ok(true)
    }

    async fn deliver(&self, recipients: Vec<(ConnectionId, Outbox)>, text: String) -> Delivery {
        let mut delivery = Delivery::default();
        for (id, outbox) in recipients {
            if outbox.send(text.clone()).await.is_ok() {
                delivery.delivered += 1;
                continue;
            }
            if self.registry.disconnect(id) {
                self.metrics.record_dropped_observer();
                self.logger
                    .warn(&format!("send to {} failed, observer removed", id));
            }
            delivery.dropped.push(id);
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::WirePoint;
    use crate::store::MemoryStore;
    use serde_json::Value;
    use tokio::sync::mpsc;

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(MetricsRecorder::new()),
        )
    }

    fn fields(x: f64) -> PointFields {
        PointFields {
            intensity: 10.0,
            x,
            y: 0.0,
            z: 0.0,
        }
    }

    fn observer(hub: &Broadcaster) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let id = hub.registry().connect(tx);
        (id, rx)
    }

    fn decode(text: &str) -> ServerMessage {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn registration_sends_existing_points_before_deltas() {
        let hub = broadcaster();
        hub.ingest(vec![fields(1.0), fields(2.0)]).await.unwrap();

        let (id, mut rx) = observer(&hub);
        assert_eq!(hub.register(id).unwrap(), 2);
        hub.ingest(vec![fields(3.0)]).await.unwrap();

        match decode(&rx.recv().await.unwrap()) {
            ServerMessage::InitialState { data } => assert_eq!(data.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        match decode(&rx.recv().await.unwrap()) {
            ServerMessage::NewPoints { data } => assert_eq!(
                data,
                vec![WirePoint {
                    intensity: 10.0,
                    x: 3.0,
                    y: 0.0,
                    z: 0.0
                }]
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_store_still_sends_initial_state() {
        let hub = broadcaster();
        let (id, mut rx) = observer(&hub);
        hub.register(id).unwrap();

        let value: Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(value["type"], "initial_state");
        assert_eq!(value["data"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn unregistered_connections_receive_nothing() {
        let hub = broadcaster();
        let (_id, mut rx) = observer(&hub);
        let (_, delivery) = hub.ingest(vec![fields(1.0)]).await.unwrap();

        assert_eq!(delivery.delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_send_removes_observer_and_reaches_the_rest() {
        let hub = broadcaster();
        let (first, first_rx) = observer(&hub);
        let (second, mut second_rx) = observer(&hub);
        hub.register(first).unwrap();
        hub.register(second).unwrap();
        drop(first_rx);
        second_rx.recv().await.unwrap();

        let points = hub.store().insert_batch(vec![fields(5.0)]);
        let delivery = hub.broadcast_new_points(&points).await.unwrap();

        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.dropped, vec![first]);
        assert!(!hub.registry().is_registered(first));
        assert!(matches!(
            decode(&second_rx.recv().await.unwrap()),
            ServerMessage::NewPoints { .. }
        ));
    }

    #[tokio::test]
    async fn clear_scan_notifies_observers_and_empties_snapshot() {
        let hub = broadcaster();
        hub.ingest(vec![fields(1.0)]).await.unwrap();
        let (id, mut rx) = observer(&hub);
        hub.register(id).unwrap();
        rx.recv().await.unwrap();

        assert!(hub.clear_scan().await.unwrap());
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"type":"scan_cleared","data":[]}"#
        );

        let (late, mut late_rx) = observer(&hub);
        assert_eq!(hub.register(late).unwrap(), 0);
        assert_eq!(
            decode(&late_rx.recv().await.unwrap()),
            ServerMessage::InitialState { data: Vec::new() }
        );
    }

    #[test]
    fn registering_a_closed_outbox_drops_the_connection() {
        let hub = broadcaster();
        let (id, rx) = observer(&hub);
        drop(rx);

        assert!(matches!(hub.register(id), Err(ScanError::ChannelClosed)));
        assert!(hub.registry().is_empty());
    }

    struct FailingStore;

    impl PointStore for FailingStore {
        fn insert_batch(&self, _batch: Vec<PointFields>) -> Vec<Point> {
            Vec::new()
        }

        fn get_all(&self) -> Vec<Point> {
            Vec::new()
        }

        fn clear(&self) -> bool {
            false
        }

        fn len(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn failed_clear_broadcasts_nothing() {
        let hub = Broadcaster::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(FailingStore),
            Arc::new(MetricsRecorder::new()),
        );
        let (id, mut rx) = observer(&hub);
        hub.register(id).unwrap();
        rx.recv().await.unwrap();

        assert!(!hub.clear_scan().await.unwrap());
        assert!(rx.try_recv().is_err());
    }
}
