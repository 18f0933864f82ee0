use crate::geometry::CoordinateTransformer;
use crate::prelude::{PointFields, ScanError, ScanResult};
use crate::protocol::{
    ControlMessage, ErrorNotice, FrameDecoder, InboundMessage, ServerMessage, OBSERVER_CLIENT,
};
use crate::session::{Broadcaster, ConnectionId, Outbox, SessionRegistry};
use crate::store::PointStore;
use crate::telemetry::{LogManager, MetricsRecorder};
use std::sync::Arc;

/// Shared services handed to every connection.
pub struct RelayContext {
    pub broadcaster: Broadcaster,
    pub decoder: FrameDecoder,
    pub transformer: CoordinateTransformer,
    pub metrics: Arc<MetricsRecorder>,
}

impl RelayContext {
    pub fn new(store: Arc<dyn PointStore>, transformer: CoordinateTransformer) -> Self {
        let metrics = Arc::new(MetricsRecorder::new());
        let registry = Arc::new(SessionRegistry::new());
        Self {
            broadcaster: Broadcaster::new(registry, store, metrics.clone()),
            decoder: FrameDecoder::new(),
            transformer,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.broadcaster.registry()
    }

    pub fn store(&self) -> &Arc<dyn PointStore> {
        self.broadcaster.store()
    }
}

/// Lifecycle of one connection. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Registered,
    Closed,
}

/// What handling one inbound message amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Registered { snapshot: usize },
    Cleared { success: bool },
    Ingested { stored: usize, delivered: usize },
    ParseFailed,
    UnknownFormat,
    Ignored,
    Failed(String),
}

/// Per-connection dispatcher. Producers and observers share the transport and
/// are told apart by message shape, so one connection may play both roles.
pub struct Relay {
    id: ConnectionId,
    state: ConnectionState,
    outbox: Outbox,
    context: Arc<RelayContext>,
    /// Inclination announced by the last frame's trailing marker.
    carried_inclination: Option<f64>,
    logger: LogManager,
}

impl Relay {
    pub fn connect(context: Arc<RelayContext>, outbox: Outbox) -> Self {
        let id = context.registry().connect(outbox.clone());
        let logger = LogManager::new("relay");
        logger.record(&format!("{} connected", id));
        Self {
            id,
            state: ConnectionState::Connected,
            outbox,
            context,
            carried_inclination: None,
            logger,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Handles one inbound message. Faults are reported back to the sender as
    /// `ERROR:<description>` and never end the connection.
    pub async fn process(&mut self, text: &str) -> Dispatch {
        match self.dispatch(text).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.context.metrics.record_error();
                self.logger
                    .warn(&format!("{} message failed: {}", self.id, err));
                let description = err.to_string();
                if self.state != ConnectionState::Closed {
                    let _ = self
                        .reply(ErrorNotice::Other(description.clone()).to_text())
                        .await;
                }
                Dispatch::Failed(description)
            }
        }
    }

    async fn dispatch(&mut self, text: &str) -> ScanResult<Dispatch> {
        if self.state == ConnectionState::Closed {
            return Err(ScanError::ConnectionClosed);
        }

        match InboundMessage::classify(text) {
            InboundMessage::Control(ControlMessage::Register { client }) => {
                if client != OBSERVER_CLIENT {
                    self.logger.record(&format!(
                        "{} ignored register for client {:?}",
                        self.id, client
                    ));
                    return Ok(Dispatch::Ignored);
                }
                let snapshot = self.context.broadcaster.register(self.id)?;
                self.state = ConnectionState::Registered;
                self.logger.record(&format!(
                    "{} registered, initial state {} points",
                    self.id, snapshot
                ));
                Ok(Dispatch::Registered { snapshot })
            }
            InboundMessage::Control(ControlMessage::ClearScan) => {
                let success = self.context.broadcaster.clear_scan().await?;
                self.reply(ServerMessage::ClearResponse { success }.to_text()?)
                    .await?;
                Ok(Dispatch::Cleared { success })
            }
            InboundMessage::Unhandled(value) => {
                self.logger
                    .record(&format!("{} ignored control object {}", self.id, value));
                Ok(Dispatch::Ignored)
            }
            InboundMessage::Frame(frame) => self.ingest(frame).await,
            InboundMessage::Unknown => self.reject_unknown().await,
        }
    }

    async fn ingest(&mut self, text: &str) -> ScanResult<Dispatch> {
        let frame = match self
            .context
            .decoder
            .decode_with(text, self.carried_inclination)
        {
            Ok(frame) => frame,
            Err(ScanError::MissingFieldSeparator) => return self.reject_unknown().await,
            Err(err) => return Err(err),
        };

        if let Some(next) = frame.pending_inclination {
            self.carried_inclination = Some(next);
            self.logger.debug(&format!(
                "{} carrying inclination {} into the next frame",
                self.id, next
            ));
        }

        let batch: Vec<PointFields> = frame
            .readings
            .iter()
            .map(|reading| self.context.transformer.project(reading))
            .filter(PointFields::is_finite)
            .collect();

        if batch.is_empty() {
            self.context.metrics.record_parse_failure();
            self.logger.warn(&format!(
                "{} frame yielded no readings ({} triples dropped)",
                self.id, frame.dropped_triples
            ));
            self.reply(ErrorNotice::ParseFailed.to_text()).await?;
            return Ok(Dispatch::ParseFailed);
        }

        let (stored, delivery) = self.context.broadcaster.ingest(batch).await?;
        self.context.metrics.record_frame(stored.len());

        Ok(Dispatch::Ingested {
            stored: stored.len(),
            delivered: delivery.delivered,
        })
    }

    async fn reject_unknown(&self) -> ScanResult<Dispatch> {
        self.context.metrics.record_unknown();
        self.reply(ErrorNotice::UnknownFormat.to_text()).await?;
        Ok(Dispatch::UnknownFormat)
    }

    async fn reply(&self, text: String) -> ScanResult<()> {
        self.outbox
            .send(text)
            .await
            .map_err(|_| ScanError::ChannelClosed)
    }

    /// Deregisters the connection. Idempotent.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.context.registry().disconnect(self.id);
        self.state = ConnectionState::Closed;
        self.logger.record(&format!("{} closed", self.id));
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.close();
    }
}
