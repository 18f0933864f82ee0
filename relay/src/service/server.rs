use crate::service::config::RelayConfig;
use crate::service::producer::run_sweep;
use anyhow::Context;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use scancore::relay::{Relay, RelayContext};
use scancore::telemetry::MetricsSnapshot;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket, Ws};
use warp::{Filter, Rejection, Reply};

/// Body of `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub total_points: usize,
    pub observers: usize,
    pub registered: usize,
    pub metrics: MetricsSnapshot,
}

impl StatsReport {
    pub fn collect(context: &RelayContext) -> Self {
        Self {
            total_points: context.store().len(),
            observers: context.registry().len(),
            registered: context.registry().registered_count(),
            metrics: context.metrics.snapshot(),
        }
    }
}

/// Health and stats endpoints, plus a WebSocket relay on any path.
pub fn routes(
    context: Arc<RelayContext>,
    outbox_capacity: usize,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let context_filter = warp::any().map(move || context.clone());

    let health_route = warp::path("_health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&json!({"response": "OK"})));

    let stats_route = warp::path("stats")
        .and(warp::path::end())
        .and(warp::get())
        .and(context_filter.clone())
        .map(|context: Arc<RelayContext>| warp::reply::json(&StatsReport::collect(&context)));

    let relay_route = warp::ws()
        .and(context_filter)
        .map(move |ws: Ws, context: Arc<RelayContext>| {
            ws.on_upgrade(move |socket| serve_connection(socket, context, outbox_capacity))
        });

    health_route.or(stats_route).or(relay_route)
}

/// Drives one WebSocket: inbound frames go through a [`Relay`], and a writer task
/// drains the connection's outbox into the socket.
async fn serve_connection(socket: WebSocket, context: Arc<RelayContext>, outbox_capacity: usize) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut queue) = mpsc::channel::<String>(outbox_capacity.max(1));
    let mut relay = Relay::connect(context, outbox);
    let id = relay.id();

    let writer = tokio::spawn(async move {
        while let Some(text) = queue.recv().await {
            if let Err(err) = sink.send(Message::text(text)).await {
                debug!("{} write failed: {}", id, err);
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(incoming) = stream.next().await {
        let message = match incoming {
            Ok(message) => message,
            Err(err) => {
                warn!("{} read failed: {}", id, err);
                break;
            }
        };
        if message.is_close() {
            break;
        }
        if !message.is_text() && !message.is_binary() {
            continue;
        }
        let text = String::from_utf8_lossy(message.as_bytes());
        relay.process(&text).await;
    }

    relay.close();
    drop(relay);
    writer.abort();
}

/// Binds the relay and serves until Ctrl+C.
pub async fn serve(config: RelayConfig, context: Arc<RelayContext>) -> anyhow::Result<()> {
    if let Some(sweep) = config.simulate.clone() {
        tokio::spawn(run_sweep(context.clone(), sweep));
    }

    let (addr, server) = warp::serve(routes(context, config.outbox_capacity))
        .try_bind_with_graceful_shutdown(config.bind, async {
            let _ = signal::ctrl_c().await;
        })
        .with_context(|| format!("binding relay on {}", config.bind))?;

    info!("relay listening on ws://{}", addr);
    server.await;
    info!("relay stopped");
    Ok(())
}
