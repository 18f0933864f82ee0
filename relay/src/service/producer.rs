use crate::generator::{build_sweep_frames, SweepConfig};
use log::{info, warn};
use scancore::relay::{Dispatch, Relay, RelayContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time;

/// Summary of one simulated sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub frames: usize,
    pub stored: usize,
    pub rejected: usize,
}

/// Feeds a synthetic sweep through an in-process connection, one frame per tick.
pub async fn run_sweep(context: Arc<RelayContext>, config: SweepConfig) -> SweepReport {
    let frames = build_sweep_frames(&config);
    let (outbox, mut replies) = mpsc::channel(16);
    let mut relay = Relay::connect(context, outbox);
    let mut ticker = time::interval(Duration::from_millis(config.interval_ms.max(1)));
    let mut report = SweepReport::default();

    info!("simulated producer {} sending {} frames", relay.id(), frames.len());

    for frame in &frames {
        ticker.tick().await;
        report.frames += 1;
        match relay.process(frame).await {
            Dispatch::Ingested { stored, .. } => report.stored += stored,
            other => {
                report.rejected += 1;
                warn!("simulated frame not ingested: {:?}", other);
            }
        }
        while let Ok(reply) = replies.try_recv() {
            warn!("simulated producer received {}", reply);
        }
    }

    relay.close();
    info!(
        "simulated sweep finished: {} frames, {} points",
        report.frames, report.stored
    );
    report
}
