use anyhow::Context;
use clap::Parser;
use generator::SweepConfig;
use scancore::geometry::DEFAULT_WHEEL_BASE;
use scancore::relay::RelayContext;
use service::config::{
    default_bind_address, RelayConfig, DEFAULT_OUTBOX_CAPACITY, DEFAULT_STORE_PATH,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;

mod generator;
mod service;

#[derive(Parser)]
#[command(author, version, about = "Relay that stores scan points and streams them to observers")]
struct Args {
    /// Load the relay config from YAML (overrides the flags below)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = default_bind_address())]
    bind: SocketAddr,
    #[arg(long, default_value_t = DEFAULT_WHEEL_BASE)]
    wheel_base: f64,
    /// JSON-lines file the points are persisted to
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,
    /// Keep points in memory only; they are lost on restart
    #[arg(long, default_value_t = false, conflicts_with = "store")]
    memory: bool,
    #[arg(long, default_value_t = DEFAULT_OUTBOX_CAPACITY)]
    outbox_capacity: usize,
    /// Feed a synthetic pan/tilt sweep through the relay
    #[arg(long, default_value_t = false)]
    simulate: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = if let Some(path) = args.config {
        RelayConfig::load(path)?
    } else {
        let store = (!args.memory).then_some(args.store);
        RelayConfig::from_args(args.bind, args.wheel_base, store, args.outbox_capacity)
    };
    if args.simulate && config.simulate.is_none() {
        config.simulate = Some(SweepConfig::default());
    }

    let store = config.open_store()?;
    let context = Arc::new(RelayContext::new(store, config.transformer()));

    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating relay runtime")?;
    runtime.block_on(service::server::serve(config, context))
}
