//! # Huddle
//!
//! Terminal admin chat client.
//!
//! ## Usage
//!
//! ```bash
//! # Connect with settings from huddle.toml
//! huddle
//!
//! # Custom config and endpoint
//! huddle --config /path/to/huddle.toml --url wss://bus.example/ws/websocket
//!
//! # In-process loopback bus, no network
//! huddle --offline
//!
//! # Environment overrides
//! HUDDLE__IDENTITY__NICKNAME=ops RUST_LOG=huddle=debug huddle
//! ```

use anyhow::Result;
use clap::Parser;
use huddle_client::{app, metrics, ChatView, Config, HttpServices, Renderer, Session};
use huddle_core::Presence;
use huddle_protocol::destinations;
use huddle_transport::{MemoryBus, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Huddle admin chat client
#[derive(Parser)]
#[command(name = "huddle")]
#[command(about = "Realtime admin chat client")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "HUDDLE_CONFIG")]
    config: Option<PathBuf>,

    /// Bus endpoint; repeat to list fallbacks in order
    #[arg(short, long)]
    url: Vec<String>,

    /// Use an in-process loopback bus
    #[arg(long)]
    offline: bool,

    /// Render width in columns
    #[arg(long, default_value_t = 72)]
    width: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so the transcript owns stdout.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "huddle=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::layered(Some(path))?,
        None => Config::load()?,
    };
    if !args.url.is_empty() {
        config.bus.endpoints = args.url.clone();
    }

    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics exporter: {}", e);
        }
    }

    let (transport, services): (Arc<dyn Transport>, Option<HttpServices>) = if args.offline {
        let bus = MemoryBus::new().with_route(destinations::CHAT, destinations::CHAT_TOPIC);
        (Arc::new(bus.transport()), None)
    } else {
        let services = HttpServices::new(&config.api.base_url, config.api_timeout())
            .map_err(|e| warn!("REST services unavailable: {}", e))
            .ok();
        (config.transport(), services)
    };

    info!(
        nickname = %config.identity.nickname,
        transport = transport.name(),
        "Starting Huddle"
    );

    let presence = Presence::new(config.identity(), config.identity.placement.clone());
    let mut view = ChatView::new(Session::new(transport, config.session()), presence)
        .with_time_labels(config.time_labels());
    let renderer = Renderer::new(args.width);

    let lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = std::io::stdout();
    app::run(&mut view, &renderer, services.as_ref(), lines, &mut out).await
}
