//! ==============================================================================
//! main.rs - telemetry bridge entry point
//! ==============================================================================
//!
//! purpose:
//!     a small mock telemetry server that feeds the dashboard while the real
//!     board is not wired up. the board (or the built-in simulator) POSTs raw
//!     readings, the dashboard polls a flat, display-ready projection.
//!
//! responsibilities:
//!     - load configuration (config/bridge.toml or defaults)
//!     - set up logging
//!     - create the one TelemetryBridge for the process
//!     - optionally start the simulated producer
//!     - serve /getTelemetry
//!
//! relationships:
//!     - uses: config.rs (BridgeConfig)
//!     - uses: bridge.rs (latest-snapshot cell)
//!     - uses: server.rs (axum router)
//!     - uses: simulator.rs (synthetic producer)
//!
//! architecture:
//!
//!     ┌──────────────┐   POST raw    ┌──────────────────────┐   GET display
//!     │ device /     │ ────────────> │  /getTelemetry       │ <──────────── dashboard
//!     │ simulator    │               │  (server.rs, axum)   │
//!     └──────────────┘               └──────────┬───────────┘
//!                                               │ State<TelemetryBridge>
//!                                        ┌──────┴──────┐
//!                                        │   bridge    │ <- bridge.rs
//!                                        │ raw+display │
//!                                        └─────────────┘
//!
//! state lifecycle:
//!     the bridge is created empty right here, before the listener is bound,
//!     and handed to the router and the simulator as a clone-able handle.
//!     it lives until the process exits; there is no teardown.
//!
//! ==============================================================================

mod bridge;
mod config;
mod domain;
mod error;
mod server;
mod simulator;

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Telemetry Bridge - dashboard mock server");
    println!("===========================================================");

    // step 1: load configuration
    let config = config::BridgeConfig::load_or_default();
    config.print_summary();

    // step 2: logging (RUST_LOG wins over the config file)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // step 3: the shared snapshot cell, empty until the first ingest
    let bridge = bridge::TelemetryBridge::new(config.logging.show_telemetry);

    // step 4: bind before anything else runs, a taken port is fatal
    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // step 5: optional synthetic producer
    if config.simulator.enabled {
        spawn_simulator(&config.simulator, &bridge)?;
    }

    // step 6: serve until killed
    server::serve(listener, bridge).await
}

fn spawn_simulator(cfg: &config::SimulatorConfig, bridge: &bridge::TelemetryBridge) -> Result<()> {
    let sim = simulator::TelemetrySimulator::new(cfg.seed, simulator::now_ms());
    let interval = Duration::from_millis(cfg.interval_ms);

    match &cfg.hub_url {
        Some(url) => {
            tracing::info!("[STARTUP] ✓ Simulator pushing to {}", url);
            let sink = simulator::HttpSink::new(url.clone())?;
            tokio::spawn(simulator::run(sim, sink, interval));
        }
        None => {
            tracing::info!("[STARTUP] ✓ Simulator feeding local bridge");
            let sink = simulator::LocalSink::new(bridge.clone());
            tokio::spawn(simulator::run(sim, sink, interval));
        }
    }
    Ok(())
}
