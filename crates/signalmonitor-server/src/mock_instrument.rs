//! Standalone mock instrument
//!
//! Serves the instrument WebSocket on `PORT` (default 8080). With `--drift`
//! it also pushes a slowly varying sampling-rate suggestion to every client.

use signalmonitor_core::link::protocol::InboundMessage;
use signalmonitor_server::{InstrumentState, ServerConfig};
use std::time::Duration;

/// Interval between pushed sampling-rate suggestions
const DRIFT_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signalmonitor_server=debug".parse().unwrap()),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080u16);
    let drift = std::env::args().any(|a| a == "--drift");

    let state = InstrumentState::new(ServerConfig {
        port,
        ..ServerConfig::default()
    });

    if drift {
        let pusher = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(DRIFT_INTERVAL);
            let mut step = 0u32;
            loop {
                interval.tick().await;
                let hz = 1000.0 + 900.0 * (step as f64 * 0.3).sin();
                let clients = pusher.push(&InboundMessage::Slider { value: Some(hz) });
                tracing::debug!(hz, clients, "Pushed sampling-rate suggestion");
                step = step.wrapping_add(1);
            }
        });
    }

    tracing::info!(port, drift, "Mock instrument starting");

    if let Err(e) = signalmonitor_server::start_server(state).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
