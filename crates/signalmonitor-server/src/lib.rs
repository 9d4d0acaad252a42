//! Signalmonitor mock instrument - Axum WebSocket endpoint
//!
//! Stands in for the remote instrument during development and testing. A
//! client connected at `/` gets a `led` greeting and then one `osc_data` or
//! `fft_data` reply per `osc_request` / `fft_request`. Out-of-band messages
//! (`led`, `slider`) can be pushed to every connected client.

pub mod spectrum;
pub mod ws;

use axum::extract::State;
use axum::response::Json;
use axum::Router;
use serde::Serialize;
use signalmonitor_core::link::protocol::InboundMessage;
use signalmonitor_core::SignalSynthesizer;
use spectrum::SpectrumAnalyzer;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Largest request (points or bins) the instrument answers
pub const MAX_REQUEST_SIZE: usize = 16_384;

/// Shared state accessible from all handlers
#[derive(Clone)]
pub struct InstrumentState {
    /// Signal source for oscillogram replies and spectrum input
    pub synth: Arc<Mutex<SignalSynthesizer>>,
    pub analyzer: Arc<Mutex<SpectrumAnalyzer>>,
    /// Out-of-band pushes to all connected clients
    pub ws_tx: tokio::sync::broadcast::Sender<String>,
    pub clients: Arc<AtomicUsize>,
    pub requests_served: Arc<AtomicU64>,
    pub config: ServerConfig,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Bind address
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: "127.0.0.1".to_string(),
        }
    }
}

impl InstrumentState {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_synthesizer(config, SignalSynthesizer::new())
    }

    pub fn with_synthesizer(config: ServerConfig, synth: SignalSynthesizer) -> Self {
        let (ws_tx, _) = tokio::sync::broadcast::channel(256);
        Self {
            synth: Arc::new(Mutex::new(synth)),
            analyzer: Arc::new(Mutex::new(SpectrumAnalyzer::new())),
            ws_tx,
            clients: Arc::new(AtomicUsize::new(0)),
            requests_served: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    /// Push a message to every connected client. Returns the number of
    /// clients it was queued for.
    pub fn push(&self, message: &InboundMessage) -> usize {
        if self.ws_tx.receiver_count() == 0 {
            return 0;
        }
        match serde_json::to_string(message) {
            Ok(json) => self.ws_tx.send(json).unwrap_or(0),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode push message");
                0
            }
        }
    }
}

/// Instrument status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub clients: usize,
    pub requests_served: u64,
}

async fn get_status(State(state): State<InstrumentState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        clients: state.clients.load(Ordering::Relaxed),
        requests_served: state.requests_served.load(Ordering::Relaxed),
    })
}

/// Build the Axum router with all routes
pub fn build_router(state: InstrumentState) -> Router {
    Router::new()
        .route("/", axum::routing::get(ws::ws_handler))
        .route("/api/v1/status", axum::routing::get(get_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind to the configured address and serve until the process exits
pub async fn start_server(state: InstrumentState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.bind_addr, state.config.port);
    let listener = TcpListener::bind(&addr).await?;
    serve_listener(listener, state).await
}

/// Serve on an already-bound listener
pub async fn serve_listener(listener: TcpListener, state: InstrumentState) -> anyhow::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!(%addr, "Mock instrument listening");

    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use signalmonitor_core::ConnectionState;
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    async fn spawn_server() -> (SocketAddr, InstrumentState) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = InstrumentState::with_synthesizer(
            ServerConfig {
                port: addr.port(),
                ..ServerConfig::default()
            },
            SignalSynthesizer::with_seed(5),
        );
        tokio::spawn(serve_listener(listener, state.clone()));
        (addr, state)
    }

    async fn next_message<S>(socket: &mut S) -> InboundMessage
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match socket.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_greeting_and_replies() {
        let (addr, state) = spawn_server().await;
        let (mut socket, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();

        assert_eq!(
            next_message(&mut socket).await,
            InboundMessage::Led {
                status: Some(ConnectionState::Connected)
            }
        );

        socket
            .send(Message::Text(
                r#"{"type":"osc_request","data":{"points":64},"timestamp":0}"#.into(),
            ))
            .await
            .unwrap();
        match next_message(&mut socket).await {
            InboundMessage::OscData { data: Some(data) } => assert_eq!(data.len(), 64),
            other => panic!("unexpected reply: {:?}", other),
        }

        socket
            .send(Message::Text(
                r#"{"type":"fft_request","data":{"bins":32},"timestamp":0}"#.into(),
            ))
            .await
            .unwrap();
        match next_message(&mut socket).await {
            InboundMessage::FftData { data: Some(data) } => {
                assert_eq!(data.len(), 32);
                assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
            }
            other => panic!("unexpected reply: {:?}", other),
        }

        assert_eq!(state.requests_served.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_malformed_request_is_ignored() {
        let (addr, _state) = spawn_server().await;
        let (mut socket, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        next_message(&mut socket).await;

        socket.send(Message::Text("not json".into())).await.unwrap();
        socket
            .send(Message::Text(
                r#"{"type":"osc_request","data":{"points":8},"timestamp":0}"#.into(),
            ))
            .await
            .unwrap();

        match next_message(&mut socket).await {
            InboundMessage::OscData { data: Some(data) } => assert_eq!(data.len(), 8),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_push_reaches_clients() {
        let (addr, state) = spawn_server().await;
        let (mut socket, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
        next_message(&mut socket).await;

        // The handler subscribes after sending the greeting
        let mut queued = 0;
        for _ in 0..50 {
            queued = state.push(&InboundMessage::Slider { value: Some(2500.0) });
            if queued > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(queued, 1);
        assert_eq!(
            next_message(&mut socket).await,
            InboundMessage::Slider { value: Some(2500.0) }
        );
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let (addr, _state) = spawn_server().await;
        let status: serde_json::Value = reqwest::get(format!("http://{}/api/v1/status", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(status["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(status["requests_served"], 0);
    }
}
