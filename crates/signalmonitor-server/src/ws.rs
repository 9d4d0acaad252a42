//! Instrument WebSocket
//!
//! One request, one reply. Malformed or unknown requests are logged and
//! ignored; they never close the socket.

use crate::{InstrumentState, MAX_REQUEST_SIZE};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use signalmonitor_core::link::protocol::{Envelope, InboundMessage, RequestPayload, FFT_REQUEST, OSC_REQUEST};
use signalmonitor_core::ConnectionState;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast::error::RecvError;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<InstrumentState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle an individual client connection
async fn handle_ws(socket: WebSocket, state: InstrumentState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let clients = state.clients.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::info!(clients, "Client connected");

    let greeting = InboundMessage::Led {
        status: Some(ConnectionState::Connected),
    };
    if let Ok(json) = serde_json::to_string(&greeting) {
        if ws_sender.send(Message::Text(json.into())).await.is_err() {
            state.clients.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    }

    let mut pushes = state.ws_tx.subscribe();

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                let Some(reply) = respond(&state, text.as_str()) else {
                    continue;
                };
                if ws_sender.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            pushed = pushes.recv() => match pushed {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Client lagging behind pushes");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    state.clients.fetch_sub(1, Ordering::Relaxed);
    tracing::debug!("WebSocket client disconnected");
}

/// Build the reply for one request frame
fn respond(state: &InstrumentState, text: &str) -> Option<String> {
    let request: Envelope<RequestPayload> = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed request");
            return None;
        }
    };

    let reply = match (request.kind.as_str(), request.data) {
        (OSC_REQUEST, RequestPayload::Points { points }) => {
            let points = points.min(MAX_REQUEST_SIZE);
            let data = state.synth.lock().ok()?.generate_oscillogram(points);
            InboundMessage::OscData { data: Some(data) }
        }
        (FFT_REQUEST, RequestPayload::Bins { bins }) => {
            let bins = bins.min(MAX_REQUEST_SIZE);
            let samples = state.synth.lock().ok()?.generate_oscillogram(bins * 2);
            let data = state.analyzer.lock().ok()?.magnitudes(&samples, bins);
            InboundMessage::FftData { data: Some(data) }
        }
        (kind, _) => {
            tracing::warn!(kind, "Ignoring unsupported request");
            return None;
        }
    };

    state.requests_served.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(kind = %request.kind, "Request served");
    serde_json::to_string(&reply).ok()
}
