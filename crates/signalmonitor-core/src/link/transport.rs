//! Socket abstraction
//!
//! A [`Connector`] opens a [`Link`] and reports everything that happens on it
//! as [`LinkEvent`]s on the session's event channel. Events carry the link id
//! they belong to so the connection manager can ignore a superseded socket.

use super::LinkError;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Sender half of the link event channel
pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;

/// What happened on a link
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEventKind {
    /// Transport handshake completed
    Opened,
    /// Text frame received
    Message(String),
    /// Transport reported an error; a `Closed` follows
    Error(String),
    /// Transport is gone
    Closed,
}

/// Event tagged with the id of the link that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEvent {
    pub link: u64,
    pub kind: LinkEventKind,
}

impl LinkEvent {
    pub fn new(link: u64, kind: LinkEventKind) -> Self {
        Self { link, kind }
    }
}

/// Outbound half of an open (or opening) socket
pub trait Link: Send {
    /// Queue a text frame; never blocks
    fn send_text(&mut self, text: String) -> Result<(), LinkError>;

    /// Begin closing the socket. Idempotent.
    fn close(&mut self);
}

/// Factory for links
pub trait Connector: Send {
    /// Start opening a link to `endpoint`, reporting on `events` under id `link`
    fn open(
        &mut self,
        endpoint: &str,
        link: u64,
        events: LinkEventSender,
    ) -> Result<Box<dyn Link>, LinkError>;
}

/// Connector for `ws://` / `wss://` endpoints
#[derive(Debug, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(
        &mut self,
        endpoint: &str,
        link: u64,
        events: LinkEventSender,
    ) -> Result<Box<dyn Link>, LinkError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| LinkError::Transport(format!("No async runtime: {}", e)))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        runtime.spawn(drive_socket(endpoint.to_string(), link, events, outbound_rx));

        Ok(Box::new(WebSocketLink {
            outbound: Some(outbound_tx),
        }))
    }
}

/// Outbound handle of a WebSocket driven by [`drive_socket`]
struct WebSocketLink {
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl Link for WebSocketLink {
    fn send_text(&mut self, text: String) -> Result<(), LinkError> {
        let outbound = self.outbound.as_ref().ok_or(LinkError::Closed)?;
        outbound.send(text).map_err(|_| LinkError::Closed)
    }

    fn close(&mut self) {
        // Dropping the sender ends the socket task after a close frame
        self.outbound = None;
    }
}

/// Own one WebSocket for its whole life: connect, pump frames both ways,
/// and always finish with a `Closed` event.
async fn drive_socket(
    endpoint: String,
    link: u64,
    events: LinkEventSender,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let emit = |kind: LinkEventKind| {
        let _ = events.send(LinkEvent::new(link, kind));
    };

    let stream = match connect_async(endpoint.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            emit(LinkEventKind::Error(format!("Connection failed: {}", e)));
            emit(LinkEventKind::Closed);
            return;
        }
    };

    tracing::debug!(link, %endpoint, "WebSocket handshake complete");
    emit(LinkEventKind::Opened);

    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = outbound.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        emit(LinkEventKind::Error(format!("Send failed: {}", e)));
                        break;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    emit(LinkEventKind::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::warn!(link, bytes = data.len(), "Ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {
                    // Ping/pong handled by tungstenite
                }
                Some(Err(e)) => {
                    emit(LinkEventKind::Error(e.to_string()));
                    break;
                }
            },
        }
    }

    emit(LinkEventKind::Closed);
}
