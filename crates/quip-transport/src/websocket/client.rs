//! Socket-mode event stream.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use quip_core::{EventSource, InboundEvent, SessionInfo, TransportError, TransportResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::http::WebClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One decoded socket-mode frame.
#[derive(Debug)]
enum Frame {
    /// The connection is ready.
    Hello,
    /// The platform is about to close the connection.
    Disconnect(String),
    /// An event envelope carrying a workspace event.
    Event {
        envelope_id: String,
        event: Box<InboundEvent>,
    },
    /// Any other envelope (slash commands, interactivity, ...).
    Other {
        envelope_id: Option<String>,
        kind: String,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    reason: Option<String>,
}

fn decode_frame(text: &str) -> TransportResult<Frame> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| TransportError::Malformed(e.to_string()))?;

    match (envelope.kind.as_str(), envelope.envelope_id) {
        ("hello", _) => Ok(Frame::Hello),
        ("disconnect", _) => Ok(Frame::Disconnect(envelope.reason.unwrap_or_default())),
        ("events_api", Some(envelope_id)) => {
            let event = envelope
                .payload
                .get("event")
                .cloned()
                .ok_or_else(|| TransportError::Malformed("events_api payload has no event".into()))
                .and_then(|event| {
                    InboundEvent::from_value(event)
                        .map_err(|e| TransportError::Malformed(e.to_string()))
                });
            match event {
                Ok(event) => Ok(Frame::Event {
                    envelope_id,
                    event: Box::new(event),
                }),
                // Still acknowledged, so the platform does not redeliver it.
                Err(e) => {
                    warn!(error = %e, "Undecodable event envelope");
                    Ok(Frame::Other {
                        envelope_id: Some(envelope_id),
                        kind: "events_api".into(),
                    })
                }
            }
        }
        (_, envelope_id) => Ok(Frame::Other {
            envelope_id,
            kind: envelope.kind,
        }),
    }
}

/// An [`EventSource`] over a socket-mode connection.
///
/// Every envelope is acknowledged as soon as it is read. A `disconnect`
/// frame, a close frame or a dropped socket ends the stream; there is no
/// reconnect.
pub struct SocketModeClient {
    web: Arc<WebClient>,
    app_token: String,
    stream: Mutex<Option<WsStream>>,
}

impl SocketModeClient {
    /// Creates a client; nothing is opened until
    /// [`start_session`](EventSource::start_session).
    pub fn new(web: Arc<WebClient>, app_token: impl Into<String>) -> Self {
        Self {
            web,
            app_token: app_token.into(),
            stream: Mutex::new(None),
        }
    }

    async fn ack(stream: &mut WsStream, envelope_id: &str) -> TransportResult<()> {
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        stream
            .send(Message::Text(ack.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl EventSource for SocketModeClient {
    async fn start_session(&self) -> TransportResult<SessionInfo> {
        let session = self.web.auth_test().await?;
        let url = self.web.open_connection(&self.app_token).await?;

        info!(user_id = %session.user_id, "Connecting to socket-mode endpoint");
        let (stream, _response) =
            connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: url.clone(),
                    reason: format!("WebSocket connection failed: {e}"),
                })?;

        *self.stream.lock().await = Some(stream);
        info!("Socket-mode connection established");
        Ok(session)
    }

    async fn next_event(&self) -> TransportResult<Option<InboundEvent>> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotStarted)?;

        loop {
            let text = match stream.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!(len = data.len(), "Ignoring non-UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    trace!("Received ping, sending pong");
                    let _ = stream.send(Message::Pong(data)).await;
                    continue;
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Server closed connection");
                    return Ok(None);
                }
                Some(Err(e)) => {
                    return Err(TransportError::ConnectionClosed {
                        reason: e.to_string(),
                    });
                }
                None => {
                    info!("WebSocket stream ended");
                    return Ok(None);
                }
            };

            let frame = match decode_frame(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Ignoring undecodable frame");
                    continue;
                }
            };

            match frame {
                Frame::Hello => debug!("Socket-mode hello received"),
                Frame::Disconnect(reason) => {
                    info!(%reason, "Socket-mode disconnect requested");
                    return Ok(None);
                }
                Frame::Event { envelope_id, event } => {
                    Self::ack(stream, &envelope_id).await?;
                    trace!(envelope_id = %envelope_id, event = event.event_name(), "Event received");
                    return Ok(Some(*event));
                }
                Frame::Other { envelope_id, kind } => {
                    if let Some(envelope_id) = envelope_id {
                        Self::ack(stream, &envelope_id).await?;
                    }
                    debug!(%kind, "Ignoring envelope");
                }
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            stream
                .close(None)
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        }
        Ok(())
    }
}
