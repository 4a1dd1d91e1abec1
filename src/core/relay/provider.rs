//! WebSocket connection to the realtime speech provider.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::messages::{ProviderClientEvent, ProviderServerEvent};
use crate::errors::app_error::TransportError;

/// OpenAI Realtime API endpoint; the model is passed as a query parameter.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One provider-side WebSocket connection, owned by a single relay bridge.
pub struct ProviderSocket {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

/// Something the provider socket surfaced to the bridge.
#[derive(Debug)]
pub enum ProviderMessage {
    Event(ProviderServerEvent),
    /// A ping we must answer to keep the connection alive.
    Ping(Vec<u8>),
    Closed,
}

impl ProviderSocket {
    /// Connect to `base_url` with the authenticated handshake. The model is
    /// appended as a query parameter.
    pub async fn connect(
        base_url: &str,
        api_key: &str,
        model: &str,
    ) -> Result<Self, TransportError> {
        // A base URL without a path would yield the request line
        // `GET ?model=... HTTP/1.1`, which peers reject as an invalid URI.
        let authority = base_url
            .split_once("://")
            .map_or(base_url, |(_, rest)| rest);
        let url = if authority.contains('/') {
            format!("{base_url}?model={model}")
        } else {
            format!("{base_url}/?model={model}")
        };
        Self::connect_with_url(&url, api_key).await
    }

    /// Connect to a fully-formed WebSocket URL.
    pub async fn connect_with_url(url: &str, api_key: &str) -> Result<Self, TransportError> {
        let host = host_of(url)?;
        let request = http::Request::builder()
            .uri(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let (ws, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        tracing::info!(url, "connected to realtime provider");

        let (sink, stream) = ws.split();
        Ok(Self { sink, stream })
    }

    pub async fn send_event(&mut self, event: &ProviderClientEvent) -> Result<(), TransportError> {
        let json =
            serde_json::to_string(event).map_err(|e| TransportError::Provider(e.to_string()))?;
        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::Provider(e.to_string()))
    }

    /// Next meaningful message from the provider. Unparseable text frames
    /// are logged and skipped; binary frames are ignored.
    pub async fn next(&mut self) -> ProviderMessage {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ProviderServerEvent>(&text) {
                        Ok(event) => return ProviderMessage::Event(event),
                        Err(e) => {
                            tracing::warn!(error = %e, "unparseable provider event, skipping");
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => return ProviderMessage::Ping(data.to_vec()),
                Some(Ok(Message::Close(_))) | None => return ProviderMessage::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "provider stream error");
                    return ProviderMessage::Closed;
                }
            }
        }
    }

    pub async fn pong(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
        self.sink
            .send(Message::Pong(data.into()))
            .await
            .map_err(|e| TransportError::Provider(e.to_string()))
    }

    /// Application-level keepalive.
    pub async fn ping(&mut self) -> Result<(), TransportError> {
        self.sink
            .send(Message::Ping(Vec::new().into()))
            .await
            .map_err(|e| TransportError::Provider(e.to_string()))
    }

    pub async fn close(&mut self) {
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            tracing::debug!(error = %e, "provider close frame not delivered");
        }
    }
}

/// Authority part of a ws/wss URL, for the handshake `Host` header.
fn host_of(url: &str) -> Result<&str, TransportError> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    let host = &rest[..end];
    if host.is_empty() {
        return Err(TransportError::Handshake(format!(
            "no host in provider url {url}"
        )));
    }
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction_handles_paths_queries_and_ports() {
        assert_eq!(
            host_of("wss://api.openai.com/v1/realtime?model=m").unwrap(),
            "api.openai.com"
        );
        assert_eq!(host_of("ws://127.0.0.1:9034?model=m").unwrap(), "127.0.0.1:9034");
        assert_eq!(host_of("ws://localhost:8080/ws").unwrap(), "localhost:8080");
        assert!(host_of("ws://").is_err());
    }
}
