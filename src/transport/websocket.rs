use anyhow::{Context, Result};
use async_tungstenite::tokio::{connect_async, ConnectStream};
use async_tungstenite::tungstenite::Message;
use async_tungstenite::WebSocketStream;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::identifier::{parse_identifier, IdentifierSlot};
use super::{OutboundMessage, Transport};

type WsSink = SplitSink<WebSocketStream<ConnectStream>, Message>;
type WsSource = SplitStream<WebSocketStream<ConnectStream>>;

pub struct WebSocketTransport {
    url: String,
    sink: Mutex<WsSink>,
    reader: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Connect to WebSocket endpoint
    pub async fn connect(
        url: &str,
        greeting: Option<&str>,
        identifier: IdentifierSlot,
    ) -> Result<Self> {
        info!("Connecting to WebSocket at {}", url);

        let (stream, _response) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;

        info!("WebSocket connection open");

        let (mut sink, source) = stream.split();

        if let Some(greeting) = greeting {
            sink.send(Message::Text(greeting.to_string()))
                .await
                .context("Failed to send greeting")?;
            debug!("Sent greeting: {}", greeting);
        }

        let reader = tokio::spawn(read_inbound(source, identifier));

        Ok(Self {
            url: url.to_string(),
            sink: Mutex::new(sink),
            reader,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let frame = match message {
            OutboundMessage::Binary(bytes) => Message::Binary(bytes),
            OutboundMessage::Text(text) => Message::Text(text),
        };

        let mut sink = self.sink.lock().await;
        sink.send(frame)
            .await
            .context("Failed to send WebSocket message")?;

        Ok(())
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Log server messages and pick up identifier assignments
async fn read_inbound(mut source: WsSource, identifier: IdentifierSlot) {
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                info!("<< {}", text);
                if let Some(id) = parse_identifier(&text) {
                    identifier.assign(id);
                }
            }
            Ok(Message::Binary(payload)) => {
                debug!("<< ({} bytes of data)", payload.len());
            }
            Ok(Message::Close(frame)) => {
                info!("WebSocket closed by server: {:?}", frame);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket read failed: {}", e);
                break;
            }
        }
    }

    debug!("WebSocket reader stopped");
}
