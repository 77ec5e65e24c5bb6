//! Persistent connection to the remote endpoint
//!
//! The transport is opened once at startup and shared by every capture
//! session. It is selected by URL scheme:
//! - `ws://`, `wss://` - WebSocket (binary chunks, text events)
//! - `nats://` - NATS publish on `<prefix>.chunk` / `<prefix>.event`

mod identifier;
mod nats;
mod websocket;

pub use identifier::{parse_identifier, IdentifierSlot};
pub use nats::NatsTransport;
pub use websocket::WebSocketTransport;

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::config::TransportConfig;
use crate::relay::RecordingEvent;

/// One message on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Binary(Vec<u8>),
    Text(String),
}

impl OutboundMessage {
    pub fn event(event: &RecordingEvent) -> serde_json::Result<Self> {
        Ok(Self::Text(serde_json::to_string(event)?))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Binary(bytes) => bytes.len(),
            Self::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Best-effort send; the caller logs failures and keeps recording
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}

/// Open the configured transport
pub async fn connect(config: &TransportConfig, identifier: IdentifierSlot) -> Result<Arc<dyn Transport>> {
    let scheme = config
        .url
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .unwrap_or_default();

    match scheme.as_str() {
        "ws" | "wss" => {
            let transport =
                WebSocketTransport::connect(&config.url, config.greeting.as_deref(), identifier)
                    .await?;
            Ok(Arc::new(transport))
        }
        "nats" => {
            let transport =
                NatsTransport::connect(&config.url, &config.subject_prefix, identifier).await?;
            Ok(Arc::new(transport))
        }
        _ => bail!("Unsupported transport URL: {}", config.url),
    }
}
