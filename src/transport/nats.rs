use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::identifier::{parse_identifier, IdentifierSlot};
use super::{OutboundMessage, Transport};

pub struct NatsTransport {
    client: Client,
    subject_prefix: String,
    listener: JoinHandle<()>,
}

impl NatsTransport {
    /// Connect to NATS server
    pub async fn connect(
        url: &str,
        subject_prefix: &str,
        identifier: IdentifierSlot,
    ) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        let subject = format!("{}.identifier", subject_prefix);
        let mut subscriber = client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to identifier assignments")?;

        info!("Subscribed to {}", subject);

        let listener = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match std::str::from_utf8(&msg.payload).ok().and_then(parse_identifier) {
                    Some(id) => identifier.assign(id),
                    None => warn!("Ignoring malformed identifier assignment"),
                }
            }
            debug!("Identifier listener stopped");
        });

        Ok(Self {
            client,
            subject_prefix: subject_prefix.to_string(),
            listener,
        })
    }

    fn subject_for(&self, message: &OutboundMessage) -> String {
        match message {
            OutboundMessage::Binary(_) => format!("{}.chunk", self.subject_prefix),
            OutboundMessage::Text(_) => format!("{}.event", self.subject_prefix),
        }
    }
}

#[async_trait::async_trait]
impl Transport for NatsTransport {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let subject = self.subject_for(&message);
        let payload = match message {
            OutboundMessage::Binary(bytes) => bytes,
            OutboundMessage::Text(text) => text.into_bytes(),
        };
        let len = payload.len();

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish message")?;

        debug!("Published {} bytes to {}", len, subject);

        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }
}

impl Drop for NatsTransport {
    fn drop(&mut self) {
        // async-nats handles connection cleanup on drop
        self.listener.abort();
    }
}
