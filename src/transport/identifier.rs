use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared cell holding the one-byte source identifier
///
/// Seeded from configuration; the server may assign a new value at any time.
/// Readers take the current value when a chunk is about to be sent.
#[derive(Debug, Clone)]
pub struct IdentifierSlot {
    tx: Arc<watch::Sender<Option<u8>>>,
}

impl IdentifierSlot {
    pub fn new(initial: Option<u8>) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<u8> {
        *self.tx.borrow()
    }

    pub fn assign(&self, identifier: u8) {
        let previous = self.tx.send_replace(Some(identifier));
        if previous != Some(identifier) {
            info!("Source identifier set to {}", identifier);
        }
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<Option<u8>> {
        self.tx.subscribe()
    }
}

/// Inbound identifier assignment: a bare integer in 0..=255
pub fn parse_identifier(text: &str) -> Option<u8> {
    text.trim().parse::<u8>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_is_visible_to_clones() {
        let slot = IdentifierSlot::new(None);
        let reader = slot.clone();
        assert_eq!(reader.current(), None);

        slot.assign(6);
        assert_eq!(reader.current(), Some(6));

        slot.clear();
        assert_eq!(reader.current(), None);
    }

    #[test]
    fn parses_bare_byte_values_only() {
        assert_eq!(parse_identifier("6"), Some(6));
        assert_eq!(parse_identifier(" 255\n"), Some(255));
        assert_eq!(parse_identifier("256"), None);
        assert_eq!(parse_identifier("Player 3 joined"), None);
        assert_eq!(parse_identifier("-1"), None);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let slot = IdentifierSlot::new(Some(1));
        let mut rx = slot.subscribe();
        slot.assign(2);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(2));
    }
}
