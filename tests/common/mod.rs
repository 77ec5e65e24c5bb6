// Test doubles shared by the integration tests
//
// `FakeBackend` queues a fixed list of frames and keeps its channel open until
// stopped, so every frame is relayed before the session finalizes.
// `RecordingTransport` keeps every message it was asked to send.

#![allow(dead_code)]

use anyhow::{bail, Result};
use mic_relay::{
    AudioBackend, AudioFrame, BackendFactory, Capability, CaptureController, CaptureError,
    IdentifierSlot, OutboundMessage, RelayMode, SessionConfig, Transport,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify, Semaphore};

pub const SAMPLE_RATE: u32 = 16000;

/// `count` mono frames of `frame_ms` each, sample values counting up
pub fn frames(count: usize, frame_ms: u64) -> Vec<AudioFrame> {
    let len = (SAMPLE_RATE as u64 * frame_ms / 1000) as usize;
    (0..count)
        .map(|i| AudioFrame {
            samples: (0..len).map(|s| ((i * len + s) % 3000) as i16).collect(),
            sample_rate: SAMPLE_RATE,
            channels: 1,
            timestamp_ms: i as u64 * frame_ms,
        })
        .collect()
}

pub struct FakeBackend {
    frames: Vec<AudioFrame>,
    tx: Option<mpsc::Sender<AudioFrame>>,
}

impl FakeBackend {
    pub fn new(frames: Vec<AudioFrame>) -> Self {
        Self { frames, tx: None }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FakeBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let (tx, rx) = mpsc::channel(self.frames.len() + 1);
        for frame in self.frames.drain(..) {
            tx.send(frame)
                .await
                .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        }
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.tx = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Backend whose device refuses to open
pub struct DeniedBackend;

#[async_trait::async_trait]
impl AudioBackend for DeniedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        Err(CaptureError::PermissionDenied(
            "user dismissed the prompt".to_string(),
        ))
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "denied"
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<OutboundMessage>>,
    failing: bool,
    /// When set, each send waits for a permit
    gate: Option<Semaphore>,
    sending: Notify,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Sends block until `release` is called
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Wait until a send has been attempted
    pub async fn wait_for_send(&self) {
        self.sending.notified().await;
    }

    pub fn release(&self, sends: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(sends);
        }
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        self.sending.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        if self.failing {
            bail!("connection closed");
        }
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn supported() -> Capability {
    Capability::Supported {
        host: "test".to_string(),
        device: "fake input".to_string(),
    }
}

pub fn session_config(mode: RelayMode, save_dir: Option<PathBuf>) -> SessionConfig {
    SessionConfig {
        relay_mode: mode,
        save_dir,
        ..SessionConfig::default()
    }
}

pub fn fake_backends(frames: Vec<AudioFrame>) -> BackendFactory {
    Arc::new(move || Ok(Box::new(FakeBackend::new(frames.clone())) as Box<dyn AudioBackend>))
}

pub fn denied_backends() -> BackendFactory {
    Arc::new(|| Ok(Box::new(DeniedBackend) as Box<dyn AudioBackend>))
}

pub struct Harness {
    pub controller: Arc<CaptureController>,
    pub transport: Arc<RecordingTransport>,
    pub identifier: IdentifierSlot,
}

pub fn harness(
    config: SessionConfig,
    capability: Capability,
    backends: BackendFactory,
    identifier: Option<u8>,
    transport: RecordingTransport,
) -> Harness {
    let transport = Arc::new(transport);
    let identifier = IdentifierSlot::new(identifier);
    let controller = Arc::new(CaptureController::new(
        config,
        capability,
        backends,
        Arc::clone(&transport) as Arc<dyn Transport>,
        identifier.clone(),
    ));

    Harness {
        controller,
        transport,
        identifier,
    }
}

/// Controller in `mode` over one second of fake audio in 100ms frames
pub fn one_second(mode: RelayMode, identifier: Option<u8>) -> Harness {
    harness(
        session_config(mode, None),
        supported(),
        fake_backends(frames(10, 100)),
        identifier,
        RecordingTransport::default(),
    )
}
