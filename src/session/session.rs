use super::config::{SessionConfig, SessionSettings};
use super::stats::{SessionCounters, SessionMonitor, SessionReport, SessionStats};
use crate::audio::{
    save_chunks, AudioBackend, AudioChunk, AudioFrame, ChunkedRecorder, FrameConformer,
};
use crate::error::CaptureError;
use crate::relay::{Relay, RelayAction, RelayOutcome};
use crate::transport::{IdentifierSlot, OutboundMessage, Transport};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// One start-to-stop recording
///
/// Owns the input stream (through its backend) and the relay task. The stream
/// is released on `stop`, or by the backend's drop if the session is dropped.
pub struct CaptureSession {
    config: SessionConfig,
    monitor: SessionMonitor,
    backend: Box<dyn AudioBackend>,
    relay_task: Option<JoinHandle<Result<RelayOutcome, CaptureError>>>,
}

impl CaptureSession {
    /// Acquire the stream and start relaying chunks
    pub async fn start(
        config: SessionConfig,
        mut backend: Box<dyn AudioBackend>,
        transport: Arc<dyn Transport>,
        identifier: IdentifierSlot,
    ) -> Result<Self, CaptureError> {
        let id = format!("capture-{}", uuid::Uuid::new_v4());
        info!(
            "Starting capture session {} ({} backend, {} mode, {}ms chunks)",
            id,
            backend.name(),
            config.relay_mode,
            config.chunk.chunk_interval_ms
        );

        let audio_rx = backend.start().await?;

        let counters = Arc::new(SessionCounters::default());
        let format = (config.sample_rate, config.channels);
        let conformer = FrameConformer::new(config.sample_rate, config.channels);
        let recorder = ChunkedRecorder::new(config.chunk.clone());
        let relay = Relay::new(config.relay_mode, identifier, format);

        let relay_task = tokio::spawn(run_relay(
            audio_rx,
            conformer,
            recorder,
            relay,
            transport,
            Arc::clone(&counters),
        ));

        let monitor = SessionMonitor::new(id, SessionSettings::from(&config), counters);

        Ok(Self {
            config,
            monitor,
            backend,
            relay_task: Some(relay_task),
        })
    }

    pub fn id(&self) -> &str {
        self.monitor.session_id()
    }

    /// Handle for reading stats while the session runs
    pub fn monitor(&self) -> SessionMonitor {
        self.monitor.clone()
    }

    /// Get current session statistics
    pub fn stats(&self) -> SessionStats {
        self.monitor.snapshot(true)
    }

    /// Stop the recorder, finalize the relay and release the stream
    ///
    /// Waits for the trailing chunk and, in full-segment mode, for the
    /// encode-and-send to complete before returning.
    pub async fn stop(mut self) -> Result<SessionReport, CaptureError> {
        info!("Stopping capture session: {}", self.id());

        let relay_task = self.relay_task.take();

        if let Err(e) = self.backend.stop().await {
            error!("Failed to stop audio backend: {}", e);
            if let Some(task) = relay_task {
                task.abort();
            }
            return Err(e);
        }

        let outcome = match relay_task {
            Some(task) => task
                .await
                .map_err(|e| CaptureError::Encode(format!("relay task failed: {}", e)))??,
            None => RelayOutcome::default(),
        };

        let saved_chunks = match &self.config.save_dir {
            Some(dir) if !outcome.buffered.is_empty() => {
                let chunks = outcome.buffered.clone();
                let dir = dir.clone();
                let session_id = self.id().to_string();
                tokio::task::spawn_blocking(move || save_chunks(&chunks, &dir, &session_id))
                    .await
                    .map_err(|e| CaptureError::Encode(e.to_string()))?
                    .map_err(|e| CaptureError::Encode(format!("{:#}", e)))?
            }
            _ => Vec::new(),
        };

        let stats = self.monitor.snapshot(false);
        info!(
            "Capture session {} stopped: {} chunks, {} messages, {} dropped",
            stats.session_id, stats.chunks_count, stats.messages_sent, stats.chunks_dropped
        );

        Ok(SessionReport {
            stats,
            buffered_count: outcome.buffered.len(),
            buffered: outcome.buffered,
            saved_chunks,
        })
    }
}

/// Frames in, chunks out, until the backend closes the frame channel
async fn run_relay(
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    mut conformer: FrameConformer,
    mut recorder: ChunkedRecorder,
    mut relay: Relay,
    transport: Arc<dyn Transport>,
    counters: Arc<SessionCounters>,
) -> Result<RelayOutcome, CaptureError> {
    info!("Relay task started ({} mode via {})", relay.mode(), transport.name());

    while let Some(frame) = audio_rx.recv().await {
        if let Some(frame) = conformer.push(frame)? {
            for chunk in recorder.push(&frame) {
                deliver(&mut relay, chunk, transport.as_ref(), &counters).await;
            }
        }
    }

    if let Some(frame) = conformer.finish()? {
        for chunk in recorder.push(&frame) {
            deliver(&mut relay, chunk, transport.as_ref(), &counters).await;
        }
    }

    if let Some(chunk) = recorder.finish() {
        deliver(&mut relay, chunk, transport.as_ref(), &counters).await;
    }

    let mut outcome = relay.finish().await?;
    if let Some(message) = outcome.final_message.take() {
        send(transport.as_ref(), message, &counters).await;
    }

    info!(
        "Relay task stopped after {} chunks",
        recorder.chunks_emitted()
    );

    Ok(outcome)
}

async fn deliver(
    relay: &mut Relay,
    chunk: AudioChunk,
    transport: &dyn Transport,
    counters: &SessionCounters,
) {
    counters.chunks.fetch_add(1, Ordering::SeqCst);

    match relay.on_chunk(chunk) {
        RelayAction::Send(message) => send(transport, message, counters).await,
        RelayAction::Dropped(_) => {
            counters.dropped.fetch_add(1, Ordering::SeqCst);
        }
        RelayAction::Buffered | RelayAction::Accumulated => {}
    }
}

async fn send(transport: &dyn Transport, message: OutboundMessage, counters: &SessionCounters) {
    let len = message.len();
    match transport.send(message).await {
        Ok(()) => counters.record_sent(len),
        Err(e) => {
            // Continue recording even if a send fails
            counters.send_failures.fetch_add(1, Ordering::SeqCst);
            error!("Failed to send via {}: {:#}", transport.name(), e);
        }
    }
}
