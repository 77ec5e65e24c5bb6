use anyhow::{Context, Result};
use hound::WavReader;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use crate::error::CaptureError;

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split the samples into frames of `frame_ms` each
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        let channels = self.channels.max(1) as usize;
        let frame_len = ((self.sample_rate as u64 * frame_ms.max(1) / 1000) as usize).max(1);

        self.samples
            .chunks(frame_len * channels)
            .enumerate()
            .map(|(i, samples)| AudioFrame {
                samples: samples.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Replays a WAV file as if it were captured live
///
/// The frame channel stays open until `stop`, so a file shorter than the
/// session ends the same way a quiet microphone would.
pub struct FileBackend {
    path: String,
    config: AudioBackendConfig,
    paced: bool,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    /// `paced` emits one frame per buffer duration; otherwise frames are
    /// emitted as fast as the consumer takes them.
    pub fn new(path: String, config: AudioBackendConfig, paced: bool) -> Self {
        Self {
            path,
            config,
            paced,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.task.is_some() {
            return Err(CaptureError::DeviceUnavailable(
                "file source is already playing".to_string(),
            ));
        }

        let path = self.path.clone();
        let audio = tokio::task::spawn_blocking(move || AudioFile::open(path))
            .await
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
            .map_err(|e| CaptureError::DeviceUnavailable(format!("{:#}", e)))?;

        let frame_ms = self.config.buffer_duration_ms.max(1);
        let frames = audio.frames(frame_ms);
        let paced = self.paced;
        let (tx, rx) = mpsc::channel(64);

        info!(
            "Replaying {} as capture source ({} frames of {}ms)",
            self.path,
            frames.len(),
            frame_ms
        );

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(frame_ms));
            for frame in frames {
                if paced {
                    ticker.tick().await;
                }
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
            // A live device stays open after the file runs out
            debug!("File replay finished, holding the source open until stopped");
            tx.closed().await;
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("File replay task failed: {}", e);
                }
            }
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn name(&self) -> &str {
        "file"
    }
}
