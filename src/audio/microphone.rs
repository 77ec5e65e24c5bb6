// Microphone backend using cpal
//
// cpal::Stream is not Send, so the stream is opened, played and dropped on a
// dedicated capture thread. The audio callback never blocks: frames go into a
// bounded channel with try_send and are counted as dropped when it is full.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use crate::error::CaptureError;

const FRAME_CHANNEL_CAPACITY: usize = 256;
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Format the device actually opened with
#[derive(Debug, Clone, Copy)]
struct StreamInfo {
    sample_rate: u32,
    channels: u16,
}

pub struct MicrophoneBackend {
    host: String,
    device: String,
    config: AudioBackendConfig,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    dropped_frames: Arc<AtomicU64>,
    capturing: bool,
}

impl MicrophoneBackend {
    pub fn new(host: String, device: String, config: AudioBackendConfig) -> Self {
        info!(
            "Microphone backend initialized: {} on {} ({}ms frames)",
            device, host, config.buffer_duration_ms
        );

        Self {
            host,
            device,
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
            dropped_frames: Arc::new(AtomicU64::new(0)),
            capturing: false,
        }
    }

    /// Frames discarded because the consumer fell behind
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.capturing {
            return Err(CaptureError::DeviceUnavailable(
                "microphone is already capturing".to_string(),
            ));
        }

        info!("Requesting microphone access: {}", self.device);

        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&self.stop_flag);
        let dropped_frames = Arc::clone(&self.dropped_frames);
        let host = self.host.clone();
        let device = self.device.clone();
        let frame_ms = self.config.buffer_duration_ms;

        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let sink = FrameSink {
                    tx: frame_tx,
                    dropped: dropped_frames,
                    frame_ms,
                };
                run_capture(&host, &device, sink, ready_tx, stop_flag)
            })?;

        match ready_rx.await {
            Ok(Ok(stream_info)) => {
                info!(
                    "Microphone capture started: {}Hz, {} channels",
                    stream_info.sample_rate, stream_info.channels
                );
                self.thread = Some(thread);
                self.capturing = true;
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                let _ = tokio::task::spawn_blocking(move || thread.join()).await;
                Err(e)
            }
            Err(_) => Err(CaptureError::DeviceUnavailable(
                "capture thread exited before the stream started".to_string(),
            )),
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.capturing {
            return Ok(());
        }

        info!("Stopping microphone capture");

        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join())
                .await
                .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
            if joined.is_err() {
                error!("Microphone capture thread panicked");
            }
        }

        self.capturing = false;

        let dropped = self.dropped_frames();
        if dropped > 0 {
            warn!("Microphone dropped {} frames while capturing", dropped);
        }
        info!("Microphone capture stopped");

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        // The capture thread drops the stream and exits on its own
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

/// Where the audio callback delivers frames
struct FrameSink {
    tx: mpsc::Sender<AudioFrame>,
    dropped: Arc<AtomicU64>,
    /// Audio per frame; callback buffers are gathered until it is reached
    frame_ms: u64,
}

/// Body of the capture thread: open, report readiness, hold until stopped
fn run_capture(
    host_name: &str,
    device_name: &str,
    sink: FrameSink,
    ready_tx: oneshot::Sender<Result<StreamInfo, CaptureError>>,
    stop_flag: Arc<AtomicBool>,
) {
    let opened = open_stream(host_name, device_name, sink).and_then(
        |(stream, stream_info)| {
            stream
                .play()
                .map_err(|e| classify_stream_error(e.to_string()))?;
            Ok((stream, stream_info))
        },
    );

    let stream = match opened {
        Ok((stream, stream_info)) => {
            if ready_tx.send(Ok(stream_info)).is_err() {
                return;
            }
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(STOP_POLL_INTERVAL);
    }

    drop(stream);
    debug!("Capture thread released the input stream");
}

fn open_stream(
    host_name: &str,
    device_name: &str,
    sink: FrameSink,
) -> Result<(cpal::Stream, StreamInfo), CaptureError> {
    let device = find_device(host_name, device_name)?;

    let supported = device
        .default_input_config()
        .map_err(|e| classify_stream_error(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    let stream_info = StreamInfo {
        sample_rate: config.sample_rate.0,
        channels: config.channels,
    };

    let stream = match sample_format {
        SampleFormat::I16 => build_stream::<i16>(&device, &config, sink),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, sink),
        SampleFormat::F32 => build_stream::<f32>(&device, &config, sink),
        other => {
            return Err(CaptureError::DeviceUnavailable(format!(
                "unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| classify_stream_error(e.to_string()))?;

    Ok((stream, stream_info))
}

/// Resolve the negotiated device, falling back to the host default
fn find_device(host_name: &str, device_name: &str) -> Result<cpal::Device, CaptureError> {
    let host = cpal::available_hosts()
        .into_iter()
        .find(|id| id.name() == host_name)
        .and_then(|id| cpal::host_from_id(id).ok())
        .unwrap_or_else(cpal::default_host);

    let named = host.input_devices().ok().and_then(|mut devices| {
        devices.find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
    });

    named
        .or_else(|| host.default_input_device())
        .ok_or_else(|| {
            CaptureError::DeviceUnavailable(format!(
                "input device {} is no longer present",
                device_name
            ))
        })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    sink: FrameSink,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let mut batcher = FrameBatcher::new(sample_rate, channels, sink.frame_ms);

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples = data.iter().map(|&s| s.to_sample::<i16>());
            for frame in batcher.push(samples) {
                if sink.tx.try_send(frame).is_err() {
                    sink.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )
}

/// Gathers callback buffers into frames of a fixed duration
struct FrameBatcher {
    sample_rate: u32,
    channels: u16,
    frame_len: usize,
    pending: Vec<i16>,
    frames_delivered: u64,
}

impl FrameBatcher {
    fn new(sample_rate: u32, channels: u16, frame_ms: u64) -> Self {
        let channels = channels.max(1);
        let frame_len =
            ((sample_rate as u64 * frame_ms / 1000).max(1) * channels as u64) as usize;

        Self {
            sample_rate: sample_rate.max(1),
            channels,
            frame_len,
            pending: Vec::with_capacity(frame_len),
            frames_delivered: 0,
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = i16>) -> Vec<AudioFrame> {
        let mut ready = Vec::new();
        for sample in samples {
            self.pending.push(sample);
            if self.pending.len() == self.frame_len {
                let samples =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_len));
                let timestamp_ms = self.frames_delivered * 1000 / self.sample_rate as u64;
                self.frames_delivered += (samples.len() / self.channels as usize) as u64;
                ready.push(AudioFrame {
                    samples,
                    sample_rate: self.sample_rate,
                    channels: self.channels,
                    timestamp_ms,
                });
            }
        }
        ready
    }
}

/// Platforms report permission refusals as backend-specific errors
fn classify_stream_error(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_are_classified() {
        assert!(matches!(
            classify_stream_error("Access denied by the system".to_string()),
            CaptureError::PermissionDenied(_)
        ));
        assert!(matches!(
            classify_stream_error("The requested device is no longer available".to_string()),
            CaptureError::DeviceUnavailable(_)
        ));
    }

    #[test]
    fn callback_buffers_are_batched_into_frames() {
        // 10ms frames of 48kHz stereo: 960 samples each
        let mut batcher = FrameBatcher::new(48000, 2, 10);

        assert!(batcher.push(std::iter::repeat(1).take(500)).is_empty());
        let frames = batcher.push(std::iter::repeat(2).take(1500));

        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.samples.len() == 960));
        assert_eq!(frames[0].timestamp_ms, 0);
        assert_eq!(frames[1].timestamp_ms, 10);
        assert_eq!(batcher.pending.len(), 80);
    }

    #[test]
    fn backend_starts_idle() {
        let backend = MicrophoneBackend::new(
            "ALSA".to_string(),
            "default".to_string(),
            AudioBackendConfig::default(),
        );
        assert!(!backend.is_capturing());
        assert_eq!(backend.dropped_frames(), 0);
        assert_eq!(backend.name(), "microphone");
    }
}
