use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::CaptureError;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for audio backend
///
/// Backends deliver frames in the device's native format; sessions convert
/// them with a `FrameConformer`.
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Audio per delivered frame in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            buffer_duration_ms: 100,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal default input device
/// - File: replays a WAV file (headless runs, testing)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Acquire the input stream and start capturing
    ///
    /// Returns a channel receiver that will receive audio frames. The channel
    /// closes once the backend is stopped.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Stop capturing and release the stream
    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Microphone input (all platforms)
    Microphone,
    /// File input (replayed as if captured live)
    File(String),
}

impl AudioSource {
    /// `"microphone"` selects the input device, anything else is a WAV path
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("microphone") || value.eq_ignore_ascii_case("mic") {
            Self::Microphone
        } else {
            Self::File(value.to_string())
        }
    }
}

/// Result of capability negotiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Capability {
    Supported { host: String, device: String },
    Unsupported { reason: String },
}

impl Capability {
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported { .. })
    }

    /// Turn an unsupported capability into the error reported on start
    pub fn require(&self) -> Result<(), CaptureError> {
        match self {
            Self::Supported { .. } => Ok(()),
            Self::Unsupported { reason } => Err(CaptureError::Unsupported {
                reason: reason.clone(),
            }),
        }
    }
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Negotiate capture capability for a source. Runs once at startup.
    pub fn probe(source: &AudioSource) -> Capability {
        match source {
            AudioSource::Microphone => probe_microphone(),
            AudioSource::File(path) => {
                if Path::new(path).is_file() {
                    Capability::Supported {
                        host: "file".to_string(),
                        device: path.clone(),
                    }
                } else {
                    Capability::Unsupported {
                        reason: format!("audio file not found: {}", path),
                    }
                }
            }
        }
    }

    /// Create audio backend for a negotiated capability
    pub fn create(
        source: &AudioSource,
        capability: &Capability,
        config: AudioBackendConfig,
    ) -> Result<Box<dyn AudioBackend>, CaptureError> {
        match (source, capability) {
            (_, Capability::Unsupported { reason }) => Err(CaptureError::Unsupported {
                reason: reason.clone(),
            }),

            (AudioSource::Microphone, Capability::Supported { host, device }) => {
                let backend = super::microphone::MicrophoneBackend::new(
                    host.clone(),
                    device.clone(),
                    config,
                );
                Ok(Box::new(backend))
            }

            (AudioSource::File(path), Capability::Supported { .. }) => {
                let backend = super::file::FileBackend::new(path.clone(), config, true);
                Ok(Box::new(backend))
            }
        }
    }
}

/// Find an input device: the default host first, then every other host
fn probe_microphone() -> Capability {
    let host = cpal::default_host();
    if let Some(device) = host.default_input_device() {
        let capability = Capability::Supported {
            host: host.id().name().to_string(),
            device: device.name().unwrap_or_else(|_| "default".to_string()),
        };
        info!("Audio capture available: {:?}", capability);
        return capability;
    }

    debug!(
        "No default input device on {}, scanning other hosts",
        host.id().name()
    );

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(host) => host,
            Err(e) => {
                debug!("Host {} unavailable: {}", host_id.name(), e);
                continue;
            }
        };

        let device = host.default_input_device().or_else(|| {
            host.input_devices()
                .ok()
                .and_then(|mut devices| devices.next())
        });

        if let Some(device) = device {
            let capability = Capability::Supported {
                host: host_id.name().to_string(),
                device: device.name().unwrap_or_else(|_| "unknown".to_string()),
            };
            info!("Audio capture available via fallback host: {:?}", capability);
            return capability;
        }
    }

    warn!("No audio input device found on any host");
    Capability::Unsupported {
        reason: "no audio input device found on any audio host".to_string(),
    }
}
