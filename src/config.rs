use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::{AudioBackendConfig, AudioSource, ChunkConfig};
use crate::relay::RelayMode;
use crate::session::SessionConfig;

/// Environment overrides, e.g. `MIC_RELAY_TRANSPORT__URL=nats://localhost:4222`
const ENV_PREFIX: &str = "MIC_RELAY";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub relay: RelayConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "mic-relay".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// `"microphone"` or a path to a WAV file
    pub source: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_interval_ms: u64,
    pub buffer_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source: "microphone".to_string(),
            sample_rate: 16000,
            channels: 1,
            chunk_interval_ms: 500,
            buffer_duration_ms: 100,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub mode: RelayMode,
    /// Identifier byte for framed mode; the server may assign one instead
    pub identifier: Option<u8>,
    /// Buffering mode writes its chunks here on stop
    pub save_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub url: String,
    /// Text sent once the WebSocket opens
    pub greeting: Option<String>,
    /// NATS subject prefix
    pub subject_prefix: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3012".to_string(),
            greeting: Some("Battle cruiser operational".to_string()),
            subject_prefix: "audio".to_string(),
        }
    }
}

impl Config {
    /// Load `<path>.toml` (optional) layered with `MIC_RELAY_*` variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn audio_source(&self) -> AudioSource {
        AudioSource::parse(&self.audio.source)
    }

    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            buffer_duration_ms: self.audio.buffer_duration_ms,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            chunk: ChunkConfig {
                chunk_interval_ms: self.audio.chunk_interval_ms,
            },
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            relay_mode: self.relay.mode,
            save_dir: self.relay.save_dir.as_ref().map(PathBuf::from),
        }
    }
}
