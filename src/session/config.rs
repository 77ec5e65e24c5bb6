use serde::Serialize;
use std::path::PathBuf;

use crate::audio::ChunkConfig;
use crate::relay::RelayMode;

/// Configuration for a capture session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Chunk interval for the recorder
    pub chunk: ChunkConfig,

    /// Sample rate frames are brought to before chunking
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// How chunks are packaged for the transport
    pub relay_mode: RelayMode,

    /// Where buffering mode writes its chunks on stop
    pub save_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            sample_rate: 16000,
            channels: 1,
            relay_mode: RelayMode::default(),
            save_dir: None,
        }
    }
}

/// Summary of a session's settings, reported with its stats
#[derive(Debug, Clone, Serialize)]
pub struct SessionSettings {
    pub relay_mode: RelayMode,
    pub chunk_interval_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            relay_mode: config.relay_mode,
            chunk_interval_ms: config.chunk.chunk_interval_ms,
            sample_rate: config.sample_rate,
            channels: config.channels,
        }
    }
}
