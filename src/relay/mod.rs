//! Packaging of recorded chunks for the transport
//!
//! One `Relay` lives for one capture session. Each completed chunk goes through
//! `on_chunk`, and `finish` runs once when the session stops:
//! - `Framed`: identifier byte + PCM, sent per chunk
//! - `Raw`: PCM as-is, sent per chunk
//! - `Buffering`: chunks kept in order, nothing sent
//! - `FullSegment`: whole session encoded as a WAV data URL, one event on stop

mod event;

pub use event::{parse_data_url, to_data_url, RecordingEvent, AUDIO_RECORDING_EVENT};

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::audio::{encode_wav, AudioChunk};
use crate::error::CaptureError;
use crate::transport::{IdentifierSlot, OutboundMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayMode {
    #[default]
    Framed,
    Raw,
    Buffering,
    FullSegment,
}

impl RelayMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Framed => "framed",
            Self::Raw => "raw",
            Self::Buffering => "buffering",
            Self::FullSegment => "full_segment",
        }
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened to one chunk
#[derive(Debug)]
pub enum RelayAction {
    Send(OutboundMessage),
    Buffered,
    Accumulated,
    /// Framed mode without an identifier
    Dropped(CaptureError),
}

/// Result of finishing a session's relay
#[derive(Debug, Default)]
pub struct RelayOutcome {
    /// Full-segment event, emitted after the last chunk
    pub final_message: Option<OutboundMessage>,
    /// Buffering mode's ordered chunk sequence
    pub buffered: Vec<AudioChunk>,
}

/// Prefix a payload with its one-byte source identifier
pub fn frame_chunk(identifier: u8, payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 1);
    framed.push(identifier);
    framed.extend_from_slice(payload);
    framed
}

pub struct Relay {
    mode: RelayMode,
    identifier: IdentifierSlot,
    buffered: Vec<AudioChunk>,
    segment: Vec<i16>,
    /// Sample rate and channels of the recorded segment
    segment_format: (u32, u16),
}

impl Relay {
    /// `format` is the session's `(sample_rate, channels)`; a segment that
    /// never saw a chunk is still encoded in it.
    pub fn new(mode: RelayMode, identifier: IdentifierSlot, format: (u32, u16)) -> Self {
        Self {
            mode,
            identifier,
            buffered: Vec::new(),
            segment: Vec::new(),
            segment_format: format,
        }
    }

    pub fn mode(&self) -> RelayMode {
        self.mode
    }

    /// Chunk-ready handler
    pub fn on_chunk(&mut self, chunk: AudioChunk) -> RelayAction {
        match self.mode {
            RelayMode::Framed => match self.identifier.current() {
                Some(id) => RelayAction::Send(OutboundMessage::Binary(frame_chunk(
                    id,
                    &chunk.to_bytes(),
                ))),
                None => {
                    warn!(
                        "No identifier received from backend, not sending chunk {}",
                        chunk.index
                    );
                    RelayAction::Dropped(CaptureError::MissingIdentifier)
                }
            },
            RelayMode::Raw => RelayAction::Send(OutboundMessage::Binary(chunk.to_bytes())),
            RelayMode::Buffering => {
                debug!("Buffered chunk {}", chunk.index);
                self.buffered.push(chunk);
                RelayAction::Buffered
            }
            RelayMode::FullSegment => {
                if self.segment.is_empty() {
                    self.segment_format = (chunk.sample_rate, chunk.channels);
                }
                self.segment.extend_from_slice(&chunk.samples);
                RelayAction::Accumulated
            }
        }
    }

    /// Finalize the session. Full-segment encoding runs on the blocking pool.
    pub async fn finish(self) -> Result<RelayOutcome, CaptureError> {
        match self.mode {
            RelayMode::FullSegment => {
                let (sample_rate, channels) = self.segment_format;
                let samples = self.segment;

                let wav = tokio::task::spawn_blocking(move || {
                    encode_wav(&samples, sample_rate, channels)
                })
                .await
                .map_err(|e| CaptureError::Encode(e.to_string()))?
                .map_err(|e| CaptureError::Encode(format!("{:#}", e)))?;

                let event = RecordingEvent::audio_recording("audio/wav", &wav);
                let message = OutboundMessage::event(&event)
                    .map_err(|e| CaptureError::Encode(e.to_string()))?;

                Ok(RelayOutcome {
                    final_message: Some(message),
                    buffered: Vec::new(),
                })
            }
            RelayMode::Buffering => Ok(RelayOutcome {
                final_message: None,
                buffered: self.buffered,
            }),
            RelayMode::Framed | RelayMode::Raw => Ok(RelayOutcome::default()),
        }
    }
}
