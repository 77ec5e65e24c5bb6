use base64::Engine;
use serde::{Deserialize, Serialize};

/// Event type carried by a full recorded segment
pub const AUDIO_RECORDING_EVENT: &str = "audioRecording";

/// Structured event sent as one text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingEvent {
    #[serde(rename = "type")]
    pub kind: String,
    /// Self-describing `data:<mime>;base64,<payload>` URL
    pub data: String,
}

impl RecordingEvent {
    pub fn audio_recording(mime_type: &str, audio: &[u8]) -> Self {
        Self {
            kind: AUDIO_RECORDING_EVENT.to_string(),
            data: to_data_url(mime_type, audio),
        }
    }
}

pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Split a base64 data URL into its mime type and decoded bytes
pub fn parse_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (mime_type, payload) = rest.split_once(";base64,")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .ok()?;
    Some((mime_type.to_string(), bytes))
}
