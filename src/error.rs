use thiserror::Error;

use crate::session::CaptureState;

/// Errors surfaced by the capture component
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No recording capability on this platform
    #[error("Audio capture is not supported: {reason}")]
    Unsupported { reason: String },

    /// The platform refused access to the input device
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    /// The input device exists but could not be opened or started
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A chunk was produced but no routing identifier was known
    #[error("No identifier available, chunk dropped")]
    MissingIdentifier,

    #[error("Cannot {action} while {state}")]
    InvalidState {
        state: CaptureState,
        action: &'static str,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to encode audio: {0}")]
    Encode(String),

    #[error("Failed to resample audio: {0}")]
    Resample(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Whether the error should be shown to the user, not just logged
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Unsupported { .. } | Self::PermissionDenied(_) | Self::DeviceUnavailable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquisition_errors_are_user_facing() {
        assert!(CaptureError::Unsupported {
            reason: "no input device".into()
        }
        .is_user_facing());
        assert!(CaptureError::PermissionDenied("denied".into()).is_user_facing());
        assert!(CaptureError::DeviceUnavailable("busy".into()).is_user_facing());
        assert!(!CaptureError::MissingIdentifier.is_user_facing());
    }

    #[test]
    fn invalid_state_message_names_action() {
        let err = CaptureError::InvalidState {
            state: CaptureState::Recording,
            action: "start recording",
        };
        assert_eq!(err.to_string(), "Cannot start recording while recording");
    }
}
