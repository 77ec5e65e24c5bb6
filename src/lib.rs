pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod relay;
pub mod session;
pub mod transport;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioChunk, AudioFile, AudioFrame,
    AudioSource, Capability, ChunkConfig, ChunkMetadata, ChunkedRecorder,
};
pub use config::Config;
pub use error::CaptureError;
pub use http::{create_router, AppState};
pub use relay::{Relay, RelayMode, RecordingEvent};
pub use session::{
    BackendFactory, CaptureController, CaptureSession, CaptureState, ControlState,
    SessionConfig, SessionMonitor, SessionReport, SessionStats,
};
pub use transport::{IdentifierSlot, OutboundMessage, Transport};
