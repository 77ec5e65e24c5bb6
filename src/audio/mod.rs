pub mod backend;
pub mod chunk;
pub mod file;
pub mod microphone;
pub mod resample;

pub use backend::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, Capability,
};
pub use chunk::{encode_wav, save_chunks, AudioChunk, ChunkConfig, ChunkMetadata, ChunkedRecorder};
pub use file::{AudioFile, FileBackend};
pub use microphone::MicrophoneBackend;
pub use resample::FrameConformer;
