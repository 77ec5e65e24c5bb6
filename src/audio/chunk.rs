use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::backend::AudioFrame;

/// Chunk configuration
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Time slice at which a completed chunk is emitted
    pub chunk_interval_ms: u64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_interval_ms: 500,
        }
    }
}

/// One completed slice of recorded audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Chunk number (0-indexed) within the session
    pub index: usize,
    /// Start time in milliseconds since capture started
    pub start_ms: u64,
    /// End time in milliseconds since capture started
    pub end_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved i16 PCM
    pub samples: Vec<i16>,
}

impl AudioChunk {
    /// Wire form: little-endian 16-bit PCM
    pub fn to_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Metadata for a chunk written to disk
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMetadata {
    /// Chunk number (0-indexed)
    pub chunk_index: usize,
    /// File path to the chunk
    pub file_path: PathBuf,
    pub start_ms: u64,
    pub end_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Number of samples in this chunk
    pub sample_count: usize,
}

/// Chunked audio recorder
///
/// Cuts a stream of frames into fixed-interval chunks. Boundaries are placed by
/// sample count, so a recording of D ms yields ceil(D / interval) chunks
/// once the trailing partial chunk is flushed.
pub struct ChunkedRecorder {
    config: ChunkConfig,
    pending: Vec<i16>,
    format: Option<(u32, u16)>,
    chunk_index: usize,
    /// Time covered by chunks of earlier formats
    offset_ms: u64,
    /// Frames emitted in the current format
    emitted_frames: u64,
}

impl ChunkedRecorder {
    pub fn new(config: ChunkConfig) -> Self {
        debug!(
            "Chunked recorder initialized ({}ms chunks)",
            config.chunk_interval_ms
        );

        Self {
            config,
            pending: Vec::new(),
            format: None,
            chunk_index: 0,
            offset_ms: 0,
            emitted_frames: 0,
        }
    }

    /// Feed one frame; returns every chunk it completed
    pub fn push(&mut self, frame: &AudioFrame) -> Vec<AudioChunk> {
        let mut ready = Vec::new();

        let format = (frame.sample_rate, frame.channels.max(1));
        match self.format {
            Some(current) if current != format => {
                warn!(
                    "Input format changed from {:?} to {:?}, closing chunk early",
                    current, format
                );
                ready.extend(self.finish());
                self.offset_ms = self.elapsed_ms();
                self.emitted_frames = 0;
                self.format = Some(format);
            }
            None => self.format = Some(format),
            _ => {}
        }

        let chunk_len = self.chunk_len(format);
        let mut remaining = frame.samples.as_slice();

        while !remaining.is_empty() {
            let take = (chunk_len - self.pending.len()).min(remaining.len());
            self.pending.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];

            if self.pending.len() >= chunk_len {
                ready.push(self.cut());
            }
        }

        ready
    }

    /// Flush the trailing partial chunk, if any
    pub fn finish(&mut self) -> Option<AudioChunk> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.cut())
    }

    /// Number of chunks emitted so far
    pub fn chunks_emitted(&self) -> usize {
        self.chunk_index
    }

    /// End of the last emitted chunk
    fn elapsed_ms(&self) -> u64 {
        let sample_rate = self.format.map_or(16000, |(rate, _)| rate).max(1);
        self.offset_ms + self.emitted_frames * 1000 / sample_rate as u64
    }

    fn chunk_len(&self, (sample_rate, channels): (u32, u16)) -> usize {
        let frames = (sample_rate as u64 * self.config.chunk_interval_ms / 1000).max(1);
        frames as usize * channels as usize
    }

    fn cut(&mut self) -> AudioChunk {
        let (sample_rate, channels) = self.format.unwrap_or((16000, 1));
        let samples = std::mem::take(&mut self.pending);
        let frames = (samples.len() / channels.max(1) as usize) as u64;

        let start_ms = self.offset_ms + self.emitted_frames * 1000 / sample_rate as u64;
        self.emitted_frames += frames;
        let end_ms = self.elapsed_ms();

        let chunk = AudioChunk {
            index: self.chunk_index,
            start_ms,
            end_ms,
            sample_rate,
            channels,
            samples,
        };
        self.chunk_index += 1;

        debug!(
            "Chunk {} ready: {}ms - {}ms ({} samples)",
            chunk.index,
            chunk.start_ms,
            chunk.end_ms,
            chunk.samples.len()
        );

        chunk
    }
}

fn wav_spec(sample_rate: u32, channels: u16) -> hound::WavSpec {
    hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Encode PCM samples as an in-memory WAV file
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(sample_rate, channels))
            .context("Failed to create WAV encoder")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }
    Ok(cursor.into_inner())
}

/// Write buffered chunks to `<output_dir>/<session_id>-chunk-NNN.wav`
pub fn save_chunks(
    chunks: &[AudioChunk],
    output_dir: &Path,
    session_id: &str,
) -> Result<Vec<ChunkMetadata>> {
    fs::create_dir_all(output_dir).context("Failed to create output directory")?;

    let metadata = chunks
        .iter()
        .map(|chunk| {
            let file_path =
                output_dir.join(format!("{}-chunk-{:03}.wav", session_id, chunk.index));
            write_chunk(&file_path, chunk)?;
            Ok(ChunkMetadata {
                chunk_index: chunk.index,
                file_path,
                start_ms: chunk.start_ms,
                end_ms: chunk.end_ms,
                sample_rate: chunk.sample_rate,
                channels: chunk.channels,
                sample_count: chunk.samples.len(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Saved {} buffered chunks to {}",
        metadata.len(),
        output_dir.display()
    );

    Ok(metadata)
}

fn write_chunk(file_path: &Path, chunk: &AudioChunk) -> Result<()> {
    let file = File::create(file_path)
        .with_context(|| format!("Failed to create WAV file: {:?}", file_path))?;
    let mut writer =
        hound::WavWriter::new(BufWriter::new(file), wav_spec(chunk.sample_rate, chunk.channels))
            .with_context(|| format!("Failed to create WAV file: {:?}", file_path))?;

    for &sample in &chunk.samples {
        writer
            .write_sample(sample)
            .context("Failed to write sample to WAV")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}
