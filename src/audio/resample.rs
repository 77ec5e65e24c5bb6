// Conversion of captured frames to the session's sample rate and channel count
//
// One `FrameConformer` lives for a whole session. The rubato resampler keeps
// its filter state between frames, so frame boundaries leave no edges. Input
// that does not fill a resampler block is held until the next frame or until
// `finish` pads it out.

use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use super::backend::AudioFrame;
use crate::error::CaptureError;

/// Input frames per resampler block
const RESAMPLER_CHUNK_SIZE: usize = 1024;
const RESAMPLER_SUB_CHUNKS: usize = 2;

pub struct FrameConformer {
    target_rate: u32,
    target_channels: u16,
    stream: Option<ResampleStream>,
    /// Output frames emitted so far, at the target rate
    frames_emitted: u64,
}

/// Resampler state for one source rate
struct ResampleStream {
    source_rate: u32,
    target_rate: u32,
    resampler: FftFixedIn<f32>,
    /// Deinterleaved input waiting for a full block
    pending: Vec<Vec<f32>>,
    /// Leading output frames that are filter delay
    delay_remaining: usize,
    frames_in: u64,
    frames_out: u64,
}

impl FrameConformer {
    pub fn new(target_rate: u32, target_channels: u16) -> Self {
        Self {
            target_rate: target_rate.max(1),
            target_channels: target_channels.max(1),
            stream: None,
            frames_emitted: 0,
        }
    }

    /// Convert one captured frame; `None` while the resampler is still filling
    pub fn push(&mut self, frame: AudioFrame) -> Result<Option<AudioFrame>, CaptureError> {
        let source_rate = frame.sample_rate.max(1);
        let channels = remix(&frame.samples, frame.channels.max(1), self.target_channels);

        let mut output = Vec::new();

        if self
            .stream
            .as_ref()
            .is_some_and(|stream| stream.source_rate != source_rate)
        {
            self.flush_into(&mut output)?;
        }

        if source_rate == self.target_rate {
            interleave_into(&channels, &mut output);
        } else {
            if self.stream.is_none() {
                self.stream = Some(ResampleStream::new(
                    source_rate,
                    self.target_rate,
                    self.target_channels,
                )?);
            }
            if let Some(stream) = self.stream.as_mut() {
                stream.process(channels, &mut output)?;
            }
        }

        Ok(self.emit(output))
    }

    /// Drain whatever the resampler still holds
    pub fn finish(&mut self) -> Result<Option<AudioFrame>, CaptureError> {
        let mut output = Vec::new();
        self.flush_into(&mut output)?;
        Ok(self.emit(output))
    }

    fn flush_into(&mut self, output: &mut Vec<i16>) -> Result<(), CaptureError> {
        if let Some(mut stream) = self.stream.take() {
            stream.flush(output)?;
        }
        Ok(())
    }

    fn emit(&mut self, samples: Vec<i16>) -> Option<AudioFrame> {
        if samples.is_empty() {
            return None;
        }

        let timestamp_ms = self.frames_emitted * 1000 / self.target_rate as u64;
        self.frames_emitted += (samples.len() / self.target_channels as usize) as u64;

        Some(AudioFrame {
            samples,
            sample_rate: self.target_rate,
            channels: self.target_channels,
            timestamp_ms,
        })
    }
}

impl ResampleStream {
    fn new(source_rate: u32, target_rate: u32, channels: u16) -> Result<Self, CaptureError> {
        let resampler = FftFixedIn::<f32>::new(
            source_rate as usize,
            target_rate as usize,
            RESAMPLER_CHUNK_SIZE,
            RESAMPLER_SUB_CHUNKS,
            channels as usize,
        )
        .map_err(|e| CaptureError::Resample(format!("resampler init failed: {}", e)))?;

        debug!("Resampling {}Hz -> {}Hz", source_rate, target_rate);

        Ok(Self {
            source_rate,
            target_rate,
            delay_remaining: resampler.output_delay(),
            resampler,
            pending: vec![Vec::new(); channels as usize],
            frames_in: 0,
            frames_out: 0,
        })
    }

    fn process(&mut self, input: Vec<Vec<f32>>, output: &mut Vec<i16>) -> Result<(), CaptureError> {
        self.frames_in += input.first().map_or(0, |ch| ch.len()) as u64;
        for (pending, samples) in self.pending.iter_mut().zip(input) {
            pending.extend(samples);
        }

        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending[0].len() < needed {
                return Ok(());
            }
            let block: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..needed).collect())
                .collect();
            self.run_block(&block, output, u64::MAX)?;
        }
    }

    /// Pad the tail with silence until every input frame has its output
    fn flush(&mut self, output: &mut Vec<i16>) -> Result<(), CaptureError> {
        let expected =
            (self.frames_in * self.target_rate as u64).div_ceil(self.source_rate as u64);

        while self.frames_out < expected {
            let needed = self.resampler.input_frames_next();
            let block: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| {
                    let mut block: Vec<f32> = std::mem::take(ch);
                    block.resize(needed, 0.0);
                    block
                })
                .collect();
            self.run_block(&block, output, expected)?;
        }

        Ok(())
    }

    fn run_block(
        &mut self,
        block: &[Vec<f32>],
        output: &mut Vec<i16>,
        limit: u64,
    ) -> Result<(), CaptureError> {
        let resampled = self
            .resampler
            .process(block, None)
            .map_err(|e| CaptureError::Resample(format!("resampling failed: {}", e)))?;

        let produced = resampled.first().map_or(0, |ch| ch.len());
        let skip = self.delay_remaining.min(produced);
        self.delay_remaining -= skip;

        let available = (produced - skip) as u64;
        let take = available.min(limit.saturating_sub(self.frames_out)) as usize;

        for i in skip..skip + take {
            for channel in &resampled {
                output.push(to_i16(channel[i]));
            }
        }
        self.frames_out += take as u64;

        Ok(())
    }
}

/// Map interleaved input onto `target` deinterleaved channels.
/// Mono targets average every channel; otherwise channels are kept by
/// position and missing ones copy the first.
fn remix(samples: &[i16], channels: u16, target: u16) -> Vec<Vec<f32>> {
    let channels = channels as usize;
    let target = target as usize;
    let frames = samples.len() / channels;
    let mut out = vec![Vec::with_capacity(frames); target];

    for frame in samples.chunks_exact(channels) {
        if target == 1 {
            let sum: f32 = frame.iter().map(|&s| to_f32(s)).sum();
            out[0].push(sum / channels as f32);
        } else {
            for (c, channel) in out.iter_mut().enumerate() {
                let source = if c < channels { c } else { 0 };
                channel.push(to_f32(frame[source]));
            }
        }
    }

    out
}

fn interleave_into(channels: &[Vec<f32>], output: &mut Vec<i16>) {
    let frames = channels.first().map_or(0, |ch| ch.len());
    output.reserve(frames * channels.len());
    for i in 0..frames {
        for channel in channels {
            output.push(to_i16(channel[i]));
        }
    }
}

fn to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>, sample_rate: u32, channels: u16) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate,
            channels,
            timestamp_ms: 0,
        }
    }

    /// Feed `seconds` of a 440Hz tone in `frame_ms` frames, return all output
    fn conform_tone(source_rate: u32, seconds: f64, frame_ms: u64) -> Vec<AudioFrame> {
        let total = (source_rate as f64 * seconds) as usize;
        let tone: Vec<i16> = (0..total)
            .map(|i| {
                let t = i as f64 / source_rate as f64;
                ((t * 440.0 * std::f64::consts::TAU).sin() * 8000.0) as i16
            })
            .collect();

        let frame_len = (source_rate as u64 * frame_ms / 1000) as usize;
        let mut conformer = FrameConformer::new(16000, 1);
        let mut out = Vec::new();
        for samples in tone.chunks(frame_len) {
            out.extend(conformer.push(frame(samples.to_vec(), source_rate, 1)).unwrap());
        }
        out.extend(conformer.finish().unwrap());
        out
    }

    #[test]
    fn conforms_44100_to_16k() {
        let frames = conform_tone(44100, 1.0, 10);

        assert!(frames.iter().all(|f| f.sample_rate == 16000 && f.channels == 1));
        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        assert_eq!(total, 16000);
    }

    #[test]
    fn conforms_22050_to_16k() {
        let frames = conform_tone(22050, 2.0, 100);

        assert!(frames.iter().all(|f| f.sample_rate == 16000));
        let total: usize = frames.iter().map(|f| f.samples.len()).sum();
        assert_eq!(total, 32000);
    }

    #[test]
    fn resampled_tone_keeps_its_level() {
        let frames = conform_tone(48000, 1.0, 20);
        let samples: Vec<i16> = frames.into_iter().flat_map(|f| f.samples).collect();

        // Skip the filter's ramp at both ends
        let body = &samples[1000..15000];
        let peak = body.iter().map(|s| s.unsigned_abs()).max().unwrap();
        assert!((7000..=9000).contains(&peak), "peak {}", peak);
    }

    #[test]
    fn timestamps_follow_output_samples() {
        let frames = conform_tone(44100, 1.0, 100);
        let mut expected_ms = 0;
        let mut emitted = 0u64;
        for f in &frames {
            assert_eq!(f.timestamp_ms, expected_ms);
            emitted += f.samples.len() as u64;
            expected_ms = emitted * 1000 / 16000;
        }
    }

    #[test]
    fn matching_rate_passes_through() {
        let mut conformer = FrameConformer::new(16000, 1);
        let out = conformer
            .push(frame(vec![7, 8, 9], 16000, 1))
            .unwrap()
            .unwrap();
        assert_eq!(out.samples, vec![7, 8, 9]);
        assert!(conformer.finish().unwrap().is_none());
    }

    #[test]
    fn stereo_is_mixed_to_mono() {
        let mut conformer = FrameConformer::new(16000, 1);
        let out = conformer
            .push(frame(vec![100, 200, 300, 400], 16000, 2))
            .unwrap()
            .unwrap();
        assert_eq!(out.channels, 1);
        assert_eq!(out.samples, vec![150, 350]);
    }

    #[test]
    fn mono_is_copied_to_stereo() {
        let mut conformer = FrameConformer::new(16000, 2);
        let out = conformer
            .push(frame(vec![10, -20], 16000, 1))
            .unwrap()
            .unwrap();
        assert_eq!(out.channels, 2);
        assert_eq!(out.samples, vec![10, 10, -20, -20]);
    }

    #[test]
    fn rate_change_flushes_previous_stream() {
        let mut conformer = FrameConformer::new(16000, 1);
        let mut total = 0;

        // 100ms at 48kHz, then 100ms at 16kHz
        total += conformer
            .push(frame(vec![0; 4800], 48000, 1))
            .unwrap()
            .map_or(0, |f| f.samples.len());
        total += conformer
            .push(frame(vec![0; 1600], 16000, 1))
            .unwrap()
            .map_or(0, |f| f.samples.len());
        assert!(conformer.finish().unwrap().is_none());

        assert_eq!(total, 3200);
    }
}
