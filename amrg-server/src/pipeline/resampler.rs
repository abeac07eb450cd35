//! Audio resampling using rubato
//!
//! Converts interleaved audio between sample rates. Used when segments with
//! different rates are concatenated and when the export rate is not one LAME
//! can encode at 192 kbps.

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use thiserror::Error;
use tracing::debug;

/// Frames fed to rubato per call
const CHUNK_FRAMES: usize = 4096;

/// Resampler construction or processing failure
#[derive(Debug, Error)]
#[error("Resampling {from}Hz -> {to}Hz failed: {reason}")]
pub struct ResampleError {
    pub from: u32,
    pub to: u32,
    pub reason: String,
}

/// Audio resampler using rubato for sample rate conversion.
pub struct Resampler;

impl Resampler {
    /// Resample interleaved audio to `output_rate`.
    ///
    /// # Arguments
    /// - `input`: Interleaved audio samples
    /// - `input_rate`: Input sample rate
    /// - `output_rate`: Desired sample rate
    /// - `channels`: Number of interleaved channels
    ///
    /// # Returns
    /// Resampled interleaved audio with `round(frames * ratio)` frames.
    /// Same-rate or empty input is returned as a copy.
    pub fn resample(
        input: &[f32],
        input_rate: u32,
        output_rate: u32,
        channels: u16,
    ) -> Result<Vec<f32>, ResampleError> {
        if input_rate == output_rate || input.is_empty() || channels == 0 {
            return Ok(input.to_vec());
        }

        let err = |reason: String| ResampleError {
            from: input_rate,
            to: output_rate,
            reason,
        };

        let num_channels = channels as usize;
        let planar_input = Self::deinterleave(input, channels);
        let input_frames = planar_input[0].len();
        let ratio = output_rate as f64 / input_rate as f64;
        let expected_frames = (input_frames as f64 * ratio).round() as usize;

        debug!(
            input_rate,
            output_rate, channels, input_frames, "Resampling segment"
        );

        let mut resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // no runtime ratio changes
            PolynomialDegree::Septic,
            CHUNK_FRAMES,
            num_channels,
        )
        .map_err(|e| err(e.to_string()))?;

        let delay = resampler.output_delay();
        let mut planar_output: Vec<Vec<f32>> =
            vec![Vec::with_capacity(expected_frames + delay); num_channels];

        let mut pos = 0;
        while pos + CHUNK_FRAMES <= input_frames {
            let chunk: Vec<&[f32]> = planar_input
                .iter()
                .map(|ch| &ch[pos..pos + CHUNK_FRAMES])
                .collect();
            let out = resampler
                .process(&chunk, None)
                .map_err(|e| err(e.to_string()))?;
            Self::append_planar(&mut planar_output, out);
            pos += CHUNK_FRAMES;
        }

        if pos < input_frames {
            let chunk: Vec<&[f32]> = planar_input.iter().map(|ch| &ch[pos..]).collect();
            let out = resampler
                .process_partial(Some(chunk.as_slice()), None)
                .map_err(|e| err(e.to_string()))?;
            Self::append_planar(&mut planar_output, out);
        }

        // Flush the resampler's internal delay line
        while planar_output[0].len() < expected_frames + delay {
            let out = resampler
                .process_partial::<&[f32]>(None, None)
                .map_err(|e| err(e.to_string()))?;
            if out.first().map_or(true, |ch| ch.is_empty()) {
                break;
            }
            Self::append_planar(&mut planar_output, out);
        }

        for ch in planar_output.iter_mut() {
            let skip = delay.min(ch.len());
            ch.drain(..skip);
            ch.truncate(expected_frames);
        }

        let interleaved_output = Self::interleave(planar_output);

        debug!(
            input_frames,
            output_frames = interleaved_output.len() / num_channels,
            "Resampling complete"
        );

        Ok(interleaved_output)
    }

    fn append_planar(target: &mut [Vec<f32>], chunk: Vec<Vec<f32>>) {
        for (dst, src) in target.iter_mut().zip(chunk) {
            dst.extend_from_slice(&src);
        }
    }

    /// Convert interleaved samples to planar format.
    ///
    /// Input:  [L, R, L, R, L, R, ...]
    /// Output: [[L, L, L, ...], [R, R, R, ...]]
    fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
        let num_channels = channels as usize;
        let num_frames = samples.len() / num_channels;

        let mut planar = vec![Vec::with_capacity(num_frames); num_channels];

        for frame in samples.chunks_exact(num_channels) {
            for (ch_idx, sample) in frame.iter().enumerate() {
                planar[ch_idx].push(*sample);
            }
        }

        planar
    }

    /// Convert planar samples to interleaved format.
    ///
    /// Input:  [[L, L, L, ...], [R, R, R, ...]]
    /// Output: [L, R, L, R, L, R, ...]
    fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
        if planar.is_empty() {
            return Vec::new();
        }

        let num_channels = planar.len();
        let num_frames = planar.iter().map(Vec::len).min().unwrap_or(0);
        let mut interleaved = Vec::with_capacity(num_frames * num_channels);

        for frame_idx in 0..num_frames {
            for channel in &planar {
                interleaved.push(channel[frame_idx]);
            }
        }

        interleaved
    }
}
