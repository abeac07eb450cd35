//! In-memory decoded audio
//!
//! An [`AudioSegment`] holds interleaved `f32` samples in `[-1.0, 1.0]` plus
//! the frame rate and channel count they were produced at.

use super::resampler::{ResampleError, Resampler};
use tracing::debug;

/// Decoded audio buffer owned by one merge request
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioSegment {
    /// Wrap interleaved samples
    ///
    /// Trailing samples that do not form a whole frame are dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Zero-length segment; adopts the layout of whatever is appended to it
    pub fn empty() -> Self {
        Self {
            samples: Vec::new(),
            sample_rate: 0,
            channels: 1,
        }
    }

    /// `duration_seconds` of digital silence
    pub fn silent(duration_seconds: f64, sample_rate: u32, channels: u16) -> Self {
        let frames = (duration_seconds * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Convert to `sample_rate`, keeping duration
    pub fn resampled(self, sample_rate: u32) -> Result<Self, ResampleError> {
        if self.sample_rate == sample_rate || self.is_empty() {
            return Ok(Self {
                sample_rate,
                ..self
            });
        }
        let samples = Resampler::resample(&self.samples, self.sample_rate, sample_rate, self.channels)?;
        Ok(Self::new(samples, sample_rate, self.channels))
    }

    /// Widen to `channels` by repeating the last source channel
    ///
    /// Mono therefore becomes identical left/right. Narrowing is not done
    /// here; see [`AudioSegment::folded_to_stereo`].
    pub fn widened(self, channels: u16) -> Self {
        if channels <= self.channels {
            return self;
        }
        let src = self.channels as usize;
        let dst = channels as usize;
        let mut samples = Vec::with_capacity(self.frame_count() * dst);
        for frame in self.samples.chunks_exact(src) {
            samples.extend_from_slice(frame);
            let last = frame[src - 1];
            samples.extend(std::iter::repeat(last).take(dst - src));
        }
        Self {
            samples,
            sample_rate: self.sample_rate,
            channels,
        }
    }

    /// Fold more than two channels down to stereo
    ///
    /// Even-indexed channels are averaged into left, odd-indexed into right.
    /// Mono and stereo segments are returned unchanged.
    pub fn folded_to_stereo(self) -> Self {
        if self.channels <= 2 {
            return self;
        }
        let src = self.channels as usize;
        let left_count = src.div_ceil(2) as f32;
        let right_count = (src / 2) as f32;
        let mut samples = Vec::with_capacity(self.frame_count() * 2);
        for frame in self.samples.chunks_exact(src) {
            let (mut left, mut right) = (0.0f32, 0.0f32);
            for (idx, sample) in frame.iter().enumerate() {
                if idx % 2 == 0 {
                    left += sample;
                } else {
                    right += sample;
                }
            }
            samples.push(left / left_count);
            samples.push(right / right_count);
        }
        Self {
            samples,
            sample_rate: self.sample_rate,
            channels: 2,
        }
    }

    /// Concatenate `other` after `self`
    ///
    /// Both sides are first brought to a shared layout: the higher sample
    /// rate and the higher channel count of the two. An empty side takes the
    /// other's layout. No crossfade, gain change or trimming is applied.
    pub fn append(self, other: AudioSegment) -> Result<Self, ResampleError> {
        if self.is_empty() && self.sample_rate == 0 {
            return Ok(other);
        }
        if other.is_empty() && other.sample_rate == 0 {
            return Ok(self);
        }

        let sample_rate = self.sample_rate.max(other.sample_rate);
        let channels = self.channels.max(other.channels);

        if self.sample_rate != other.sample_rate || self.channels != other.channels {
            debug!(
                left_rate = self.sample_rate,
                right_rate = other.sample_rate,
                left_channels = self.channels,
                right_channels = other.channels,
                sample_rate,
                channels,
                "Syncing segment layouts before append"
            );
        }

        let mut head = self.resampled(sample_rate)?.widened(channels);
        let tail = other.resampled(sample_rate)?.widened(channels);
        head.samples.extend_from_slice(&tail.samples);
        Ok(head)
    }
}
