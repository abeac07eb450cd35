//! Audio Test Fixture Generator
//!
//! Utilities for generating in-memory test audio with various characteristics

#![allow(dead_code)]

use amrg_server::pipeline::{encoder, AudioSegment};
use std::io::Cursor;

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency: f32,
    /// Peak level in `[0.0, 1.0]`; 0.0 yields digital silence
    pub amplitude: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 2.0,
            sample_rate: 44100,
            channels: 2,
            frequency: 440.0,
            amplitude: 0.3,
        }
    }
}

impl AudioConfig {
    pub fn seconds(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            ..Default::default()
        }
    }

    fn total_frames(&self) -> usize {
        (self.duration_seconds * self.sample_rate as f64) as usize
    }

    /// Tone sample for frame `i`
    fn sample(&self, i: usize) -> f32 {
        let t = i as f32 / self.sample_rate as f32;
        self.amplitude * (2.0 * std::f32::consts::PI * self.frequency * t).sin()
    }
}

/// Generate a 16-bit PCM WAV file in memory
pub fn generate_wav(config: &AudioConfig) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..config.total_frames() {
            let sample = (config.sample(i) * i16::MAX as f32) as i16;
            for _ in 0..config.channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Generate an untagged MP3 in memory using the export encoder
pub fn generate_mp3(config: &AudioConfig) -> Vec<u8> {
    let mut samples = Vec::with_capacity(config.total_frames() * config.channels as usize);
    for i in 0..config.total_frames() {
        let sample = config.sample(i);
        for _ in 0..config.channels {
            samples.push(sample);
        }
    }
    encoder::export_mp3(AudioSegment::new(samples, config.sample_rate, config.channels)).unwrap()
}

/// Bytes that no supported decoder accepts (no MPEG sync, no RIFF header)
pub fn garbage_audio() -> Vec<u8> {
    b"this is definitely not audio data; ".repeat(64)
}

/// Smallest byte prefix recognized as a PNG image
pub fn png_header() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D',
        b'R',
    ]
}

/// Bitrate (kbps) of the first MPEG-1 Layer III frame header in `bytes`
pub fn first_frame_bitrate(bytes: &[u8]) -> Option<u32> {
    const BITRATES: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
    let audio = skip_id3v2(bytes);
    audio.windows(4).find_map(|w| {
        let sync = w[0] == 0xFF && (w[1] & 0xE0) == 0xE0;
        let mpeg1_layer3 = (w[1] & 0x1E) == 0x1A;
        let index = (w[2] >> 4) as usize;
        (sync && mpeg1_layer3 && index > 0 && index < 15).then(|| BITRATES[index])
    })
}

/// Slice past a leading ID3v2 tag, if any
fn skip_id3v2(bytes: &[u8]) -> &[u8] {
    if bytes.len() < 10 || &bytes[..3] != b"ID3" {
        return bytes;
    }
    // Syncsafe size: 7 bits per byte
    let size = bytes[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b as usize & 0x7F));
    &bytes[(10 + size).min(bytes.len())..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_simple_wav() {
        let wav = generate_wav(&AudioConfig::seconds(0.5));
        assert_eq!(&wav[..4], b"RIFF");
        // 0.5 s stereo 16-bit at 44.1 kHz plus header
        assert!(wav.len() > 88_200);
    }

    #[test]
    fn test_skip_id3v2() {
        let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x02".to_vec();
        bytes.extend_from_slice(&[0, 0, 0xFF, 0xFB]);
        assert_eq!(skip_id3v2(&bytes), &[0xFF, 0xFB]);
    }
}
