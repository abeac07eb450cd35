//! MP3 export using LAME
//!
//! Encodes a concatenated [`AudioSegment`] to 192 kbps constant-bitrate
//! MPEG-1 Layer III. The bitrate is fixed.
//!
//! ## Layout normalization
//!
//! ```text
//! segment --> fold >2 channels to stereo --> widen mono to stereo
//!         --> resample to 44.1kHz unless rate is 32/44.1/48kHz --> LAME
//! ```
//!
//! 192 kbps only exists in MPEG-1, which LAME only emits for 32, 44.1 and
//! 48 kHz output, hence the resampling step.
//!
//! The first frame of the stream is LAME's Info frame. It is reserved when
//! encoding starts and filled in after the flush, carrying the encoder delay
//! and padding decoders need to trim the stream to its exact length.

use crate::error::{MergeError, MergeResult};
use crate::pipeline::segment::AudioSegment;
use mp3lame_encoder::{
    max_required_buffer_size, Bitrate, Builder, Encoder, FlushNoGap, InterleavedPcm, Quality,
};
use std::num::NonZeroUsize;
use tracing::debug;

/// Fixed export bitrate
pub const EXPORT_BITRATE_KBPS: u32 = 192;

/// Encoder output channel count
const CHANNELS: u16 = 2;

/// Rate used when the source rate has no MPEG-1 equivalent
const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// Sample rates MPEG-1 Layer III supports
const MPEG1_SAMPLE_RATES: [u32; 3] = [32_000, 44_100, 48_000];

/// Stereo frames handed to LAME per call
const ENCODE_CHUNK_FRAMES: usize = 1152 * 64;

/// Sample rate the export will use for a source at `source_rate`
pub fn export_sample_rate(source_rate: u32) -> u32 {
    if MPEG1_SAMPLE_RATES.contains(&source_rate) {
        source_rate
    } else {
        FALLBACK_SAMPLE_RATE
    }
}

/// Encode a segment to MP3 bytes
///
/// Consumes the segment so that decoded PCM is released as soon as encoding
/// finishes.
///
/// # Errors
/// [`MergeError::ExportFailure`] when LAME cannot be configured, rejects the
/// input, or resampling for export fails.
pub fn export_mp3(segment: AudioSegment) -> MergeResult<Vec<u8>> {
    let target_rate = export_sample_rate(segment.sample_rate());
    let segment = segment
        .folded_to_stereo()
        .widened(CHANNELS)
        .resampled(target_rate)
        .map_err(|e| MergeError::ExportFailure(e.to_string()))?;

    debug!(
        sample_rate = target_rate,
        frames = segment.frame_count(),
        bitrate_kbps = EXPORT_BITRATE_KBPS,
        "Exporting MP3"
    );

    let mut lame = create_encoder(target_rate)?;

    let samples: Vec<f32> = segment
        .into_samples()
        .into_iter()
        .map(|s| s.clamp(-1.0, 1.0))
        .collect();

    let frames = samples.len() / CHANNELS as usize;
    let mut mp3 = Vec::with_capacity(
        estimated_mp3_len(frames, target_rate) + max_required_buffer_size(ENCODE_CHUNK_FRAMES),
    );

    for chunk in samples.chunks(ENCODE_CHUNK_FRAMES * CHANNELS as usize) {
        mp3.reserve(max_required_buffer_size(chunk.len() / CHANNELS as usize));
        lame.encode_to_vec(InterleavedPcm(chunk), &mut mp3)
            .map_err(|e| MergeError::ExportFailure(format!("LAME encoding error: {:?}", e)))?;
    }

    mp3.reserve(max_required_buffer_size(0));
    lame.flush_to_vec::<FlushNoGap>(&mut mp3)
        .map_err(|e| MergeError::ExportFailure(format!("LAME flush error: {:?}", e)))?;

    write_lame_tag(&lame, &mut mp3)?;

    debug!(bytes = mp3.len(), capacity = mp3.capacity(), "MP3 export complete");
    Ok(mp3)
}

/// Upper bound on the encoded size of `frames` stereo frames at `sample_rate`
///
/// Constant bitrate makes the stream length proportional to duration. One
/// maximum-size frame of headroom covers the Info frame and the encoder
/// delay.
pub fn estimated_mp3_len(frames: usize, sample_rate: u32) -> usize {
    if sample_rate == 0 {
        return max_required_buffer_size(0);
    }
    let seconds = frames as f64 / sample_rate as f64;
    let bytes_per_second = (EXPORT_BITRATE_KBPS * 1000 / 8) as f64;
    (seconds * bytes_per_second).ceil() as usize + max_required_buffer_size(0)
}

/// Overwrite the reserved first frame with the finished LAME/Info tag
fn write_lame_tag(lame: &Encoder, mp3: &mut [u8]) -> MergeResult<()> {
    let tag_size = lame.lame_tag_size();
    if tag_size == 0 {
        return Ok(());
    }

    let mut tag = Vec::with_capacity(tag_size);
    let written = lame
        .lame_tag_encode_to_vec(&mut tag)
        .map(NonZeroUsize::get)
        .ok_or_else(|| MergeError::ExportFailure("LAME tag could not be generated".to_string()))?;

    let stream_len = mp3.len();
    let frame = mp3.get_mut(..written).ok_or_else(|| {
        MergeError::ExportFailure(format!(
            "LAME tag ({} bytes) larger than encoded stream ({} bytes)",
            written, stream_len
        ))
    })?;
    frame.copy_from_slice(&tag[..written]);

    debug!(tag_bytes = written, "LAME tag written");
    Ok(())
}

/// Creates and configures a LAME encoder for 192 kbps CBR stereo.
fn create_encoder(sample_rate: u32) -> MergeResult<Encoder> {
    let build_err = |stage: &str, e: mp3lame_encoder::BuildError| {
        MergeError::ExportFailure(format!("LAME {}: {:?}", stage, e))
    };

    let mut builder = Builder::new()
        .ok_or_else(|| MergeError::ExportFailure("Failed to create LAME encoder builder".to_string()))?;
    builder
        .set_num_channels(CHANNELS as u8)
        .map_err(|e| build_err("set channel count", e))?;
    builder
        .set_sample_rate(sample_rate)
        .map_err(|e| build_err("set sample rate", e))?;
    builder
        .set_brate(Bitrate::Kbps192)
        .map_err(|e| build_err("set bitrate", e))?;
    builder
        .set_quality(Quality::NearBest)
        .map_err(|e| build_err("set quality", e))?;
    builder
        .set_to_write_vbr_tag(true)
        .map_err(|e| build_err("enable LAME tag", e))?;

    builder.build().map_err(|e| build_err("build", e))
}
