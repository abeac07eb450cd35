//! Audio decoding using symphonia
//!
//! Decodes one uploaded file (MP3, WAV, OGG/Vorbis, FLAC, AAC, M4A) from
//! memory into an interleaved f32 [`AudioSegment`].

use crate::error::{MergeError, MergeResult};
use crate::pipeline::segment::AudioSegment;
use crate::types::UploadedFile;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode one upload, consuming its bytes
///
/// **Algorithm:**
/// 1. Detect the container of the in-memory stream, hinted by the declared extension
/// 2. Pick the first track with a real codec
/// 3. Decode every packet to interleaved f32
/// 4. Skip individually corrupt packets, fail on anything else
///
/// # Errors
/// [`MergeError::DecodeFailure`] naming the file when the container cannot
/// be recognized, no codec exists for the track, the stream breaks, or nothing
/// decodes at all.
pub fn decode_upload(upload: UploadedFile) -> MergeResult<AudioSegment> {
    let file_name = upload.file_name().to_string();
    let format_hint = upload.format();
    let failure = |reason: String| MergeError::DecodeFailure {
        file_name: file_name.clone(),
        reason,
    };

    debug!(file = %file_name, format = %format_hint, bytes = upload.bytes().len(), "Decoding upload");

    let mss = MediaSourceStream::new(Box::new(Cursor::new(upload.into_bytes())), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format_hint.extension());

    let format_opts = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &MetadataOptions::default())
        .map_err(|e| failure(format!("unrecognized or corrupt {} data ({})", format_hint, e)))?;

    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| failure("no audio track found".to_string()))?;

    let track_id = track.id;
    let declared_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| failure(format!("no decoder available ({})", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut layout: Option<(u32, u16)> = None;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                // Chained stream with new parameters; keep what decoded so far
                warn!(file = %file_name, "Stream reset requested, stopping at first logical stream");
                break;
            }
            Err(e) => return Err(failure(format!("error reading packet ({})", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                skipped_packets += 1;
                warn!(file = %file_name, "Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(failure(format!("decoder error ({})", e))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count() as u16;
        match layout {
            None => layout = Some((declared_rate.unwrap_or(spec.rate), channels)),
            Some((_, known)) if known != channels => {
                return Err(failure(format!(
                    "channel count changed mid-stream ({} -> {})",
                    known, channels
                )));
            }
            Some(_) => {}
        }

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    let (sample_rate, channels) = layout.ok_or_else(|| failure("no audio frames decoded".to_string()))?;
    if samples.is_empty() || sample_rate == 0 {
        return Err(failure("no audio frames decoded".to_string()));
    }

    let segment = AudioSegment::new(samples, sample_rate, channels);

    debug!(
        file = %file_name,
        sample_rate,
        channels,
        frames = segment.frame_count(),
        skipped_packets,
        duration_seconds = format!("{:.2}", segment.duration_seconds()),
        "Decoding complete"
    );

    Ok(segment)
}
