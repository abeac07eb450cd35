//! Merge pipeline: decode → concatenate → export → tag
//!
//! Runs synchronously, start to finish, for one request. Any stage failure
//! aborts the whole merge; no partial output is ever returned.

use crate::error::{MergeError, MergeResult};
use crate::pipeline::progress::{ProgressSink, ProgressUpdate};
use crate::pipeline::segment::AudioSegment;
use crate::pipeline::{decoder, encoder, tagger};
use crate::types::{download_file_name, MergedOutput, TrackBoundary, TrackMetadata, UploadedFile};
use amrg_common::config::CompiledDefaults;
use std::time::Instant;
use tracing::info;

/// Settings that shape pipeline output
#[derive(Debug, Clone)]
pub struct MergeSettings {
    /// Download name used when no usable title is given
    pub default_file_name: String,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            default_file_name: CompiledDefaults::DEFAULT_FILE_NAME.to_string(),
        }
    }
}

/// The merge pipeline
#[derive(Debug, Clone, Default)]
pub struct MergePipeline {
    settings: MergeSettings,
}

impl MergePipeline {
    pub fn new(settings: MergeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Merge `files` in the given order into one tagged MP3
    ///
    /// Progress is reported at stage boundaries: decode started, each file
    /// decoded, export completed, tagging completed.
    ///
    /// # Errors
    /// - [`MergeError::NoInput`] for an empty file list
    /// - [`MergeError::DecodeFailure`] naming the first file that fails
    /// - [`MergeError::ExportFailure`] if MP3 encoding fails
    /// - [`MergeError::TagWriteFailure`] for malformed metadata
    pub fn run(
        &self,
        files: Vec<UploadedFile>,
        metadata: TrackMetadata,
        progress: &dyn ProgressSink,
    ) -> MergeResult<MergedOutput> {
        if files.is_empty() {
            return Err(MergeError::NoInput);
        }

        let started = Instant::now();
        let metadata = metadata.normalized();
        let file_count = files.len();

        info!(file_count, "Starting audio file merging");
        progress.report(ProgressUpdate::DecodeStarted { file_count });

        let mut merged = AudioSegment::empty();
        let mut tracks = Vec::with_capacity(file_count);
        let mut offset_seconds = 0.0;

        for (index, upload) in files.into_iter().enumerate() {
            let file_name = upload.file_name().to_string();
            info!("Merging file {}/{}: {}", index + 1, file_count, file_name);

            let segment = decoder::decode_upload(upload)?;
            let duration_seconds = segment.duration_seconds();

            merged = merged
                .append(segment)
                .map_err(|e| MergeError::DecodeFailure {
                    file_name: file_name.clone(),
                    reason: e.to_string(),
                })?;

            tracks.push(TrackBoundary {
                index,
                file_name: file_name.clone(),
                start_seconds: offset_seconds,
                duration_seconds,
            });
            offset_seconds += duration_seconds;

            progress.report(ProgressUpdate::FileDecoded {
                index,
                file_count,
                file_name,
                duration_seconds,
            });
        }

        let duration_seconds = merged.duration_seconds();
        info!(
            duration_seconds = format!("{:.2}", duration_seconds),
            "Exporting merged audio as MP3"
        );

        let mp3 = encoder::export_mp3(merged)?;
        progress.report(ProgressUpdate::ExportCompleted { bytes: mp3.len() });

        let tagged = tagger::apply_tags(mp3, &metadata)?;
        progress.report(ProgressUpdate::TaggingCompleted {
            frames_written: tagged.frames_written,
        });

        let file_name = download_file_name(metadata.title.as_deref(), &self.settings.default_file_name);

        info!(
            file_name = %file_name,
            bytes = tagged.bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Merge complete"
        );

        Ok(MergedOutput {
            bytes: tagged.bytes,
            file_name,
            duration_seconds,
            tracks,
        })
    }
}
