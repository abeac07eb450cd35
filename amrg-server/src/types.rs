//! Request and response data model for the merge pipeline

use crate::error::{MergeError, MergeResult};
use std::fmt;
use std::path::Path;

/// Audio container/codec declared by an upload's file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
    Flac,
    Aac,
    M4a,
}

impl AudioFormat {
    /// All accepted formats, in the order shown to users
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Mp3,
        AudioFormat::Wav,
        AudioFormat::Ogg,
        AudioFormat::Flac,
        AudioFormat::Aac,
        AudioFormat::M4a,
    ];

    /// Match an extension (without the dot), case-insensitively
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "ogg" => Some(AudioFormat::Ogg),
            "flac" => Some(AudioFormat::Flac),
            "aac" => Some(AudioFormat::Aac),
            "m4a" => Some(AudioFormat::M4a),
            _ => None,
        }
    }

    /// Canonical lowercase extension, used as the symphonia format hint
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
            AudioFormat::Aac => "aac",
            AudioFormat::M4a => "m4a",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// One uploaded audio file, exactly as received
///
/// The declared extension is trusted; content is not sniffed.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    file_name: String,
    format: AudioFormat,
    bytes: Vec<u8>,
}

impl UploadedFile {
    /// Accept an upload, resolving its format from the file name extension
    ///
    /// # Errors
    /// [`MergeError::UnsupportedFormat`] when the extension is missing or not
    /// one of the accepted formats.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> MergeResult<Self> {
        let file_name = file_name.into();
        let extension = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();

        let format = AudioFormat::from_extension(&extension).ok_or_else(|| {
            MergeError::UnsupportedFormat {
                file_name: file_name.clone(),
                extension,
            }
        })?;

        Ok(Self {
            file_name,
            format,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Give up ownership of the raw bytes (consumed by the decoder)
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Optional metadata written as ID3 frames onto the merged file
///
/// Empty or whitespace-only strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<String>,
    pub cover: Option<Vec<u8>>,
}

impl TrackMetadata {
    /// Drop blank strings and empty images
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            title: clean(self.title),
            artist: clean(self.artist),
            album: clean(self.album),
            year: clean(self.year),
            cover: self.cover.filter(|c| !c.is_empty()),
        }
    }

    /// True when at least one field would produce an ID3 frame
    pub fn has_any(&self) -> bool {
        self.title.is_some()
            || self.artist.is_some()
            || self.album.is_some()
            || self.year.is_some()
            || self.cover.is_some()
    }
}

/// Position of one input file inside the merged output
#[derive(Debug, Clone, PartialEq)]
pub struct TrackBoundary {
    /// 0-based upload position
    pub index: usize,
    pub file_name: String,
    /// Cumulative offset of this track's first sample
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

/// Final result of one merge request
#[derive(Debug, Clone)]
pub struct MergedOutput {
    /// Tagged MP3 bytes
    pub bytes: Vec<u8>,
    /// Suggested download name
    pub file_name: String,
    /// Length of the concatenated audio before encoding
    pub duration_seconds: f64,
    /// One entry per input, in upload order
    pub tracks: Vec<TrackBoundary>,
}

/// Derive the download file name from a title
///
/// Keeps alphanumerics, space, `-` and `_`; falls back to `default_name`
/// when nothing usable remains.
pub fn download_file_name(title: Option<&str>, default_name: &str) -> String {
    let safe_title: String = title
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let safe_title = safe_title.trim();

    if safe_title.is_empty() {
        default_name.to_string()
    } else {
        format!("{}.mp3", safe_title)
    }
}
