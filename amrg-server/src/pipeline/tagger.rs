//! ID3v2 tag writing
//!
//! Frames written, only for fields that are present:
//! - TIT2 title
//! - TPE1 artist
//! - TALB album
//! - TDRC year (must parse as an ID3 timestamp)
//! - APIC front cover, description "Cover", MIME sniffed from the bytes

use crate::error::{MergeError, MergeResult};
use crate::types::TrackMetadata;
use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Timestamp, Version};
use tracing::debug;

/// Description stored on the embedded cover picture
pub const COVER_DESCRIPTION: &str = "Cover";

/// Image types accepted as cover art
const COVER_MIME_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

/// Result of a tagging pass
#[derive(Debug)]
pub struct TaggedAudio {
    pub bytes: Vec<u8>,
    pub frames_written: usize,
}

/// Build the ID3 tag for `metadata`, or `None` when no field is present
///
/// # Errors
/// [`MergeError::TagWriteFailure`] for an unparseable year or a cover that
/// is not a JPEG or PNG image.
pub fn build_tag(metadata: &TrackMetadata) -> MergeResult<Option<Tag>> {
    if !metadata.has_any() {
        return Ok(None);
    }

    let mut tag = Tag::new();

    if let Some(title) = &metadata.title {
        tag.set_title(title.as_str());
    }
    if let Some(artist) = &metadata.artist {
        tag.set_artist(artist.as_str());
    }
    if let Some(album) = &metadata.album {
        tag.set_album(album.as_str());
    }
    if let Some(year) = &metadata.year {
        let timestamp: Timestamp = year.parse().map_err(|_| {
            MergeError::TagWriteFailure(format!(
                "year '{}' is not a valid date (expected YYYY or YYYY-MM-DD)",
                year
            ))
        })?;
        tag.set_date_recorded(timestamp);
    }
    if let Some(cover) = &metadata.cover {
        let mime_type = cover_mime_type(cover)?;
        tag.add_frame(Picture {
            mime_type: mime_type.to_string(),
            picture_type: PictureType::CoverFront,
            description: COVER_DESCRIPTION.to_string(),
            data: cover.clone(),
        });
    }

    Ok(Some(tag))
}

/// Prepend an ID3v2.4 tag built from `metadata` to the exported MP3
///
/// The export stage never writes a tag of its own, so the tag is simply
/// placed in front of the first audio frame. With no metadata the bytes are
/// returned untouched.
pub fn apply_tags(mp3: Vec<u8>, metadata: &TrackMetadata) -> MergeResult<TaggedAudio> {
    let Some(tag) = build_tag(metadata)? else {
        debug!("No metadata supplied, leaving output untagged");
        return Ok(TaggedAudio {
            bytes: mp3,
            frames_written: 0,
        });
    };

    let frames_written = tag.frames().count();
    let mut bytes = Vec::with_capacity(mp3.len() + metadata.cover.as_ref().map_or(0, Vec::len) + 1024);
    tag.write_to(&mut bytes, Version::Id3v24)
        .map_err(|e| MergeError::TagWriteFailure(e.to_string()))?;
    let tag_len = bytes.len();
    bytes.extend_from_slice(&mp3);

    debug!(frames_written, tag_bytes = tag_len, "ID3 tag written");

    Ok(TaggedAudio {
        bytes,
        frames_written,
    })
}

/// Sniff the MIME type of a cover image
fn cover_mime_type(data: &[u8]) -> MergeResult<&'static str> {
    match infer::get(data).map(|kind| kind.mime_type()) {
        Some(mime) if COVER_MIME_TYPES.contains(&mime) => Ok(mime),
        Some(other) => Err(MergeError::TagWriteFailure(format!(
            "cover image must be JPEG or PNG, got {}",
            other
        ))),
        None => Err(MergeError::TagWriteFailure(
            "cover image format not recognized (expected JPEG or PNG)".to_string(),
        )),
    }
}
