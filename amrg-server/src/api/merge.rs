//! Merge endpoint
//!
//! POST /api/merge accepts a multipart form and answers with the merged MP3
//! as an attachment.
//!
//! Form fields:
//! - `files`: one part per audio file, in merge order
//! - `title`, `artist`, `album`, `year`: optional text
//! - `cover`: optional JPEG/PNG image
//! - `session_id`: optional UUID correlating `/merge/events` progress

use crate::error::{ApiError, ApiResult, MergeError};
use crate::pipeline::EventBusProgress;
use crate::types::{MergedOutput, TrackMetadata, UploadedFile};
use crate::AppState;
use amrg_common::events::MergeEvent;
use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    http::{header, StatusCode},
    response::Response,
    routing::post,
    Router,
};
use chrono::Utc;
use std::fmt::Write as _;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Response header carrying the merged duration in seconds
pub const MERGE_DURATION_HEADER: &str = "x-merge-duration";

/// Response header carrying the number of merged tracks
pub const MERGE_TRACKS_HEADER: &str = "x-merge-tracks";

/// Response header echoing the session id used for progress events
pub const MERGE_SESSION_HEADER: &str = "x-merge-session";

/// Parsed merge form
#[derive(Debug)]
struct MergeForm {
    files: Vec<UploadedFile>,
    metadata: TrackMetadata,
    session_id: Uuid,
}

/// POST /api/merge
///
/// Runs decode → concatenate → export → tag for the uploaded files. Only one
/// merge runs at a time; later requests wait on the merge gate.
pub async fn merge_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let form = match read_merge_form(&mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            error!("Rejected merge request: {}", e);
            state.record_error(e.to_string()).await;
            return Err(e);
        }
    };

    let MergeForm {
        files,
        metadata,
        session_id,
    } = form;

    if files.is_empty() {
        state.record_error(MergeError::NoInput.to_string()).await;
        return Err(MergeError::NoInput.into());
    }

    let file_count = files.len();
    info!(%session_id, file_count, "Merge request received");

    let _gate = state.merge_gate.lock().await;
    debug!(%session_id, "Merge gate acquired");

    state.event_bus.emit_lossy(MergeEvent::MergeStarted {
        session_id,
        file_count,
        timestamp: Utc::now(),
    });

    let pipeline = state.pipeline.clone();
    let progress = EventBusProgress::new(state.event_bus.clone(), session_id);
    let result = tokio::task::spawn_blocking(move || pipeline.run(files, metadata, &progress))
        .await
        .map_err(|e| ApiError::Internal(format!("Merge task failed: {}", e)));

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(merge_err)) => {
            error!(%session_id, "Merge failed: {}", merge_err);
            state.event_bus.emit_lossy(MergeEvent::MergeFailed {
                session_id,
                file_name: merge_err.file_name().map(str::to_string),
                message: merge_err.to_string(),
                timestamp: Utc::now(),
            });
            state.record_error(merge_err.to_string()).await;
            return Err(merge_err.into());
        }
        Err(api_err) => {
            error!(%session_id, "{}", api_err);
            state.event_bus.emit_lossy(MergeEvent::MergeFailed {
                session_id,
                file_name: None,
                message: api_err.to_string(),
                timestamp: Utc::now(),
            });
            state.record_error(api_err.to_string()).await;
            return Err(api_err);
        }
    };

    state.event_bus.emit_lossy(MergeEvent::MergeCompleted {
        session_id,
        file_name: output.file_name.clone(),
        bytes: output.bytes.len(),
        duration_seconds: output.duration_seconds,
        timestamp: Utc::now(),
    });

    download_response(output, session_id)
}

/// Build merge routes
pub fn merge_routes() -> Router<AppState> {
    Router::new().route("/api/merge", post(merge_files))
}

/// Read every form part, validating extensions as files arrive
async fn read_merge_form(multipart: &mut Multipart) -> ApiResult<MergeForm> {
    let mut files = Vec::new();
    let mut metadata = TrackMetadata::default();
    let mut session_id = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "files" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;

                // Browsers send one empty, unnamed part when no file is chosen
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }

                debug!(file_name = %file_name, bytes = bytes.len(), "Received upload");
                files.push(UploadedFile::new(file_name, bytes.to_vec())?);
            }
            "title" => metadata.title = Some(read_text(field).await?),
            "artist" => metadata.artist = Some(read_text(field).await?),
            "album" => metadata.album = Some(read_text(field).await?),
            "year" => metadata.year = Some(read_text(field).await?),
            "cover" => {
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if !bytes.is_empty() {
                    metadata.cover = Some(bytes.to_vec());
                }
            }
            "session_id" => {
                let text = read_text(field).await?;
                let text = text.trim();
                if !text.is_empty() {
                    let id = Uuid::parse_str(text).map_err(|e| {
                        ApiError::BadRequest(format!("Invalid session_id '{}': {}", text, e))
                    })?;
                    session_id = Some(id);
                }
            }
            other => debug!("Ignoring unknown form field '{}'", other),
        }
    }

    Ok(MergeForm {
        files,
        metadata,
        session_id: session_id.unwrap_or_else(Uuid::new_v4),
    })
}

async fn read_text(field: Field<'_>) -> ApiResult<String> {
    field.text().await.map_err(multipart_error)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(format!("Malformed multipart form: {}", err.body_text()))
    }
}

fn download_response(output: MergedOutput, session_id: Uuid) -> ApiResult<Response> {
    let MergedOutput {
        bytes,
        file_name,
        duration_seconds,
        tracks,
    } = output;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/mpeg")
        .header(header::CONTENT_DISPOSITION, content_disposition(&file_name))
        .header(MERGE_DURATION_HEADER, format!("{:.3}", duration_seconds))
        .header(MERGE_TRACKS_HEADER, tracks.len())
        .header(MERGE_SESSION_HEADER, session_id.to_string())
        .body(Body::from(bytes))
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {}", e)))
}

/// `attachment` disposition with an ASCII fallback name plus RFC 5987
/// `filename*` for non-ASCII titles
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' && !c.is_ascii_control() { c } else { '_' })
        .collect();

    if ascii == file_name {
        return format!("attachment; filename=\"{}\"", file_name);
    }

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{:02X}", byte);
        }
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii, encoded
    )
}
