//! Stage-boundary progress reporting
//!
//! The pipeline reports coarse updates through a [`ProgressSink`]; the HTTP
//! layer forwards them onto the [`EventBus`] for SSE clients.

use amrg_common::events::{EventBus, MergeEvent};
use chrono::Utc;
use uuid::Uuid;

/// Share of the bar covered by decoding
const DECODE_SHARE: f32 = 0.6;
const EXPORT_DONE: f32 = 0.85;
const TAGGING_DONE: f32 = 0.95;

/// One stage-boundary update
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    DecodeStarted {
        file_count: usize,
    },
    FileDecoded {
        index: usize,
        file_count: usize,
        file_name: String,
        duration_seconds: f64,
    },
    ExportCompleted {
        bytes: usize,
    },
    TaggingCompleted {
        frames_written: usize,
    },
}

impl ProgressUpdate {
    /// Overall completion fraction in `[0.0, 1.0]`
    pub fn fraction(&self) -> f32 {
        match self {
            ProgressUpdate::DecodeStarted { .. } => 0.0,
            ProgressUpdate::FileDecoded {
                index, file_count, ..
            } => DECODE_SHARE * (*index + 1) as f32 / (*file_count).max(1) as f32,
            ProgressUpdate::ExportCompleted { .. } => EXPORT_DONE,
            ProgressUpdate::TaggingCompleted { .. } => TAGGING_DONE,
        }
    }
}

/// Receiver of pipeline progress
///
/// Called synchronously from the pipeline thread; implementations must not
/// block for long.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Sink that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Sink that publishes updates as [`MergeEvent`]s for one session
#[derive(Debug, Clone)]
pub struct EventBusProgress {
    bus: EventBus,
    session_id: Uuid,
}

impl EventBusProgress {
    pub fn new(bus: EventBus, session_id: Uuid) -> Self {
        Self { bus, session_id }
    }
}

impl ProgressSink for EventBusProgress {
    fn report(&self, update: ProgressUpdate) {
        let progress = update.fraction();
        let session_id = self.session_id;
        let timestamp = Utc::now();

        let event = match update {
            ProgressUpdate::DecodeStarted { file_count } => MergeEvent::DecodeStarted {
                session_id,
                file_count,
                progress,
                timestamp,
            },
            ProgressUpdate::FileDecoded {
                index,
                file_name,
                duration_seconds,
                ..
            } => MergeEvent::FileDecoded {
                session_id,
                index,
                file_name,
                duration_seconds,
                progress,
                timestamp,
            },
            ProgressUpdate::ExportCompleted { bytes } => MergeEvent::ExportCompleted {
                session_id,
                bytes,
                progress,
                timestamp,
            },
            ProgressUpdate::TaggingCompleted { frames_written } => MergeEvent::TaggingCompleted {
                session_id,
                frames_written,
                progress,
                timestamp,
            },
        };

        self.bus.emit_lossy(event);
    }
}
