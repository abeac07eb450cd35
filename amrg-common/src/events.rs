//! Merge progress events and the EventBus
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE transmission.
//! Every event carries the `session_id` of the merge request it belongs to so
//! a browser tab can follow its own merge only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Merge progress events
///
/// Emitted at stage boundaries only. `progress` is the overall completion
/// fraction in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MergeEvent {
    /// A merge request holds the merge gate and is about to run
    MergeStarted {
        session_id: Uuid,
        file_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Decoding of the uploaded files has begun
    DecodeStarted {
        session_id: Uuid,
        file_count: usize,
        progress: f32,
        timestamp: DateTime<Utc>,
    },

    /// One uploaded file finished decoding
    FileDecoded {
        session_id: Uuid,
        /// 0-based position in upload order
        index: usize,
        file_name: String,
        duration_seconds: f64,
        progress: f32,
        timestamp: DateTime<Utc>,
    },

    /// The concatenated audio was encoded to MP3
    ExportCompleted {
        session_id: Uuid,
        bytes: usize,
        progress: f32,
        timestamp: DateTime<Utc>,
    },

    /// ID3 tagging finished (zero frames when no metadata was supplied)
    TaggingCompleted {
        session_id: Uuid,
        frames_written: usize,
        progress: f32,
        timestamp: DateTime<Utc>,
    },

    /// The merged file is ready for download
    MergeCompleted {
        session_id: Uuid,
        file_name: String,
        bytes: usize,
        duration_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// The merge was aborted; no output was produced
    MergeFailed {
        session_id: Uuid,
        /// Offending upload, when the failure belongs to one file
        file_name: Option<String>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl MergeEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            MergeEvent::MergeStarted { .. } => "MergeStarted",
            MergeEvent::DecodeStarted { .. } => "DecodeStarted",
            MergeEvent::FileDecoded { .. } => "FileDecoded",
            MergeEvent::ExportCompleted { .. } => "ExportCompleted",
            MergeEvent::TaggingCompleted { .. } => "TaggingCompleted",
            MergeEvent::MergeCompleted { .. } => "MergeCompleted",
            MergeEvent::MergeFailed { .. } => "MergeFailed",
        }
    }

    /// Merge session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            MergeEvent::MergeStarted { session_id, .. }
            | MergeEvent::DecodeStarted { session_id, .. }
            | MergeEvent::FileDecoded { session_id, .. }
            | MergeEvent::ExportCompleted { session_id, .. }
            | MergeEvent::TaggingCompleted { session_id, .. }
            | MergeEvent::MergeCompleted { session_id, .. }
            | MergeEvent::MergeFailed { session_id, .. } => *session_id,
        }
    }

    /// Overall completion fraction, if this event marks one
    pub fn progress(&self) -> Option<f32> {
        match self {
            MergeEvent::MergeStarted { .. } => Some(0.0),
            MergeEvent::DecodeStarted { progress, .. }
            | MergeEvent::FileDecoded { progress, .. }
            | MergeEvent::ExportCompleted { progress, .. }
            | MergeEvent::TaggingCompleted { progress, .. } => Some(*progress),
            MergeEvent::MergeCompleted { .. } => Some(1.0),
            MergeEvent::MergeFailed { .. } => None,
        }
    }
}

/// Broadcast channel for merge events
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MergeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer per subscriber before the
    ///   oldest are dropped
    ///
    /// # Examples
    ///
    /// ```
    /// use amrg_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<MergeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: MergeEvent,
    ) -> Result<usize, broadcast::error::SendError<MergeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress events are informational; a merge with no browser watching
    /// still runs to completion.
    pub fn emit_lossy(&self, event: MergeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
