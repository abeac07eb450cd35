//! amrg-server library interface
//!
//! Exposes the router and pipeline for integration testing

pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

pub use crate::error::{ApiError, ApiResult, MergeError, MergeResult};

use amrg_common::events::EventBus;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use config::ServerConfig;
use pipeline::{MergePipeline, MergeSettings};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Resolved server configuration
    pub config: Arc<ServerConfig>,
    /// Merge pipeline configured from `config`
    pub pipeline: Arc<MergePipeline>,
    /// Serializes merge requests; one merge runs at a time
    pub merge_gate: Arc<Mutex<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let event_bus = EventBus::new(config.event_capacity);
        let pipeline = MergePipeline::new(MergeSettings {
            default_file_name: config.default_file_name.clone(),
        });

        Self {
            event_bus,
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            merge_gate: Arc::new(Mutex::new(())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let body_limit = match state.config.max_upload_bytes {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    Router::new()
        // UI routes (HTML page + script)
        .merge(api::ui_routes())
        // API routes
        .merge(api::merge_routes())
        .route("/merge/events", get(api::merge_event_stream))
        .merge(api::health_routes())
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
