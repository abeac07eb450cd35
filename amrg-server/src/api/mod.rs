//! HTTP API handlers for amrg-server

pub mod health;
pub mod merge;
pub mod sse;
pub mod ui;

pub use health::health_routes;
pub use merge::merge_routes;
pub use sse::merge_event_stream;
pub use ui::ui_routes;
