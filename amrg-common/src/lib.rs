//! # Audio Merger Common Library
//!
//! Shared code for the audio merger service:
//! - Error and result types
//! - TOML configuration loading
//! - Merge progress events (MergeEvent enum) and the EventBus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
