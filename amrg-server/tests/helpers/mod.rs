//! Test Helper Utilities
//!
//! Shared utilities for testing amrg-server

#![allow(dead_code)]

pub mod audio_generator;
pub mod multipart;

// Re-export commonly used items
pub use audio_generator::{
    first_frame_bitrate, garbage_audio, generate_mp3, generate_wav, png_header, AudioConfig,
};
pub use multipart::MultipartBody;
