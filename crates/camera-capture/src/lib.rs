//! Camera Capture Library for Driver Monitoring
//!
//! Provides the frame type shared by the pipeline, the [`FrameSource`]
//! abstraction over a camera handle, and the capture loop that runs on its
//! own thread and feeds the bounded frame relay.
//! Supports:
//! - Synthetic frames paced at the configured rate (bench and demo runs)
//! - Replay of still images from a directory

pub mod capture;
pub mod frame;
pub mod source;

pub use capture::{capture_loop, spawn_capture, CaptureExit, CaptureSummary, StopSignal};
pub use frame::{RoiRect, VideoFrame};
pub use source::{open_source, DirectorySource, FrameSource, SyntheticSource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Frame read failed: {0}")]
    Read(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("End of stream")]
    EndOfStream,
}

/// Which frame source backs the capture thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Generated blank frames
    #[default]
    Synthetic,
    /// Still images replayed from `replay_dir`
    Directory,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Frame source backend
    pub source: SourceKind,
    /// Directory of images for the replay source
    pub replay_dir: Option<PathBuf>,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Native frame rate of the device
    pub fps: u32,
    /// Stop after this many frames (synthetic source only)
    pub frame_limit: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Synthetic,
            replay_dir: None,
            width: 640,
            height: 480,
            fps: 30,
            frame_limit: None,
        }
    }
}
