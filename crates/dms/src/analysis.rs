//! Per-frame DMS analysis result

use serde::{Deserialize, Serialize};

use crate::accumulator::AccumulatorState;
use crate::state::Observation;

/// Frames without a face after which the driver counts as out of view (~1 s)
pub const FACE_LOST_FRAMES: u32 = 30;

/// Result of analyzing one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// Whether a face was found in this frame
    pub face_detected: bool,

    /// Regions cropped from the face (0..=3)
    pub regions: usize,

    /// Region states after this frame
    pub observation: Observation,

    /// Consecutive frames without a face
    pub face_absent_frames: u32,

    /// Counters after this frame
    pub counters: AccumulatorState,
}

impl FrameAnalysis {
    /// Driver has been out of view long enough to report
    pub fn face_lost(&self) -> bool {
        self.face_absent_frames > FACE_LOST_FRAMES
    }
}
