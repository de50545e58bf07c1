//! Scripted perception backend
//!
//! Stands in for the landmark model and the eye/mouth classifiers when no
//! model backend is wired in. Answers follow a timeline of segments keyed by
//! the frame's stream timestamp.

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::classifier::{Detection, RegionClassifier};
use crate::policy::{EyeClasses, MouthClasses};
use crate::region::{FaceLandmarks, LandmarkEstimator, LandmarkPoint, Region, RegionKind};
use crate::DmsError;

/// Number of points in a face-mesh landmark set
pub const MESH_POINTS: usize = 468;

/// What the eye classifier reports during a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeCue {
    Open,
    Closed,
    /// No candidates
    Missing,
}

/// What the mouth classifier reports during a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouthCue {
    Yawning,
    NotYawning,
    Missing,
}

/// One span of the timeline, ending at `until_s` (exclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    pub until_s: f64,
    #[serde(default = "default_face")]
    pub face: bool,
    pub eyes: EyeCue,
    pub mouth: MouthCue,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

fn default_face() -> bool {
    true
}

fn default_confidence() -> f32 {
    0.9
}

impl ScriptSegment {
    pub fn new(until_s: f64, eyes: EyeCue, mouth: MouthCue) -> Self {
        Self {
            until_s,
            face: true,
            eyes,
            mouth,
            confidence: default_confidence(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn without_face(mut self) -> Self {
        self.face = false;
        self
    }
}

/// Landmark estimator and classifiers driven by a timeline
///
/// Clones share the timeline, so one instance can back the landmark
/// estimator and both classifiers.
#[derive(Debug, Clone)]
pub struct ScriptedPerception {
    script: Arc<Vec<ScriptSegment>>,
    eye_classes: EyeClasses,
    mouth_classes: MouthClasses,
}

impl ScriptedPerception {
    /// The last segment holds once the timeline runs out
    pub fn new(script: Vec<ScriptSegment>, eye_classes: EyeClasses, mouth_classes: MouthClasses) -> Self {
        let script = if script.is_empty() {
            vec![ScriptSegment::new(f64::MAX, EyeCue::Open, MouthCue::NotYawning)]
        } else {
            script
        };
        Self {
            script: Arc::new(script),
            eye_classes,
            mouth_classes,
        }
    }

    /// An attentive subject for the whole run
    pub fn alert_driver() -> Self {
        Self::new(Vec::new(), EyeClasses::default(), MouthClasses::default())
    }

    fn segment_at(&self, timestamp_ns: u64) -> &ScriptSegment {
        let t = timestamp_ns as f64 / 1e9;
        let idx = self
            .script
            .iter()
            .position(|segment| t < segment.until_s)
            .unwrap_or(self.script.len() - 1);
        &self.script[idx]
    }

    fn mesh() -> FaceLandmarks {
        // Spread points over the central 60% of the frame so any anchor
        // combination spans a non-empty box.
        let points = (0..MESH_POINTS)
            .map(|i| LandmarkPoint {
                x: 0.2 + 0.6 * (i % 22) as f32 / 21.0,
                y: 0.2 + 0.6 * (i / 22) as f32 / 21.0,
            })
            .collect();
        FaceLandmarks { points }
    }
}

impl LandmarkEstimator for ScriptedPerception {
    fn locate(&mut self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
        if self.segment_at(frame.timestamp_ns).face {
            Ok(vec![Self::mesh()])
        } else {
            Ok(Vec::new())
        }
    }
}

impl RegionClassifier for ScriptedPerception {
    fn classify(&mut self, region: &Region) -> Result<Vec<Detection>, DmsError> {
        let segment = self.segment_at(region.pixels.timestamp_ns);

        let class_id = match region.kind {
            RegionKind::LeftEye | RegionKind::RightEye => match segment.eyes {
                EyeCue::Open => Some(self.eye_classes.open),
                EyeCue::Closed => Some(self.eye_classes.closed),
                EyeCue::Missing => None,
            },
            RegionKind::Mouth => match segment.mouth {
                MouthCue::Yawning => Some(self.mouth_classes.yawn),
                MouthCue::NotYawning => Some(self.mouth_classes.no_yawn),
                MouthCue::Missing => None,
            },
        };

        Ok(class_id
            .map(|class_id| Detection {
                class_id,
                confidence: segment.confidence,
            })
            .into_iter()
            .collect())
    }
}
