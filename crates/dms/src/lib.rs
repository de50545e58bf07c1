//! Driver Monitoring System (DMS)
//!
//! Per-frame drowsiness analysis:
//! - Eye and mouth region extraction from facial landmarks
//! - Confidence-tiered eye/mouth state classification
//! - Debounced blink/yawn counting and closure/yawn durations

pub mod accumulator;
pub mod analysis;
pub mod classifier;
pub mod config;
pub mod policy;
pub mod region;
pub mod scripted;
pub mod state;

pub use accumulator::{AccumulatorState, DrowsinessAccumulator, ReleaseMode, TierRates};
pub use analysis::{FrameAnalysis, FACE_LOST_FRAMES};
pub use classifier::{Detection, RegionClassifier, StateClassifier};
pub use config::DmsConfig;
pub use policy::{EyeClasses, FeatureKind, Finding, MouthClasses, PolicyRule, PolicyTable};
pub use region::{AnchorSet, FaceLandmarks, LandmarkEstimator, LandmarkPoint, Region, RegionExtractor, RegionKind};
pub use scripted::{EyeCue, MouthCue, ScriptSegment, ScriptedPerception};
pub use state::{ConfidenceTier, EyeState, MouthState, Observation};

use camera_capture::VideoFrame;
use thiserror::Error;
use tracing::{debug, info};

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Landmark estimation failed: {0}")]
    Landmarks(String),

    #[error("Classifier failed: {0}")]
    Classifier(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Driver monitoring module
///
/// Owns every stage between a decoded frame and the drowsiness counters.
/// Runs on the processing thread only.
pub struct DmsModule {
    extractor: RegionExtractor,
    classifier: StateClassifier,
    accumulator: DrowsinessAccumulator,
    face_absent_frames: u32,
}

impl DmsModule {
    /// Create a new DMS module with configuration
    pub fn new(
        config: DmsConfig,
        landmarks: Box<dyn LandmarkEstimator>,
        eye_classifier: Box<dyn RegionClassifier>,
        mouth_classifier: Box<dyn RegionClassifier>,
    ) -> Result<Self, DmsError> {
        config.validate()?;

        info!(
            "DMS ready: {:.1} fps tick, confidence tiers {:.2}/{:.2}, release {:?}",
            config.target_fps, config.high_confidence, config.low_confidence, config.release
        );

        Ok(Self {
            extractor: RegionExtractor::new(landmarks, config.anchors.clone()),
            classifier: StateClassifier::new(eye_classifier, mouth_classifier, config.policy()),
            accumulator: DrowsinessAccumulator::new(config.tick_seconds(), config.tier_rates, config.release),
            face_absent_frames: 0,
        })
    }

    /// Analyze a single frame for driver state
    ///
    /// A frame without a face leaves the counters untouched.
    pub fn analyze(&mut self, frame: &VideoFrame) -> FrameAnalysis {
        let Some(regions) = self.extractor.extract(frame) else {
            self.face_absent_frames = self.face_absent_frames.saturating_add(1);
            if self.face_absent_frames == FACE_LOST_FRAMES + 1 {
                info!("Face lost for {} frames", self.face_absent_frames);
            }
            return FrameAnalysis {
                face_detected: false,
                regions: 0,
                observation: self.classifier.current(),
                face_absent_frames: self.face_absent_frames,
                counters: *self.accumulator.state(),
            };
        };

        if self.face_absent_frames > FACE_LOST_FRAMES {
            info!("Face back after {} frames", self.face_absent_frames);
        }
        self.face_absent_frames = 0;

        let observation = self.classifier.observe(&regions);
        let counters = *self.accumulator.update(&observation);
        debug!(
            "Frame {}: {:?} -> closed {:.2}s, yawn {:.2}s",
            frame.sequence, observation, counters.continuous_closed_seconds, counters.yawn_duration_seconds
        );

        FrameAnalysis {
            face_detected: true,
            regions: regions.len(),
            observation,
            face_absent_frames: 0,
            counters,
        }
    }

    /// Current counters
    pub fn state(&self) -> &AccumulatorState {
        self.accumulator.state()
    }

    /// Reset driver state (operator request)
    pub fn reset_state(&mut self) {
        self.accumulator.reset();
        self.classifier.reset();
        self.face_absent_frames = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(script: Vec<ScriptSegment>) -> DmsModule {
        let perception = ScriptedPerception::new(script, EyeClasses::default(), MouthClasses::default());
        DmsModule::new(
            DmsConfig::default(),
            Box::new(perception.clone()),
            Box::new(perception.clone()),
            Box::new(perception),
        )
        .unwrap()
    }

    fn frame(seq: u64) -> VideoFrame {
        let ts = seq * 1_000_000_000 / 30;
        VideoFrame::filled(64, 48, 128, ts, seq)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let perception = ScriptedPerception::alert_driver();
        let config = DmsConfig {
            target_fps: -1.0,
            ..Default::default()
        };
        let result = DmsModule::new(
            config,
            Box::new(perception.clone()),
            Box::new(perception.clone()),
            Box::new(perception),
        );
        assert!(matches!(result, Err(DmsError::Config(_))));
    }

    #[test]
    fn test_closed_eyes_accumulate() {
        let mut dms = module(vec![ScriptSegment::new(10.0, EyeCue::Closed, MouthCue::NotYawning)]);

        let mut last = FrameAnalysis::default();
        for seq in 0..60 {
            last = dms.analyze(&frame(seq));
        }

        assert!(last.face_detected);
        assert_eq!(last.regions, 3);
        assert_eq!(last.counters.blink_count, 1);
        assert!((last.counters.continuous_closed_seconds - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_face_absence_freezes_counters() {
        let mut dms = module(vec![
            ScriptSegment::new(1.0, EyeCue::Closed, MouthCue::Yawning),
            ScriptSegment::new(3.0, EyeCue::Closed, MouthCue::Yawning).without_face(),
        ]);

        for seq in 0..30 {
            dms.analyze(&frame(seq));
        }
        let before = *dms.state();

        let mut last = FrameAnalysis::default();
        for seq in 30..75 {
            last = dms.analyze(&frame(seq));
        }

        assert!(!last.face_detected);
        assert_eq!(last.face_absent_frames, 45);
        assert!(last.face_lost());
        assert_eq!(last.counters, before);
    }

    #[test]
    fn test_reset_state() {
        let mut dms = module(vec![ScriptSegment::new(10.0, EyeCue::Closed, MouthCue::Yawning)]);
        for seq in 0..10 {
            dms.analyze(&frame(seq));
        }

        dms.reset_state();
        assert_eq!(*dms.state(), AccumulatorState::default());
    }
}
