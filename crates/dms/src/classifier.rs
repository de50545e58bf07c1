//! Eye and mouth state classification adapter

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::policy::{FeatureKind, Finding, PolicyTable};
use crate::region::{Region, RegionKind};
use crate::state::{ConfidenceTier, EyeState, MouthState, Observation};
use crate::DmsError;

/// One raw classifier candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

/// External object-detection classifier for one feature kind
pub trait RegionClassifier: Send {
    /// Candidates for the region; an empty list is a normal outcome
    fn classify(&mut self, region: &Region) -> Result<Vec<Detection>, DmsError>;
}

/// Reduces classifier output to per-region states
///
/// Holds the last state of every region: a tick with no usable candidate
/// keeps that state instead of resetting it, so a single missed detection
/// does not break an ongoing closure or yawn.
pub struct StateClassifier {
    eye_classifier: Box<dyn RegionClassifier>,
    mouth_classifier: Box<dyn RegionClassifier>,
    policy: PolicyTable,
    current: Observation,
}

impl StateClassifier {
    pub fn new(
        eye_classifier: Box<dyn RegionClassifier>,
        mouth_classifier: Box<dyn RegionClassifier>,
        policy: PolicyTable,
    ) -> Self {
        Self {
            eye_classifier,
            mouth_classifier,
            policy,
            current: Observation::default(),
        }
    }

    /// Classify this tick's regions and return the updated observation
    pub fn observe(&mut self, regions: &[Region]) -> Observation {
        for region in regions {
            let (classifier, feature) = match region.kind {
                RegionKind::LeftEye | RegionKind::RightEye => (&mut self.eye_classifier, FeatureKind::Eye),
                RegionKind::Mouth => (&mut self.mouth_classifier, FeatureKind::Mouth),
            };

            let candidates = match classifier.classify(region) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("{:?} classifier failed: {}", region.kind, e);
                    continue;
                }
            };

            let Some(best) = strongest(&candidates) else {
                continue;
            };

            match self.policy.resolve(feature, best) {
                Some(reading) => self.apply(region.kind, reading),
                None => debug!(
                    "{:?}: no policy rule for class {} @ {:.2}",
                    region.kind, best.class_id, best.confidence
                ),
            }
        }

        self.current
    }

    fn apply(&mut self, kind: RegionKind, (finding, tier): (Finding, ConfidenceTier)) {
        let eye = match finding {
            Finding::Open => Some(EyeState::Open(tier)),
            Finding::Closed => Some(EyeState::Closed(tier)),
            Finding::Yawning | Finding::NotYawning => None,
        };
        let mouth = match finding {
            Finding::Yawning => Some(MouthState::Yawning(tier)),
            Finding::NotYawning => Some(MouthState::NotYawning),
            Finding::Open | Finding::Closed => None,
        };

        match (kind, eye, mouth) {
            (RegionKind::LeftEye, Some(state), _) => self.current.left_eye = state,
            (RegionKind::RightEye, Some(state), _) => self.current.right_eye = state,
            (RegionKind::Mouth, _, Some(state)) => self.current.mouth = state,
            _ => debug!("{:?}: ignoring {:?} finding from a misconfigured rule", kind, finding),
        }
    }

    /// Last observation without classifying anything
    pub fn current(&self) -> Observation {
        self.current
    }

    /// Forget all region states
    pub fn reset(&mut self) {
        self.current = Observation::default();
    }
}

/// Candidate with the highest confidence
fn strongest(candidates: &[Detection]) -> Option<&Detection> {
    candidates
        .iter()
        .filter(|d| d.confidence.is_finite())
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::{RoiRect, VideoFrame};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays queued answers per call; an exhausted queue answers "nothing found"
    #[derive(Clone, Default)]
    struct Queued(Arc<Mutex<VecDeque<Result<Vec<Detection>, DmsError>>>>);

    impl Queued {
        fn push(&self, answer: Result<Vec<Detection>, DmsError>) {
            self.0.lock().unwrap().push_back(answer);
        }
    }

    impl RegionClassifier for Queued {
        fn classify(&mut self, _region: &Region) -> Result<Vec<Detection>, DmsError> {
            self.0.lock().unwrap().pop_front().unwrap_or(Ok(vec![]))
        }
    }

    fn region(kind: RegionKind) -> Region {
        Region {
            kind,
            rect: RoiRect { x: 0, y: 0, width: 2, height: 2 },
            pixels: VideoFrame::filled(2, 2, 0, 0, 0),
        }
    }

    fn det(class_id: u32, confidence: f32) -> Detection {
        Detection { class_id, confidence }
    }

    fn adapter() -> (StateClassifier, Queued, Queued) {
        let eyes = Queued::default();
        let mouth = Queued::default();
        let classifier = StateClassifier::new(
            Box::new(eyes.clone()),
            Box::new(mouth.clone()),
            PolicyTable::default(),
        );
        (classifier, eyes, mouth)
    }

    #[test]
    fn test_picks_highest_confidence_candidate() {
        let (mut classifier, eyes, _) = adapter();
        eyes.push(Ok(vec![det(0, 0.4), det(1, 0.9), det(0, 0.6)]));

        let obs = classifier.observe(&[region(RegionKind::LeftEye)]);
        assert_eq!(obs.left_eye, EyeState::Closed(ConfidenceTier::High));
        assert_eq!(obs.right_eye, EyeState::Unknown);
    }

    #[test]
    fn test_empty_result_retains_previous_state() {
        let (mut classifier, eyes, mouth) = adapter();
        eyes.push(Ok(vec![det(1, 0.8)]));
        eyes.push(Ok(vec![det(1, 0.8)]));
        mouth.push(Ok(vec![det(0, 0.7)]));
        let all = [
            region(RegionKind::Mouth),
            region(RegionKind::RightEye),
            region(RegionKind::LeftEye),
        ];
        classifier.observe(&all);

        // Next tick: every classifier comes back empty.
        let obs = classifier.observe(&all);
        assert_eq!(obs.left_eye, EyeState::Closed(ConfidenceTier::High));
        assert_eq!(obs.right_eye, EyeState::Closed(ConfidenceTier::High));
        assert_eq!(obs.mouth, MouthState::Yawning(ConfidenceTier::High));
    }

    #[test]
    fn test_classifier_error_retains_previous_state() {
        let (mut classifier, eyes, _) = adapter();
        eyes.push(Ok(vec![det(0, 0.9)]));
        classifier.observe(&[region(RegionKind::RightEye)]);

        eyes.push(Err(DmsError::Classifier("timeout".into())));
        let obs = classifier.observe(&[region(RegionKind::RightEye)]);
        assert_eq!(obs.right_eye, EyeState::Open(ConfidenceTier::High));
    }

    #[test]
    fn test_low_confidence_still_classified() {
        let (mut classifier, _, mouth) = adapter();
        mouth.push(Ok(vec![det(0, 0.1)]));

        let obs = classifier.observe(&[region(RegionKind::Mouth)]);
        assert_eq!(obs.mouth, MouthState::Yawning(ConfidenceTier::Low));
    }

    #[test]
    fn test_unmapped_class_retains_state() {
        let (mut classifier, _, mouth) = adapter();
        mouth.push(Ok(vec![det(1, 0.9)]));
        classifier.observe(&[region(RegionKind::Mouth)]);

        mouth.push(Ok(vec![det(5, 0.99)]));
        let obs = classifier.observe(&[region(RegionKind::Mouth)]);
        assert_eq!(obs.mouth, MouthState::NotYawning);
    }

    #[test]
    fn test_reset_forgets_states() {
        let (mut classifier, eyes, _) = adapter();
        eyes.push(Ok(vec![det(1, 0.9)]));
        classifier.observe(&[region(RegionKind::LeftEye)]);

        classifier.reset();
        assert_eq!(classifier.current(), Observation::default());
    }
}
