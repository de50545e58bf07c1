//! Region-of-interest extraction from facial landmarks

use camera_capture::{RoiRect, VideoFrame};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::DmsError;

/// Anatomical feature isolated by a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    LeftEye,
    RightEye,
    Mouth,
}

/// Normalized landmark coordinate (0..1 of frame width/height)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
}

/// Ordered landmark set for one face
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceLandmarks {
    pub points: Vec<LandmarkPoint>,
}

/// Facial landmark estimator
pub trait LandmarkEstimator: Send {
    /// Locate faces in the frame; only the first face is used
    fn locate(&mut self, frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError>;
}

/// Landmark indices whose bounding box defines each region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorSet {
    pub mouth: Vec<usize>,
    pub right_eye: Vec<usize>,
    pub left_eye: Vec<usize>,
}

impl Default for AnchorSet {
    /// Face-mesh (468 point) indices
    fn default() -> Self {
        Self {
            mouth: vec![187, 411, 152],
            right_eye: vec![68, 174],
            left_eye: vec![399, 298],
        }
    }
}

impl AnchorSet {
    fn anchors(&self, kind: RegionKind) -> &[usize] {
        match kind {
            RegionKind::Mouth => &self.mouth,
            RegionKind::RightEye => &self.right_eye,
            RegionKind::LeftEye => &self.left_eye,
        }
    }
}

/// Cropped region of one frame
#[derive(Debug, Clone)]
pub struct Region {
    pub kind: RegionKind,
    /// Rectangle in source-frame pixels
    pub rect: RoiRect,
    /// Pixel copy of the rectangle
    pub pixels: VideoFrame,
}

/// Derives eye and mouth regions from landmark anchors
pub struct RegionExtractor {
    estimator: Box<dyn LandmarkEstimator>,
    anchors: AnchorSet,
}

impl RegionExtractor {
    pub fn new(estimator: Box<dyn LandmarkEstimator>, anchors: AnchorSet) -> Self {
        Self { estimator, anchors }
    }

    /// Extract up to three regions
    ///
    /// `None` means no face was found (or the estimator failed), which must
    /// not be read as "eyes open". A face whose anchors are missing or whose
    /// rectangles collapse yields fewer regions.
    pub fn extract(&mut self, frame: &VideoFrame) -> Option<Vec<Region>> {
        let faces = match self.estimator.locate(frame) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Landmark estimation failed on frame {}: {}", frame.sequence, e);
                return None;
            }
        };

        let face = faces.first()?;

        let regions = [RegionKind::Mouth, RegionKind::RightEye, RegionKind::LeftEye]
            .into_iter()
            .filter_map(|kind| {
                let rect = anchor_rect(face, self.anchors.anchors(kind), frame.width, frame.height)?;
                let pixels = frame.crop(&rect)?;
                Some(Region { kind, rect, pixels })
            })
            .collect::<Vec<_>>();

        if regions.len() < 3 {
            debug!("Frame {}: only {} region(s) extracted", frame.sequence, regions.len());
        }
        Some(regions)
    }
}

/// Bounding box of the anchor points in pixel space, clamped to the frame
fn anchor_rect(face: &FaceLandmarks, anchors: &[usize], width: u32, height: u32) -> Option<RoiRect> {
    let mut min = (f32::MAX, f32::MAX);
    let mut max = (f32::MIN, f32::MIN);

    for &idx in anchors {
        let point = face.points.get(idx)?;
        if !point.x.is_finite() || !point.y.is_finite() {
            return None;
        }
        let (x, y) = (point.x * width as f32, point.y * height as f32);
        min = (min.0.min(x), min.1.min(y));
        max = (max.0.max(x), max.1.max(y));
    }

    if anchors.is_empty() {
        return None;
    }

    let rect = RoiRect::from_corners(min, max, width, height);
    (!rect.is_empty()).then_some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFaces(Vec<FaceLandmarks>);

    impl LandmarkEstimator for FixedFaces {
        fn locate(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenEstimator;

    impl LandmarkEstimator for BrokenEstimator {
        fn locate(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceLandmarks>, DmsError> {
            Err(DmsError::Landmarks("model crashed".into()))
        }
    }

    fn small_anchors() -> AnchorSet {
        AnchorSet {
            mouth: vec![0, 1, 2],
            right_eye: vec![3, 4],
            left_eye: vec![5, 6],
        }
    }

    fn face(points: &[(f32, f32)]) -> FaceLandmarks {
        FaceLandmarks {
            points: points.iter().map(|&(x, y)| LandmarkPoint { x, y }).collect(),
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame::filled(100, 100, 50, 0, 0)
    }

    #[test]
    fn test_no_face_yields_nothing() {
        let mut extractor = RegionExtractor::new(Box::new(FixedFaces(vec![])), small_anchors());
        assert!(extractor.extract(&frame()).is_none());
    }

    #[test]
    fn test_estimator_error_is_a_miss() {
        let mut extractor = RegionExtractor::new(Box::new(BrokenEstimator), small_anchors());
        assert!(extractor.extract(&frame()).is_none());
    }

    #[test]
    fn test_three_regions_from_anchor_boxes() {
        let landmarks = face(&[
            (0.40, 0.70), // mouth top-left
            (0.60, 0.72), // mouth right
            (0.50, 0.85), // chin
            (0.20, 0.30),
            (0.35, 0.40),
            (0.80, 0.40), // left eye, corners given reversed
            (0.65, 0.30),
        ]);
        let mut extractor = RegionExtractor::new(Box::new(FixedFaces(vec![landmarks])), small_anchors());

        let regions = extractor.extract(&frame()).unwrap();
        assert_eq!(regions.len(), 3);

        let mouth = regions.iter().find(|r| r.kind == RegionKind::Mouth).unwrap();
        assert_eq!(mouth.rect, RoiRect { x: 40, y: 70, width: 20, height: 15 });

        let left = regions.iter().find(|r| r.kind == RegionKind::LeftEye).unwrap();
        assert_eq!(left.rect, RoiRect { x: 65, y: 30, width: 15, height: 10 });
        assert_eq!(left.pixels.width, 15);
    }

    #[test]
    fn test_only_first_face_used() {
        let first = face(&[(0.1, 0.1), (0.2, 0.1), (0.15, 0.2), (0.1, 0.1), (0.2, 0.2), (0.1, 0.1), (0.2, 0.2)]);
        let second = face(&[(0.6, 0.6), (0.9, 0.6), (0.7, 0.9), (0.6, 0.6), (0.9, 0.9), (0.6, 0.6), (0.9, 0.9)]);
        let mut extractor =
            RegionExtractor::new(Box::new(FixedFaces(vec![first, second])), small_anchors());

        let regions = extractor.extract(&frame()).unwrap();
        assert!(regions.iter().all(|r| r.rect.x < 50));
    }

    #[test]
    fn test_out_of_frame_points_are_clamped() {
        let landmarks = face(&[
            (0.9, 0.9),
            (1.4, 0.95),
            (1.0, 1.3),
            (-0.2, -0.1),
            (0.1, 0.1),
            (0.5, 0.2),
            (0.5, 0.3), // zero-width left eye
        ]);
        let mut extractor = RegionExtractor::new(Box::new(FixedFaces(vec![landmarks])), small_anchors());

        let regions = extractor.extract(&frame()).unwrap();
        assert_eq!(regions.len(), 2);

        let mouth = regions.iter().find(|r| r.kind == RegionKind::Mouth).unwrap();
        assert_eq!(mouth.rect, RoiRect { x: 90, y: 90, width: 10, height: 10 });
        let right = regions.iter().find(|r| r.kind == RegionKind::RightEye).unwrap();
        assert_eq!(right.rect, RoiRect { x: 0, y: 0, width: 10, height: 10 });
    }

    #[test]
    fn test_non_finite_anchor_drops_region() {
        let landmarks = face(&[
            (f32::NAN, f32::NAN),
            (f32::NAN, f32::NAN),
            (f32::NAN, f32::NAN),
            (0.2, 0.3),
            (0.35, 0.4),
            (0.5, 0.3),
            (f32::INFINITY, 0.4),
        ]);
        let mut extractor = RegionExtractor::new(Box::new(FixedFaces(vec![landmarks])), small_anchors());

        let regions = extractor.extract(&frame()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::RightEye);
    }

    #[test]
    fn test_missing_anchor_drops_region() {
        let landmarks = face(&[(0.4, 0.7), (0.6, 0.7), (0.5, 0.85)]);
        let mut extractor = RegionExtractor::new(Box::new(FixedFaces(vec![landmarks])), small_anchors());

        let regions = extractor.extract(&frame()).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].kind, RegionKind::Mouth);
    }
}
