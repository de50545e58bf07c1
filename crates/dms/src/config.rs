//! DMS configuration

use serde::{Deserialize, Serialize};

use crate::accumulator::{ReleaseMode, TierRates};
use crate::policy::{EyeClasses, MouthClasses, PolicyRule, PolicyTable};
use crate::region::AnchorSet;
use crate::DmsError;

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Processing cadence; one tick credits `1 / target_fps` seconds
    pub target_fps: f64,

    /// Confidence at or above which a reading is High tier
    pub high_confidence: f32,

    /// Confidence at or above which a reading is Medium tier (below: Low)
    pub low_confidence: f32,

    /// Eye classifier class ids
    pub eye_classes: EyeClasses,

    /// Mouth classifier class ids
    pub mouth_classes: MouthClasses,

    /// Explicit policy rules; replaces the tiered table when set
    pub policy_rules: Option<Vec<PolicyRule>>,

    /// Accumulation rate per confidence tier
    pub tier_rates: TierRates,

    /// Duration behaviour when an episode ends
    pub release: ReleaseMode,

    /// Landmark indices per region
    pub anchors: AnchorSet,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            target_fps: 30.0,
            high_confidence: 0.5,
            low_confidence: 0.3,
            eye_classes: EyeClasses::default(),
            mouth_classes: MouthClasses::default(),
            policy_rules: None,
            tier_rates: TierRates::default(),
            release: ReleaseMode::Reset,
            anchors: AnchorSet::default(),
        }
    }
}

impl DmsConfig {
    /// Create sensitive config (lower confidence bounds)
    pub fn sensitive() -> Self {
        Self {
            high_confidence: 0.2,
            low_confidence: 0.1,
            ..Default::default()
        }
    }

    /// Fixed time credited per processed frame
    pub fn tick_seconds(&self) -> f64 {
        1.0 / self.target_fps
    }

    /// Build the classification policy table
    pub fn policy(&self) -> PolicyTable {
        match &self.policy_rules {
            Some(rules) => PolicyTable::new(rules.clone()),
            None => PolicyTable::tiered(
                self.high_confidence,
                self.low_confidence,
                self.eye_classes,
                self.mouth_classes,
            ),
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DmsError> {
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(DmsError::Config(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }

        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.high_confidence) || !in_unit(self.low_confidence) {
            return Err(DmsError::Config("confidence bounds must lie in [0, 1]".into()));
        }
        if self.low_confidence > self.high_confidence {
            return Err(DmsError::Config(format!(
                "low_confidence {} exceeds high_confidence {}",
                self.low_confidence, self.high_confidence
            )));
        }

        let rates = [self.tier_rates.high, self.tier_rates.medium, self.tier_rates.low];
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(DmsError::Config("tier rates must be non-negative".into()));
        }
        if let ReleaseMode::Decay { rate } = self.release {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(DmsError::Config("decay rate must be positive".into()));
            }
        }

        if self.anchors.mouth.is_empty() || self.anchors.left_eye.is_empty() || self.anchors.right_eye.is_empty() {
            return Err(DmsError::Config("every region needs at least one anchor".into()));
        }

        Ok(())
    }
}
