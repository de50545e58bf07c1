//! Confidence-tiered interpretation of classifier output
//!
//! Every threshold that turns a raw `(class_id, confidence)` candidate into a
//! region state lives in one [`PolicyTable`], so tuning never touches the
//! control flow of the classifier adapter.

use serde::{Deserialize, Serialize};

use crate::classifier::Detection;
use crate::state::ConfidenceTier;

/// Which classifier produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Eye,
    Mouth,
}

/// Semantic meaning of a classifier class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    Open,
    Closed,
    Yawning,
    NotYawning,
}

/// Class ids emitted by the eye classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeClasses {
    pub open: u32,
    pub closed: u32,
}

impl Default for EyeClasses {
    fn default() -> Self {
        Self { open: 0, closed: 1 }
    }
}

/// Class ids emitted by the mouth classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouthClasses {
    pub yawn: u32,
    pub no_yawn: u32,
}

impl Default for MouthClasses {
    fn default() -> Self {
        Self { yawn: 0, no_yawn: 1 }
    }
}

/// One row of the policy table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub kind: FeatureKind,
    pub class_id: u32,
    /// Inclusive lower confidence bound
    pub min_confidence: f32,
    pub finding: Finding,
    pub tier: ConfidenceTier,
}

/// Ordered rule table keyed by (feature kind, class id, confidence range)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    rules: Vec<PolicyRule>,
}

impl PolicyTable {
    /// Build a table; rules are matched from the highest bound down
    pub fn new(mut rules: Vec<PolicyRule>) -> Self {
        rules.sort_by(|a, b| b.min_confidence.total_cmp(&a.min_confidence));
        Self { rules }
    }

    /// Three tiers per class: `>= high` High, `>= low` Medium, anything else Low
    pub fn tiered(high: f32, low: f32, eyes: EyeClasses, mouth: MouthClasses) -> Self {
        let classes = [
            (FeatureKind::Eye, eyes.open, Finding::Open),
            (FeatureKind::Eye, eyes.closed, Finding::Closed),
            (FeatureKind::Mouth, mouth.yawn, Finding::Yawning),
            (FeatureKind::Mouth, mouth.no_yawn, Finding::NotYawning),
        ];

        let rules = classes
            .iter()
            .flat_map(|&(kind, class_id, finding)| {
                [
                    (high, ConfidenceTier::High),
                    (low, ConfidenceTier::Medium),
                    (0.0, ConfidenceTier::Low),
                ]
                .into_iter()
                .map(move |(min_confidence, tier)| PolicyRule {
                    kind,
                    class_id,
                    min_confidence,
                    finding,
                    tier,
                })
            })
            .collect();

        Self::new(rules)
    }

    /// Interpret one candidate; `None` means no rule applies
    pub fn resolve(&self, kind: FeatureKind, detection: &Detection) -> Option<(Finding, ConfidenceTier)> {
        if !detection.confidence.is_finite() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| {
                rule.kind == kind
                    && rule.class_id == detection.class_id
                    && detection.confidence >= rule.min_confidence
            })
            .map(|rule| (rule.finding, rule.tier))
    }

    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::tiered(0.5, 0.3, EyeClasses::default(), MouthClasses::default())
    }
}
