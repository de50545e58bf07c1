//! Per-region driver state

use serde::{Deserialize, Serialize};

/// Coarse confidence bucket of a classifier reading
///
/// Ordered from weakest to strongest so `min` picks the less certain reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

/// Eye state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "tier", rename_all = "snake_case")]
pub enum EyeState {
    Open(ConfidenceTier),
    Closed(ConfidenceTier),
    /// No reading yet for this session
    #[default]
    Unknown,
}

impl EyeState {
    pub fn is_closed(&self) -> bool {
        matches!(self, EyeState::Closed(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EyeState::Unknown)
    }

    pub fn tier(&self) -> Option<ConfidenceTier> {
        match self {
            EyeState::Open(tier) | EyeState::Closed(tier) => Some(*tier),
            EyeState::Unknown => None,
        }
    }
}

/// Mouth state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "tier", rename_all = "snake_case")]
pub enum MouthState {
    Yawning(ConfidenceTier),
    NotYawning,
    #[default]
    Unknown,
}

impl MouthState {
    pub fn is_yawning(&self) -> bool {
        matches!(self, MouthState::Yawning(_))
    }
}

/// Interpreted state of all three regions for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Observation {
    pub left_eye: EyeState,
    pub right_eye: EyeState,
    pub mouth: MouthState,
}

impl Observation {
    pub fn new(left_eye: EyeState, right_eye: EyeState, mouth: MouthState) -> Self {
        Self {
            left_eye,
            right_eye,
            mouth,
        }
    }

    /// Both eyes closed, with the tier of the less certain eye
    pub fn both_eyes_closed(&self) -> Option<ConfidenceTier> {
        match (self.left_eye, self.right_eye) {
            (EyeState::Closed(left), EyeState::Closed(right)) => Some(left.min(right)),
            _ => None,
        }
    }

    /// Either eye indeterminate
    pub fn eyes_unknown(&self) -> bool {
        self.left_eye.is_unknown() || self.right_eye.is_unknown()
    }
}
