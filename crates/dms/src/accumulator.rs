//! Debounced drowsiness accounting
//!
//! Turns the per-tick [`Observation`] stream into blink/yawn counts and
//! continuous closure/yawn durations. Each axis is edge-triggered on its own
//! latch and advances by a fixed tick increment scaled by confidence tier.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::{ConfidenceTier, MouthState, Observation};

/// Fraction of a tick credited per confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierRates {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for TierRates {
    fn default() -> Self {
        Self {
            high: 1.0,
            medium: 2.0 / 3.0,
            low: 1.0 / 3.0,
        }
    }
}

impl TierRates {
    pub fn rate(&self, tier: ConfidenceTier) -> f64 {
        match tier {
            ConfidenceTier::High => self.high,
            ConfidenceTier::Medium => self.medium,
            ConfidenceTier::Low => self.low,
        }
    }
}

/// What happens to a duration when its episode ends
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReleaseMode {
    /// Drop straight to zero
    #[default]
    Reset,
    /// Fall by `rate` of a tick per tick, floored at zero
    Decay { rate: f64 },
}

/// Counters owned by the processing thread
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AccumulatorState {
    /// Closure episodes since the last reset
    pub blink_count: u32,
    /// Length of the current closure episode
    pub continuous_closed_seconds: f64,
    /// Yawn episodes since the last reset
    pub yawn_count: u32,
    /// Length of the current yawn
    pub yawn_duration_seconds: f64,
    pub eyes_were_closed: bool,
    pub mouth_was_yawning: bool,
}

/// Stateful reducer from observations to drowsiness counters
#[derive(Debug, Clone)]
pub struct DrowsinessAccumulator {
    state: AccumulatorState,
    tick_seconds: f64,
    rates: TierRates,
    release: ReleaseMode,
}

impl DrowsinessAccumulator {
    /// `tick_seconds` is the fixed increment of one processed frame
    pub fn new(tick_seconds: f64, rates: TierRates, release: ReleaseMode) -> Self {
        Self {
            state: AccumulatorState::default(),
            tick_seconds,
            rates,
            release,
        }
    }

    /// Apply one tick
    pub fn update(&mut self, obs: &Observation) -> &AccumulatorState {
        self.update_eyes(obs);
        self.update_mouth(obs.mouth);
        &self.state
    }

    fn update_eyes(&mut self, obs: &Observation) {
        if let Some(tier) = obs.both_eyes_closed() {
            if !self.state.eyes_were_closed {
                self.state.eyes_were_closed = true;
                self.state.blink_count += 1;
                debug!("Eyes closed, blink #{}", self.state.blink_count);
            }
            self.state.continuous_closed_seconds += self.tick_seconds * self.rates.rate(tier);
        } else if obs.eyes_unknown() {
            // Indeterminate read: hold the axis as it is.
        } else {
            self.state.eyes_were_closed = false;
            self.state.continuous_closed_seconds = self.release(self.state.continuous_closed_seconds);
        }
    }

    fn update_mouth(&mut self, mouth: MouthState) {
        match mouth {
            MouthState::Yawning(tier) => {
                if !self.state.mouth_was_yawning {
                    self.state.mouth_was_yawning = true;
                    self.state.yawn_count += 1;
                    debug!("Yawn #{} started", self.state.yawn_count);
                }
                self.state.yawn_duration_seconds += self.tick_seconds * self.rates.rate(tier);
            }
            MouthState::NotYawning => {
                self.state.mouth_was_yawning = false;
                self.state.yawn_duration_seconds = self.release(self.state.yawn_duration_seconds);
            }
            MouthState::Unknown => {}
        }
    }

    fn release(&self, duration: f64) -> f64 {
        match self.release {
            ReleaseMode::Reset => 0.0,
            ReleaseMode::Decay { rate } => (duration - self.tick_seconds * rate).max(0.0),
        }
    }

    pub fn state(&self) -> &AccumulatorState {
        &self.state
    }

    pub fn tick_seconds(&self) -> f64 {
        self.tick_seconds
    }

    /// Operator reset
    pub fn reset(&mut self) {
        self.state = AccumulatorState::default();
    }
}
