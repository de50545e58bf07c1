//! Alert arbitration
//!
//! Decides from the drowsiness counters whether an alert is needed, and
//! applies the two cooldown tracks: one for dispatching a notification and
//! one for the on-screen popup.

use dms::AccumulatorState;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Continuous eye closure that counts as a microsleep (seconds)
    pub microsleep_threshold_s: f64,
    /// Single-yawn duration that triggers an alert (seconds)
    pub yawn_duration_threshold_s: f64,
    /// Yawn count that triggers an alert once exceeded
    pub yawn_count_threshold: u32,
    /// Minimum gap between notification dispatches (seconds)
    pub alert_cooldown_s: f64,
    /// Minimum gap between popups (seconds)
    pub popup_cooldown_s: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            microsleep_threshold_s: 3.5,
            yawn_duration_threshold_s: 8.0,
            yawn_count_threshold: 4,
            alert_cooldown_s: 60.0,
            popup_cooldown_s: 15.0,
        }
    }
}

/// Arbiter state, owned by the processing thread
#[derive(Debug, Clone, Default)]
pub struct AlertState {
    /// Last notification dispatch
    pub last_alert_time: Option<Instant>,
    /// Last popup
    pub last_popup_time: Option<Instant>,
    /// Popup latch; clears once the alert condition goes away
    pub alert_active: bool,
    /// Notifications dispatched this session
    pub dispatch_count: u64,
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertDecision {
    pub alert_needed: bool,
    /// Hand a report to notification dispatch
    pub dispatch: bool,
    /// Raise the popup
    pub show_popup: bool,
}

/// Coarse fatigue grading for the status display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatigueLevel {
    #[default]
    Normal,
    Warning,
    Danger,
}

/// Closure above this many seconds grades as a warning
pub const WARNING_CLOSED_SECONDS: f64 = 1.0;
/// Yawn count above this grades as a warning
pub const WARNING_YAWN_COUNT: u32 = 1;

/// Threshold and cooldown arbiter
pub struct AlertArbiter {
    config: AlertConfig,
    alert_cooldown: Duration,
    popup_cooldown: Duration,
    state: AlertState,
}

impl AlertArbiter {
    /// Create a new arbiter
    pub fn new(config: AlertConfig) -> Self {
        info!("Creating alert arbiter with config: {:?}", config);
        let seconds = |s: f64| Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO);
        Self {
            alert_cooldown: seconds(config.alert_cooldown_s),
            popup_cooldown: seconds(config.popup_cooldown_s),
            config,
            state: AlertState::default(),
        }
    }

    /// Threshold check; durations are compared at hundredth-of-a-second precision
    pub fn alert_needed(&self, counters: &AccumulatorState) -> bool {
        round2(counters.continuous_closed_seconds) > self.config.microsleep_threshold_s
            || round2(counters.yawn_duration_seconds) > self.config.yawn_duration_threshold_s
            || counters.yawn_count > self.config.yawn_count_threshold
    }

    /// Danger when an alert is needed, warning on early signs
    pub fn fatigue_level(&self, counters: &AccumulatorState) -> FatigueLevel {
        if self.alert_needed(counters) {
            FatigueLevel::Danger
        } else if round2(counters.continuous_closed_seconds) > WARNING_CLOSED_SECONDS
            || counters.yawn_count > WARNING_YAWN_COUNT
        {
            FatigueLevel::Warning
        } else {
            FatigueLevel::Normal
        }
    }

    /// Evaluate the counters at `now`
    pub fn evaluate(&mut self, counters: &AccumulatorState, now: Instant) -> AlertDecision {
        let alert_needed = self.alert_needed(counters);

        if !alert_needed {
            if self.state.alert_active {
                debug!("Alert condition cleared");
            }
            self.state.alert_active = false;
            return AlertDecision::default();
        }

        let dispatch = elapsed(self.state.last_alert_time, now, self.alert_cooldown);
        if dispatch {
            self.state.last_alert_time = Some(now);
            self.state.dispatch_count += 1;
            info!(
                "Alert #{}: closed {:.2}s, yawn {:.2}s, yawns {}",
                self.state.dispatch_count,
                counters.continuous_closed_seconds,
                counters.yawn_duration_seconds,
                counters.yawn_count
            );
        } else {
            debug!("Dispatch suppressed: in cooldown period");
        }

        let show_popup = !self.state.alert_active && elapsed(self.state.last_popup_time, now, self.popup_cooldown);
        if show_popup {
            self.state.last_popup_time = Some(now);
            self.state.alert_active = true;
        }

        AlertDecision {
            alert_needed,
            dispatch,
            show_popup,
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Operator reset
    pub fn reset(&mut self) {
        self.state = AlertState::default();
    }
}

/// No previous trigger, or strictly more than `cooldown` since it
fn elapsed(last: Option<Instant>, now: Instant, cooldown: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) > cooldown,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
