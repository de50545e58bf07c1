//! Driver status report handed to notification dispatch

use dms::AccumulatorState;
use serde::{Deserialize, Serialize};

/// Closure length above which the report flags drowsiness (seconds)
pub const DROWSY_FLAG_SECONDS: f64 = 3.0;

/// Copy of the driver state at trigger time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub vehicle_speed_kmh: f64,
    pub drowsiness_detected: bool,
    pub drowsiness_detail: String,
    pub yawn_detail: String,
}

impl StatusReport {
    /// Build a report from the counters
    pub fn from_counters(counters: &AccumulatorState, vehicle_speed_kmh: f64) -> Self {
        let closed = counters.continuous_closed_seconds;
        let drowsiness_detail = if closed > 0.0 {
            format!("eyes closed for {:.2} s", closed)
        } else {
            "normal".to_string()
        };

        let yawn_detail = if counters.yawn_count > 0 {
            format!(
                "{} yawn(s), current yawn {:.2} s",
                counters.yawn_count, counters.yawn_duration_seconds
            )
        } else {
            "normal".to_string()
        };

        Self {
            vehicle_speed_kmh,
            drowsiness_detected: closed > DROWSY_FLAG_SECONDS,
            drowsiness_detail,
            yawn_detail,
        }
    }

    /// Prompt sent to the text service
    pub fn prompt(&self) -> String {
        format!(
            "Driver status report:\n\
             - Vehicle speed: {:.0} km/h (highway)\n\
             - Drowsiness: {} ({})\n\
             - Yawning: {}\n\
             Write a short, polite safety reminder for the driver.",
            self.vehicle_speed_kmh,
            if self.drowsiness_detected { "yes" } else { "no" },
            self.drowsiness_detail,
            self.yawn_detail,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_drowsy_counters() {
        let counters = AccumulatorState {
            blink_count: 2,
            continuous_closed_seconds: 4.256,
            yawn_count: 3,
            yawn_duration_seconds: 1.5,
            ..Default::default()
        };
        let report = StatusReport::from_counters(&counters, 80.0);

        assert!(report.drowsiness_detected);
        assert_eq!(report.drowsiness_detail, "eyes closed for 4.26 s");
        assert_eq!(report.yawn_detail, "3 yawn(s), current yawn 1.50 s");

        let prompt = report.prompt();
        assert!(prompt.contains("80 km/h"));
        assert!(prompt.contains("Drowsiness: yes"));
    }

    #[test]
    fn test_report_for_attentive_driver() {
        let report = StatusReport::from_counters(&AccumulatorState::default(), 80.0);
        assert!(!report.drowsiness_detected);
        assert_eq!(report.drowsiness_detail, "normal");
        assert_eq!(report.yawn_detail, "normal");
    }
}
