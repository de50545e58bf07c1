//! Per-frame detection session
//!
//! Glues the DMS analysis to the alert arbiter and notification sink, and
//! produces the status snapshot published after every processed frame.

use alerting::{AlertArbiter, AlertDecision, AlertSink, FatigueLevel, StatusReport};
use camera_capture::VideoFrame;
use dms::{DmsModule, EyeState, MouthState};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Window over which the processing rate is measured
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Read-only copy of the detector state for the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub frame_sequence: u64,
    pub frames_processed: u64,
    pub blink_count: u32,
    pub continuous_closed_seconds: f64,
    pub yawn_count: u32,
    pub yawn_duration_seconds: f64,
    pub alert_needed: bool,
    pub fatigue_level: FatigueLevel,
    /// Popup raised on this frame
    pub popup_triggered: bool,
    /// Popup latch
    pub alert_active: bool,
    pub dispatch_count: u64,
    pub last_alert_message: Option<String>,
    pub face_detected: bool,
    pub face_absent_frames: u32,
    pub left_eye: EyeState,
    pub right_eye: EyeState,
    pub mouth: MouthState,
    pub camera_online: bool,
    /// Frames processed per second over the last completed window
    pub processing_fps: f64,
}

/// Processing-thread state: analysis, arbitration and dispatch hand-off
pub struct DetectionSession<S> {
    dms: DmsModule,
    arbiter: AlertArbiter,
    sink: S,
    vehicle_speed_kmh: f64,
    frames_processed: u64,
    fps_window_start: Option<Instant>,
    fps_window_frames: u32,
    processing_fps: f64,
    snapshot: StatusSnapshot,
}

impl<S: AlertSink> DetectionSession<S> {
    pub fn new(dms: DmsModule, arbiter: AlertArbiter, sink: S, vehicle_speed_kmh: f64) -> Self {
        Self {
            dms,
            arbiter,
            sink,
            vehicle_speed_kmh,
            frames_processed: 0,
            fps_window_start: None,
            fps_window_frames: 0,
            processing_fps: 0.0,
            snapshot: StatusSnapshot {
                camera_online: true,
                ..Default::default()
            },
        }
    }

    /// Run one frame through the pipeline
    pub fn process(&mut self, frame: &VideoFrame, now: Instant) -> StatusSnapshot {
        let analysis = self.dms.analyze(frame);
        let counters = analysis.counters;

        // Nothing was observed: the frozen counters must not trigger anything new
        let decision = if analysis.face_detected {
            self.arbiter.evaluate(&counters, now)
        } else {
            AlertDecision {
                alert_needed: self.arbiter.alert_needed(&counters),
                ..Default::default()
            }
        };

        if decision.dispatch {
            self.sink
                .dispatch(StatusReport::from_counters(&counters, self.vehicle_speed_kmh));
        }
        if decision.show_popup {
            warn!(
                "DROWSINESS ALERT: eyes closed {:.2}s, yawn {:.2}s, {} yawns",
                counters.continuous_closed_seconds, counters.yawn_duration_seconds, counters.yawn_count
            );
        }

        self.frames_processed += 1;
        self.measure_rate(now);
        metrics::counter!("frames_processed_total").increment(1);
        metrics::gauge!("continuous_closed_seconds").set(counters.continuous_closed_seconds);

        let alert = self.arbiter.state();
        self.snapshot = StatusSnapshot {
            frame_sequence: frame.sequence,
            frames_processed: self.frames_processed,
            blink_count: counters.blink_count,
            continuous_closed_seconds: counters.continuous_closed_seconds,
            yawn_count: counters.yawn_count,
            yawn_duration_seconds: counters.yawn_duration_seconds,
            alert_needed: decision.alert_needed,
            fatigue_level: self.arbiter.fatigue_level(&counters),
            popup_triggered: decision.show_popup,
            alert_active: alert.alert_active,
            dispatch_count: alert.dispatch_count,
            last_alert_message: self.sink.latest_message(),
            face_detected: analysis.face_detected,
            face_absent_frames: analysis.face_absent_frames,
            left_eye: analysis.observation.left_eye,
            right_eye: analysis.observation.right_eye,
            mouth: analysis.observation.mouth,
            camera_online: true,
            processing_fps: self.processing_fps,
        };
        self.snapshot.clone()
    }

    fn measure_rate(&mut self, now: Instant) {
        let Some(start) = self.fps_window_start else {
            self.fps_window_start = Some(now);
            return;
        };

        self.fps_window_frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed > FPS_WINDOW {
            self.processing_fps = self.fps_window_frames as f64 / elapsed.as_secs_f64();
            self.fps_window_start = Some(now);
            self.fps_window_frames = 0;
            debug!("Processing at {:.1} fps", self.processing_fps);
            metrics::gauge!("processing_fps").set(self.processing_fps);
        }
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.clone()
    }

    /// Operator reset of counters, cooldowns and region states
    pub fn reset(&mut self) -> StatusSnapshot {
        info!("Operator reset after {} frames", self.frames_processed);
        self.dms.reset_state();
        self.arbiter.reset();

        let previous = &self.snapshot;
        self.snapshot = StatusSnapshot {
            frame_sequence: previous.frame_sequence,
            frames_processed: self.frames_processed,
            last_alert_message: previous.last_alert_message.clone(),
            camera_online: previous.camera_online,
            processing_fps: previous.processing_fps,
            ..Default::default()
        };
        self.snapshot.clone()
    }

    /// Snapshot marking the camera as gone
    pub fn go_offline(&mut self) -> StatusSnapshot {
        self.snapshot.camera_online = false;
        self.snapshot.clone()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
