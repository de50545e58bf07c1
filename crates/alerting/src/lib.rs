//! Alerting System
//!
//! Threshold and cooldown arbitration over the drowsiness counters, plus
//! fire-and-forget notification dispatch (text message and audio cue).

mod arbiter;
mod notify;
mod report;

pub use arbiter::{
    AlertArbiter, AlertConfig, AlertDecision, AlertState, FatigueLevel, WARNING_CLOSED_SECONDS, WARNING_YAWN_COUNT,
};
pub use notify::{
    AlertSink, AudioCue, CannedTextService, HttpTextService, NotificationDispatcher, NotifyConfig,
    TerminalBell, TextAlertService, TextBackend, MAX_TIMEOUT_MS,
};
pub use report::{StatusReport, DROWSY_FLAG_SECONDS};

use thiserror::Error;

/// Notification error types
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Text service returned status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Text service returned an empty message")]
    Empty,
}
