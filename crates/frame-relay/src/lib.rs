//! Bounded Frame Relay
//!
//! A small fixed-capacity channel that decouples the camera's native frame
//! rate from the processing rate. Pushes never block: when the relay is full
//! one frame is discarded according to the configured [`OverflowPolicy`].

mod relay;

pub use relay::{FrameRelay, PushOutcome, RelayStats, DEFAULT_CAPACITY};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Relay error types
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// Nothing arrived within the poll timeout
    #[error("Relay poll timed out")]
    Timeout,

    /// The producer closed the relay and every buffered item was taken
    #[error("Relay closed")]
    Closed,
}

/// What to discard when a push finds the relay full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest buffered item so the most recent ones are kept
    #[default]
    DropOldest,
    /// Discard the incoming item and keep what is buffered
    DropNewest,
}
