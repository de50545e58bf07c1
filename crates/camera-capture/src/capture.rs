//! Capture thread

use frame_relay::{FrameRelay, PushOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::{FrameSource, VideoFrame};

/// Cooperative stop flag shared by the capture and processing loops
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop holding this signal to exit
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the capture loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureExit {
    /// Stop signal observed
    Stopped,
    /// The device failed or ran out of frames
    DeviceFailed(String),
}

/// Capture loop statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub frames_read: u64,
    pub frames_dropped: u64,
    pub exit: CaptureExit,
}

/// Read frames until stopped or the device fails, pushing each into the relay
///
/// The relay is closed on exit so the consumer observes `Closed` after the
/// last buffered frame, and the source (camera handle) is released.
pub fn capture_loop(
    mut source: Box<dyn FrameSource>,
    relay: Arc<FrameRelay<VideoFrame>>,
    stop: StopSignal,
) -> CaptureSummary {
    let device = source.describe();
    info!("Capture loop started on {}", device);

    let mut frames_read = 0u64;
    let mut frames_dropped = 0u64;

    let exit = loop {
        if stop.is_stopped() {
            break CaptureExit::Stopped;
        }

        match source.read_frame() {
            Ok(frame) => {
                frames_read += 1;
                match relay.push(frame) {
                    PushOutcome::Stored => {}
                    PushOutcome::Dropped => {
                        frames_dropped += 1;
                        metrics::counter!("frames_dropped_total").increment(1);
                        debug!("Relay full, frame dropped");
                    }
                    PushOutcome::Closed => break CaptureExit::Stopped,
                }
            }
            Err(e) => {
                warn!("Camera read failed on {}: {}", device, e);
                break CaptureExit::DeviceFailed(e.to_string());
            }
        }
    };

    relay.close();
    drop(source);
    info!(
        "Capture loop stopped ({} read, {} dropped): {:?}",
        frames_read, frames_dropped, exit
    );

    CaptureSummary {
        frames_read,
        frames_dropped,
        exit,
    }
}

/// Run [`capture_loop`] on a dedicated named thread
pub fn spawn_capture(
    source: Box<dyn FrameSource>,
    relay: Arc<FrameRelay<VideoFrame>>,
    stop: StopSignal,
) -> std::io::Result<JoinHandle<CaptureSummary>> {
    thread::Builder::new()
        .name("capture".into())
        .spawn(move || capture_loop(source, relay, stop))
}
