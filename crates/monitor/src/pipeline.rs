//! Pipeline lifecycle
//!
//! Two long-lived threads share only the frame relay: `capture` owns the
//! frame source, `processing` owns the detection session. Snapshots leave the
//! processing thread through a watch channel; operator commands reach it
//! through an mpsc channel.

use alerting::AlertSink;
use camera_capture::{spawn_capture, CaptureSummary, FrameSource, StopSignal, VideoFrame};
use frame_relay::{FrameRelay, RelayError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::session::{DetectionSession, StatusSnapshot};
use crate::MonitorError;

/// Operator commands applied on the processing thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
}

/// Processing loop statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingSummary {
    pub frames_processed: u64,
    pub resets: u64,
}

/// Both loops' statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub capture: CaptureSummary,
    pub processing: ProcessingSummary,
}

/// Take frames until the relay closes or the stop signal is raised
///
/// Publishes a snapshot after every frame and a final offline snapshot on exit.
pub fn processing_loop<S: AlertSink>(
    relay: Arc<FrameRelay<VideoFrame>>,
    mut session: DetectionSession<S>,
    stop: StopSignal,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<StatusSnapshot>,
    poll_timeout: Duration,
) -> ProcessingSummary {
    info!("Processing loop started");
    let mut frames_processed = 0u64;
    let mut resets = 0u64;

    loop {
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Reset => {
                    resets += 1;
                    status.send_replace(session.reset());
                }
            }
        }

        if stop.is_stopped() {
            info!("Stop requested");
            break;
        }

        match relay.try_take(poll_timeout) {
            Ok(frame) => {
                frames_processed += 1;
                status.send_replace(session.process(&frame, Instant::now()));
            }
            Err(RelayError::Timeout) => debug!("No frame within {:?}", poll_timeout),
            Err(RelayError::Closed) => {
                info!("Frame relay closed, camera offline");
                break;
            }
        }
    }

    status.send_replace(session.go_offline());
    info!("Processing loop stopped after {} frames", frames_processed);

    ProcessingSummary {
        frames_processed,
        resets,
    }
}

/// Running pipeline
pub struct Pipeline {
    relay: Arc<FrameRelay<VideoFrame>>,
    stop: StopSignal,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<StatusSnapshot>,
    capture: JoinHandle<CaptureSummary>,
    processing: JoinHandle<ProcessingSummary>,
}

impl Pipeline {
    /// Start the capture and processing threads
    pub fn spawn<S: AlertSink + 'static>(
        source: Box<dyn FrameSource>,
        session: DetectionSession<S>,
        relay_config: &RelayConfig,
    ) -> Result<Self, MonitorError> {
        let relay = Arc::new(FrameRelay::new(relay_config.capacity, relay_config.overflow));
        let stop = StopSignal::new();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(session.snapshot());
        let poll_timeout = Duration::from_millis(relay_config.poll_timeout_ms);

        let processing = {
            let relay = Arc::clone(&relay);
            let stop = stop.clone();
            thread::Builder::new()
                .name("processing".into())
                .spawn(move || processing_loop(relay, session, stop, command_rx, status_tx, poll_timeout))
                .map_err(|e| MonitorError::Thread(format!("processing: {}", e)))?
        };

        let capture = match spawn_capture(source, Arc::clone(&relay), stop.clone()) {
            Ok(handle) => handle,
            Err(e) => {
                stop.stop();
                relay.close();
                let _ = processing.join();
                return Err(MonitorError::Thread(format!("capture: {}", e)));
            }
        };

        info!(
            "Pipeline started: relay capacity {} ({:?}), poll {:?}",
            relay_config.capacity, relay_config.overflow, poll_timeout
        );

        Ok(Self {
            relay,
            stop,
            commands,
            status,
            capture,
            processing,
        })
    }

    /// Follow status snapshots
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Send operator commands
    pub fn commands(&self) -> mpsc::UnboundedSender<Command> {
        self.commands.clone()
    }

    /// Resolves once the processing thread has exited
    pub fn stopped(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut status = self.status.clone();
        async move { while status.changed().await.is_ok() {} }
    }

    /// Stop both loops and wait for them
    pub fn shutdown(self) -> Result<PipelineSummary, MonitorError> {
        info!("Shutting down pipeline");
        self.stop.stop();
        self.relay.close();
        self.join()
    }

    /// Wait for both loops to end on their own (device failure or end of stream)
    pub fn join(self) -> Result<PipelineSummary, MonitorError> {
        let capture = self
            .capture
            .join()
            .map_err(|_| MonitorError::Thread("capture thread panicked".into()))?;
        let processing = self
            .processing
            .join()
            .map_err(|_| MonitorError::Thread("processing thread panicked".into()))?;

        info!(
            "Pipeline stopped: {} frames read, {} dropped, {} processed",
            capture.frames_read, capture.frames_dropped, processing.frames_processed
        );
        Ok(PipelineSummary { capture, processing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::session;
    use camera_capture::{CameraConfig, CameraError, CaptureExit, SyntheticSource};
    use frame_relay::OverflowPolicy;

    fn limited_source(frames: u64) -> Box<dyn FrameSource> {
        let config = CameraConfig {
            width: 64,
            height: 48,
            fps: 30,
            frame_limit: Some(frames),
            ..Default::default()
        };
        Box::new(SyntheticSource::new(&config).unpaced())
    }

    /// Fails on the first read, like an unplugged camera
    struct DeadSource;

    impl FrameSource for DeadSource {
        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            thread::sleep(Duration::from_millis(5));
            Err(CameraError::Read("no signal".into()))
        }

        fn describe(&self) -> String {
            "dead".into()
        }
    }

    #[test]
    fn test_end_of_stream_stops_processing() {
        let (session, _) = session(Vec::new());
        let relay_config = RelayConfig {
            capacity: 64,
            overflow: OverflowPolicy::DropNewest,
            poll_timeout_ms: 20,
        };
        let pipeline = Pipeline::spawn(limited_source(40), session, &relay_config).unwrap();
        let status = pipeline.status();

        let summary = pipeline.join().unwrap();
        assert_eq!(summary.capture.frames_read, 40);
        assert_eq!(
            summary.capture.exit,
            CaptureExit::DeviceFailed(CameraError::EndOfStream.to_string())
        );
        assert_eq!(
            summary.processing.frames_processed,
            summary.capture.frames_read - summary.capture.frames_dropped
        );

        let last = status.borrow().clone();
        assert!(!last.camera_online);
        assert_eq!(last.frames_processed, summary.processing.frames_processed);
    }

    #[test]
    fn test_device_failure_reports_offline() {
        let (session, _) = session(Vec::new());
        let pipeline = Pipeline::spawn(Box::new(DeadSource), session, &RelayConfig::default()).unwrap();
        let status = pipeline.status();

        let summary = pipeline.join().unwrap();
        assert!(matches!(summary.capture.exit, CaptureExit::DeviceFailed(_)));
        assert_eq!(summary.processing.frames_processed, 0);
        assert!(!status.borrow().camera_online);
    }

    #[test]
    fn test_shutdown_and_reset_command() {
        let (session, _) = session(Vec::new());
        let config = CameraConfig {
            width: 64,
            height: 48,
            fps: 200,
            ..Default::default()
        };
        let pipeline = Pipeline::spawn(
            Box::new(SyntheticSource::new(&config)),
            session,
            &RelayConfig::default(),
        )
        .unwrap();

        pipeline.commands().send(Command::Reset).unwrap();
        thread::sleep(Duration::from_millis(100));

        let summary = pipeline.shutdown().unwrap();
        assert_eq!(summary.capture.exit, CaptureExit::Stopped);
        assert_eq!(summary.processing.resets, 1);
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_end_of_stream() {
        let (session, _) = session(Vec::new());
        let pipeline = Pipeline::spawn(limited_source(10), session, &RelayConfig::default()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), pipeline.stopped())
            .await
            .unwrap();
        assert!(!pipeline.status().borrow().camera_online);
        pipeline.join().unwrap();
    }
}
